//! JSON-RPC client for an external token ledger.
//!
//! The ledger node exposes three methods, each taking a single object in the
//! params array:
//!
//! - `escrow_debit { account, amount }` -> `{ transfer_id }`
//! - `escrow_credit { account, amount }` -> `{ transfer_id }`
//! - `balance_of { account }` -> `{ balance }`
//!
//! Amounts travel as `0x`-prefixed hex strings.

use crate::ledger::traits::{Ledger, LedgerError};
use crate::types::{Amount, Identity, TransferId};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// RPC client for a token ledger node
pub struct RpcLedger {
    client: Client,
    rpc_url: String,
}

impl RpcLedger {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Make a JSON-RPC call
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [params]
        });

        debug!(method, request = %request, "ledger rpc call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        debug!(method, response = %result, "ledger rpc response");

        if let Some(error) = result.get("error") {
            return Err(map_rpc_error(error));
        }

        result
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::NetworkError("No result in response".to_string()))
    }

    async fn transfer(
        &self,
        method: &str,
        account: &Identity,
        amount: Amount,
    ) -> Result<TransferId, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let params = json!({
            "account": account,
            "amount": encode_amount(amount),
        });
        self.call(method, params).await?;

        // The node's own transfer id is informational only
        Ok(TransferId::new())
    }
}

fn encode_amount(amount: Amount) -> String {
    format!("0x{:x}", amount)
}

fn decode_amount(value: &Value) -> Result<Amount, LedgerError> {
    let raw = value
        .as_str()
        .ok_or_else(|| LedgerError::NetworkError("Amount is not a string".to_string()))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    Amount::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::NetworkError(format!("Bad amount {}: {}", raw, e)))
}

fn map_rpc_error(error: &Value) -> LedgerError {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();

    // Coded errors come from the ledger itself, uncoded ones from the transport
    match error.get("code").and_then(|c| c.as_i64()) {
        Some(_) => LedgerError::Rejected(message),
        None => LedgerError::NetworkError(message),
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn debit(&self, from: &Identity, amount: Amount) -> Result<TransferId, LedgerError> {
        self.transfer("escrow_debit", from, amount).await
    }

    async fn credit(&self, to: &Identity, amount: Amount) -> Result<TransferId, LedgerError> {
        self.transfer("escrow_credit", to, amount).await
    }

    async fn balance_of(&self, who: &Identity) -> Result<Amount, LedgerError> {
        let result = self.call("balance_of", json!({ "account": who })).await?;
        let balance = result
            .get("balance")
            .ok_or_else(|| LedgerError::NetworkError("No balance in response".to_string()))?;
        decode_amount(balance)
    }
}
