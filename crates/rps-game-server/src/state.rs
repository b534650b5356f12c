//! Shared application state.

use ledger_core::{Amount, Identity, Ledger, MockLedger, RpcLedger};
use rps_game_core::{
    ConfigError, EngineConfig, ExternalRandomness, GameEngine, LocalRandomness, RandomnessSource,
};
use std::sync::Arc;

/// Where the automated opponent gets its moves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomnessMode {
    /// Thread RNG, delivered within the reveal call
    Local,
    /// Deferred, delivered through the fulfil route
    External,
}

impl RandomnessMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(RandomnessMode::Local),
            "external" => Some(RandomnessMode::External),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GameEngine>,
    pub ledger: Arc<dyn Ledger>,
    /// Present when running on the in-process ledger
    pub mock_ledger: Option<MockLedger>,
    /// Shared secret the randomness adapter sends with its callbacks
    pub randomness_token: Option<Arc<str>>,
}

impl AppState {
    /// Engine on the in-process ledger, house funded with `house_funds`
    pub fn with_mock_ledger(
        config: EngineConfig,
        randomness: RandomnessMode,
        house_funds: Amount,
    ) -> Result<Self, ConfigError> {
        let ledger = MockLedger::new();
        if house_funds > 0 {
            ledger.mint(&config.house, house_funds);
        }
        ledger.approve_unlimited(&config.house);
        tracing::info!(house = %config.house, house_funds, "Using in-process ledger");

        Self::build(config, randomness, Arc::new(ledger.clone()), Some(ledger))
    }

    /// Engine on a JSON-RPC ledger node
    pub fn with_rpc_ledger(
        config: EngineConfig,
        randomness: RandomnessMode,
        rpc_url: String,
    ) -> Result<Self, ConfigError> {
        tracing::info!("Ledger RPC enabled: {}", rpc_url);
        Self::build(config, randomness, Arc::new(RpcLedger::new(rpc_url)), None)
    }

    fn build(
        config: EngineConfig,
        randomness: RandomnessMode,
        ledger: Arc<dyn Ledger>,
        mock_ledger: Option<MockLedger>,
    ) -> Result<Self, ConfigError> {
        let source: Arc<dyn RandomnessSource> = match randomness {
            RandomnessMode::Local => Arc::new(LocalRandomness),
            RandomnessMode::External => Arc::new(ExternalRandomness),
        };
        let engine = Arc::new(GameEngine::new(config, ledger.clone(), source)?);
        Ok(Self {
            engine,
            ledger,
            mock_ledger,
            randomness_token: None,
        })
    }

    /// Accept randomness callbacks that carry `token`
    pub fn with_randomness_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.randomness_token = Some(Arc::from(token));
        self
    }

    /// Whether `presented` is the configured randomness token.
    ///
    /// Always false when no token is configured.
    pub fn randomness_token_matches(&self, presented: &str) -> bool {
        match &self.randomness_token {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }

    /// Credit demo funds and grant the pot unlimited allowance
    pub fn mint(&self, to: &Identity, amount: Amount) -> bool {
        match &self.mock_ledger {
            Some(ledger) => {
                ledger.mint(to, amount);
                ledger.approve_unlimited(to);
                true
            }
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
