//! Engine configuration.

use crate::games::settlement::MAX_BPS;
use chrono::Duration;
use ledger_core::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Longer timeouts are clamped to this (about a century)
const MAX_TIMEOUT_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    Parse { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of the game engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Account that backs automated games and receives tie fees
    pub house: Identity,
    pub min_wager: Amount,
    pub max_wager: Amount,
    /// Share of each tie refund kept as a fee, in basis points
    pub tie_fee_bps: u16,
    /// Time a player has to reveal once the other side is locked in
    pub reveal_timeout_secs: u64,
    /// Time an external randomness source has to deliver
    pub randomness_timeout_secs: u64,
    /// Buffered events per subscriber before the slowest one lags
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            house: Identity::from("house"),
            min_wager: 1,
            max_wager: Amount::MAX / 2,
            tie_fee_bps: 0,
            reveal_timeout_secs: 24 * 60 * 60,
            randomness_timeout_secs: 60 * 60,
            event_capacity: 256,
        }
    }
}

fn env_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Parse { name, value }),
        },
        Err(_) => Ok(None),
    }
}

impl EngineConfig {
    /// Defaults overridden by `RPS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(house) = env_var::<String>("RPS_HOUSE_ID")? {
            config.house = Identity::new(house);
        }
        if let Some(v) = env_var("RPS_MIN_WAGER")? {
            config.min_wager = v;
        }
        if let Some(v) = env_var("RPS_MAX_WAGER")? {
            config.max_wager = v;
        }
        if let Some(v) = env_var("RPS_TIE_FEE_BPS")? {
            config.tie_fee_bps = v;
        }
        if let Some(v) = env_var("RPS_REVEAL_TIMEOUT_SECS")? {
            config.reveal_timeout_secs = v;
        }
        if let Some(v) = env_var("RPS_RANDOMNESS_TIMEOUT_SECS")? {
            config.randomness_timeout_secs = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.house.as_str().is_empty() {
            return Err(ConfigError::Invalid("house identity is empty".to_string()));
        }
        if self.min_wager == 0 {
            return Err(ConfigError::Invalid("min_wager must be positive".to_string()));
        }
        if self.min_wager > self.max_wager {
            return Err(ConfigError::Invalid(format!(
                "min_wager {} exceeds max_wager {}",
                self.min_wager, self.max_wager
            )));
        }
        // The pot is two wagers and must fit in an Amount
        if self.max_wager > Amount::MAX / 2 {
            return Err(ConfigError::Invalid(format!(
                "max_wager {} would overflow the pot",
                self.max_wager
            )));
        }
        if self.tie_fee_bps > MAX_BPS {
            return Err(ConfigError::Invalid(format!(
                "tie_fee_bps {} exceeds {}",
                self.tie_fee_bps, MAX_BPS
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn reveal_timeout(&self) -> Duration {
        Duration::seconds(self.reveal_timeout_secs.min(MAX_TIMEOUT_SECS) as i64)
    }

    pub fn randomness_timeout(&self) -> Duration {
        Duration::seconds(self.randomness_timeout_secs.min(MAX_TIMEOUT_SECS) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_wager_bounds() {
        let config = EngineConfig {
            min_wager: 10,
            max_wager: 5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_overflowing_max_wager() {
        let config = EngineConfig {
            max_wager: Amount::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_fee_above_full_refund() {
        let config = EngineConfig {
            tie_fee_bps: 10_001,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"house": "bank", "tie_fee_bps": 100}"#).unwrap();
        assert_eq!(config.house, Identity::from("bank"));
        assert_eq!(config.tie_fee_bps, 100);
        assert_eq!(config.min_wager, 1);
    }

    #[test]
    fn test_timeouts_are_durations() {
        let config = EngineConfig {
            reveal_timeout_secs: 90,
            ..Default::default()
        };
        assert_eq!(config.reveal_timeout(), Duration::seconds(90));
    }
}
