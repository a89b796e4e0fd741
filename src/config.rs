//! Deployment parameters of a token network.

use serde::Deserialize;

use crate::{error::ArgumentError, types::Address};

/// Settle timeouts accepted by default, in blocks.
pub const DEFAULT_SETTLE_TIMEOUT_MIN: u64 = 6;
pub const DEFAULT_SETTLE_TIMEOUT_MAX: u64 = 2_700_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Chain the signatures are bound to.
    pub chain_id: u64,
    /// Address of this token network. Part of every signed message, so a
    /// proof for one network is useless on another.
    pub token_network: Address,
    pub settle_timeout_min: u64,
    pub settle_timeout_max: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            token_network: Address::ZERO,
            settle_timeout_min: DEFAULT_SETTLE_TIMEOUT_MIN,
            settle_timeout_max: DEFAULT_SETTLE_TIMEOUT_MAX,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settle_timeout_min {min} is larger than settle_timeout_max {max}")]
    InvertedBounds { min: u64, max: u64 },
}

impl NetworkConfig {
    /// Parse and validate a JSON document. Missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settle_timeout_min > self.settle_timeout_max {
            return Err(ConfigError::InvertedBounds {
                min: self.settle_timeout_min,
                max: self.settle_timeout_max,
            });
        }
        Ok(())
    }

    pub(crate) fn check_settle_timeout(&self, timeout: u64) -> Result<(), ArgumentError> {
        if (self.settle_timeout_min..=self.settle_timeout_max).contains(&timeout) {
            Ok(())
        } else {
            Err(ArgumentError::SettleTimeoutOutOfRange {
                timeout,
                min: self.settle_timeout_min,
                max: self.settle_timeout_max,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        assert_eq!(NetworkConfig::from_json("{}").unwrap(), NetworkConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let config = NetworkConfig::from_json(
            r#"{
                "chain_id": 337,
                "token_network": "0x5B38Da6a701c568545dCfcB03FcB875f56beddC4",
                "settle_timeout_min": 10,
                "settle_timeout_max": 20
            }"#,
        )
        .unwrap();

        assert_eq!(config.chain_id, 337);
        assert_eq!(config.token_network.0[0], 0x5b);
        assert!(config.check_settle_timeout(10).is_ok());
        assert!(config.check_settle_timeout(20).is_ok());
        assert!(config.check_settle_timeout(9).is_err());
        assert!(config.check_settle_timeout(21).is_err());
    }

    #[test]
    fn reject_malformed_address() {
        assert!(matches!(
            NetworkConfig::from_json(r#"{"token_network": "0x1234"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reject_inverted_bounds() {
        assert!(matches!(
            NetworkConfig::from_json(r#"{"settle_timeout_min": 30, "settle_timeout_max": 20}"#),
            Err(ConfigError::InvertedBounds { min: 30, max: 20 })
        ));
    }
}
