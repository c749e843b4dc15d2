//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_TIMEOUT_MS: u64 = 300_000;

/// Tunables for a [`Client`](crate::Client).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Deadline applied by `send` when the caller gives none. Unset means
    /// requests wait until answered, cancelled or drained.
    pub request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ms) = self.request_timeout_ms {
            if ms == 0 || ms > MAX_TIMEOUT_MS {
                return Err(ConfigError::TimeoutOutOfRange(ms));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("request_timeout_ms must be between 1 and 300000, got {0}")]
    TimeoutOutOfRange(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_deadline() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn timeout_bounds() {
        let ok = ClientConfig {
            request_timeout_ms: Some(2_000),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.request_timeout(), Some(Duration::from_secs(2)));

        for ms in [0, MAX_TIMEOUT_MS + 1] {
            let bad = ClientConfig {
                request_timeout_ms: Some(ms),
            };
            assert_eq!(bad.validate(), Err(ConfigError::TimeoutOutOfRange(ms)));
        }
    }

    #[test]
    fn deserializes_from_json() {
        let config: ClientConfig = serde_json::from_str(r#"{"request_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.request_timeout_ms, Some(500));
        assert!(serde_json::from_str::<ClientConfig>(r#"{"bogus": 1}"#).is_err());
    }
}
