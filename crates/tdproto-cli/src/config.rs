//! Configuration file for the `tdproto` binary.
//!
//! ```toml
//! catalogue = "td_api.json"
//!
//! [client]
//! request_timeout_ms = 10000
//!
//! [bridge]
//! command = "tdjson-pipe"
//! args = ["--database", "/var/lib/td"]
//!
//! [log]
//! filter = "tdproto_client=debug,info"
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tdproto_client::ClientConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Catalogue artifact; the bundled one when unset.
    pub catalogue: Option<PathBuf>,
    pub client: ClientConfig,
    pub bridge: BridgeConfig,
    pub log: LogConfig,
}

/// The child process speaking TDLib JSON over stdin/stdout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.client.validate()?;
        Ok(config)
    }
}
