//! Correlation tokens.
//!
//! A token rides in the reserved `@extra` field of an outgoing request and is
//! echoed back unchanged by the peer on the matching response. The layer only
//! ever compares tokens for equality, so the payload is kept as opaque text.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

/// An opaque correlation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Create a token from arbitrary non-empty text.
    pub fn new(text: impl Into<String>) -> Result<Self, TokenError> {
        let text = text.into();
        if text.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self(text))
    }

    /// The token text as written to `@extra`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover a token from an echoed `@extra` value.
    ///
    /// Peers may echo numeric tokens back as JSON numbers; those normalise to
    /// their decimal text so they compare equal to the token that was sent.
    /// Any other non-null value is kept as its compact JSON text.
    pub fn from_json(value: &Json) -> Option<Self> {
        let text = match value {
            Json::Null => return None,
            Json::String(s) => s.clone(),
            Json::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        Self::new(text).ok()
    }

    /// The wire form of this token.
    pub fn to_json(&self) -> Json {
        Json::String(self.0.clone())
    }
}

impl From<u64> for Token {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Token {
    type Error = TokenError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Error building a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("correlation token cannot be empty")]
    Empty,
}
