//! Routing metadata carried alongside every wire object.
//!
//! Outgoing requests get an `@extra` correlation token. Incoming messages are
//! split into token, instance id and the remaining body before dispatch.

use crate::error::{DecodeError, DecodeErrorKind, FieldPath};
use crate::node::Object;
use crate::token::Token;
use crate::{CLIENT_ID_FIELD, EXTRA_FIELD, TAG_FIELD};
use serde_json::{Map, Value as Json};

/// One inbound message with its reserved fields stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Echo of the request's `@extra`, if any.
    pub token: Option<Token>,
    /// Instance that produced the message.
    pub client_id: Option<i32>,
    /// The payload, `@type` included.
    pub body: Json,
}

impl Envelope {
    /// Split a raw text message.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Json = serde_json::from_str(text).map_err(|e| {
            DecodeError::new(FieldPath::root(), DecodeErrorKind::InvalidJson(e.to_string()))
        })?;
        Self::from_json(value)
    }

    pub fn from_json(value: Json) -> Result<Self, DecodeError> {
        let Json::Object(mut map) = value else {
            return Err(DecodeError::mismatch(&FieldPath::root(), "object", kind_name(&value)));
        };

        let token = map.remove(EXTRA_FIELD).and_then(|extra| Token::from_json(&extra));
        let client_id = map
            .remove(CLIENT_ID_FIELD)
            .and_then(|id| id.as_i64())
            .and_then(|id| i32::try_from(id).ok());

        Ok(Self {
            token,
            client_id,
            body: Json::Object(map),
        })
    }

    /// The body's discriminator, if it has a string one.
    pub fn tag(&self) -> Option<&str> {
        self.body.get(TAG_FIELD).and_then(Json::as_str)
    }
}

/// Wire text for a request carrying `token` as its `@extra`.
pub fn encode_request(request: &Object, token: &Token) -> String {
    let mut map: Map<String, Json> = request.to_map();
    map.insert(EXTRA_FIELD.to_string(), token.to_json());
    Json::Object(map).to_string()
}

fn kind_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Value;
    use serde_json::json;

    #[test]
    fn encode_attaches_token() {
        let request = Object::new("getChat").with("chat_id", Value::Int53(42));
        let text = encode_request(&request, &Token::from(7));
        let value: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"@type": "getChat", "chat_id": 42, "@extra": "7"}));
    }

    #[test]
    fn parse_strips_reserved_fields() {
        let env = Envelope::parse(r#"{"@type":"ok","@extra":"7","@client_id":1}"#).unwrap();
        assert_eq!(env.token, Some(Token::from(7)));
        assert_eq!(env.client_id, Some(1));
        assert_eq!(env.body, json!({"@type": "ok"}));
        assert_eq!(env.tag(), Some("ok"));
    }

    #[test]
    fn numeric_extra_matches_string_token() {
        let env = Envelope::parse(r#"{"@type":"ok","@extra":7}"#).unwrap();
        assert_eq!(env.token, Some(Token::from(7)));
    }

    #[test]
    fn update_has_no_token() {
        let env = Envelope::parse(r#"{"@type":"updateOption","name":"x","value":{"@type":"optionValueEmpty"}}"#)
            .unwrap();
        assert!(env.token.is_none());
        assert!(env.client_id.is_none());
    }

    #[test]
    fn rejects_non_objects() {
        let err = Envelope::parse("[1,2]").unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::KindMismatch {
                expected: "object".into(),
                found: "array".into()
            }
        );
        let err = Envelope::parse("{").unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::InvalidJson(_)));
    }
}
