//! Decoded nodes and their wire encoding.
//!
//! A [`Node`] is either an [`Object`] whose discriminator and fields match a
//! catalogue shape, or an [`Unrecognized`] payload whose discriminator the
//! catalogue does not know. Encoding never needs the catalogue: every
//! [`Value`] remembers its own wire representation.

use crate::TAG_FIELD;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int53(i64),
    /// Travels as a decimal string.
    Int64(i64),
    Double(f64),
    String(String),
    /// Travels as base64.
    Bytes(Vec<u8>),
    Node(Node),
    Array(Vec<Value>),
}

impl Value {
    /// The flag, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer field, whatever its wire width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int53(n) | Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// The number, if this is a `Double`. Integers are not converted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// The text, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The decoded bytes, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// The nested tagged value, recognized or not.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// The nested value, if its tag is in the catalogue.
    pub fn as_object(&self) -> Option<&Object> {
        self.as_node().and_then(Node::as_object)
    }

    /// The elements, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Wire form of this value.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(b) => Json::Bool(*b),
            Self::Int32(n) => Json::from(*n),
            Self::Int53(n) => Json::from(*n),
            Self::Int64(n) => Json::String(n.to_string()),
            // JSON has no NaN or infinity.
            Self::Double(n) => Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => Json::String(STANDARD.encode(b)),
            Self::Node(node) => node.to_json(),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Node(Node::Object(object))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

/// A tagged object matching a catalogue shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    tag: String,
    fields: BTreeMap<String, Value>,
}

impl Object {
    /// Create an object with no fields set.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Json {
        Json::Object(self.to_map())
    }

    pub(crate) fn to_map(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert(TAG_FIELD.to_string(), Json::String(self.tag.clone()));
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        map
    }
}

/// A payload whose discriminator the catalogue does not know.
///
/// Kept verbatim so that a newer peer degrades gracefully.
#[derive(Debug, Clone, PartialEq)]
pub struct Unrecognized {
    tag: String,
    raw: Map<String, Json>,
}

impl Unrecognized {
    pub fn new(tag: impl Into<String>, raw: Map<String, Json>) -> Self {
        Self {
            tag: tag.into(),
            raw,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The original payload, discriminator included.
    pub fn raw(&self) -> &Map<String, Json> {
        &self.raw
    }
}

/// The result of dispatching one JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(Object),
    Unrecognized(Unrecognized),
}

impl Node {
    pub fn tag(&self) -> &str {
        match self {
            Self::Object(o) => o.tag(),
            Self::Unrecognized(u) => u.tag(),
        }
    }

    /// Field lookup on a recognised object.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(name))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Self::Object(o) => Some(o),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized(_))
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Object(o) => o.to_json(),
            Self::Unrecognized(u) => Json::Object(u.raw.clone()),
        }
    }
}

impl From<Object> for Node {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int64_encodes_as_decimal_string() {
        let object = Object::new("optionValueInteger").with("value", Value::Int64(i64::MAX));
        assert_eq!(
            object.to_json(),
            json!({"@type": "optionValueInteger", "value": "9223372036854775807"})
        );
    }

    #[test]
    fn bytes_encode_as_base64() {
        let object = Object::new("testBytes").with("value", vec![0xde_u8, 0xad, 0xbe, 0xef]);
        assert_eq!(object.to_json(), json!({"@type": "testBytes", "value": "3q2+7w=="}));
    }

    #[test]
    fn nested_nodes_and_arrays_encode() {
        let chat = Object::new("chat")
            .with("id", Value::Int53(42))
            .with("title", "Demo")
            .with(
                "type",
                Object::new("chatTypeSupergroup")
                    .with("supergroup_id", Value::Int53(7))
                    .with("is_channel", true),
            )
            .with("positions", Vec::<Value>::new());
        assert_eq!(
            chat.to_json(),
            json!({
                "@type": "chat",
                "id": 42,
                "title": "Demo",
                "type": {"@type": "chatTypeSupergroup", "supergroup_id": 7, "is_channel": true},
                "positions": []
            })
        );
    }

    #[test]
    fn non_finite_double_encodes_as_null() {
        assert_eq!(Value::Double(f64::NAN).to_json(), Json::Null);
    }

    #[test]
    fn unrecognized_reencodes_verbatim() {
        let raw = json!({"@type": "updateFromTheFuture", "x": [1, 2]});
        let Json::Object(map) = raw.clone() else { unreachable!() };
        let node = Node::Unrecognized(Unrecognized::new("updateFromTheFuture", map));
        assert_eq!(node.to_json(), raw);
        assert!(node.get("x").is_none());
    }

    #[test]
    fn accessors() {
        let node = Node::from(Object::new("testInt").with("value", Value::Int32(-3)));
        assert_eq!(node.get("value").and_then(Value::as_i64), Some(-3));
        assert_eq!(node.tag(), "testInt");
        assert!(!node.is_unrecognized());
    }
}
