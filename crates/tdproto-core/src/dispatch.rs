//! The tag dispatcher.
//!
//! Resolves a raw JSON object to the catalogue shape named by its `@type`,
//! validating fields and recursing into nested tagged values. Unknown
//! discriminators become [`Node::Unrecognized`] rather than failures.

use crate::catalogue::Catalogue;
use crate::error::{DecodeError, DecodeErrorKind, FieldPath};
use crate::kind::{FieldKind, Primitive};
use crate::node::{Node, Object, Unrecognized, Value};
use crate::TAG_FIELD;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Constraint on which discriminators are legal at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect<'a> {
    /// Any tagged object.
    Any,
    /// A constructor of the named class.
    Class(&'a str),
    /// Exactly this tag. `@type` may be omitted.
    Shape(&'a str),
}

impl Expect<'_> {
    fn describe(&self) -> String {
        match self {
            Self::Any => "tagged object".to_string(),
            Self::Class(class) => class.to_string(),
            Self::Shape(tag) => format!("`{tag}` object"),
        }
    }
}

/// Decodes JSON values against a catalogue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalogue: Arc<Catalogue>,
}

impl Dispatcher {
    pub fn new(catalogue: Arc<Catalogue>) -> Self {
        Self { catalogue }
    }

    pub fn catalogue(&self) -> &Arc<Catalogue> {
        &self.catalogue
    }

    /// Parse and decode one JSON text.
    pub fn decode_str(&self, text: &str, expect: Expect<'_>) -> Result<Node, DecodeError> {
        let value: Json = serde_json::from_str(text).map_err(|e| {
            DecodeError::new(FieldPath::root(), DecodeErrorKind::InvalidJson(e.to_string()))
        })?;
        self.decode(&value, expect)
    }

    /// Decode one JSON value.
    pub fn decode(&self, value: &Json, expect: Expect<'_>) -> Result<Node, DecodeError> {
        let mut path = FieldPath::root();
        self.decode_node(value, expect, &mut path)
    }

    /// Check a locally built object against its descriptor by decoding its
    /// wire form.
    pub fn validate(&self, object: &Object) -> Result<Node, DecodeError> {
        self.decode(&object.to_json(), Expect::Shape(object.tag()))
    }

    fn decode_node(
        &self,
        value: &Json,
        expect: Expect<'_>,
        path: &mut FieldPath,
    ) -> Result<Node, DecodeError> {
        let Some(map) = value.as_object() else {
            return Err(DecodeError::mismatch(path, expect.describe(), describe(value)));
        };

        let tag = match (map.get(TAG_FIELD), expect) {
            (Some(Json::String(tag)), _) => tag.as_str(),
            (Some(other), _) => {
                return Err(DecodeError::mismatch(&path.join(TAG_FIELD), "string", describe(other)));
            }
            (None, Expect::Shape(tag)) => tag,
            (None, _) => {
                return Err(DecodeError::new(path.join(TAG_FIELD), DecodeErrorKind::MissingTag));
            }
        };

        let Some(shape) = self.catalogue.shape(tag) else {
            return Ok(Node::Unrecognized(Unrecognized::new(tag, map.clone())));
        };

        let rooted = path.is_root();
        if rooted {
            path.push_field(tag);
        }

        let legal = match expect {
            Expect::Any => true,
            Expect::Class(class) => self.catalogue.is_member(tag, class),
            Expect::Shape(expected) => expected == tag,
        };
        if !legal {
            return Err(DecodeError::new(
                path.join(TAG_FIELD),
                DecodeErrorKind::ShapeMismatch {
                    tag: tag.to_string(),
                    expected: expect.describe(),
                },
            ));
        }

        let mut fields = BTreeMap::new();
        for field in &shape.fields {
            path.push_field(&field.name);
            match map.get(&field.name) {
                None | Some(Json::Null) if field.optional => {}
                None | Some(Json::Null) => {
                    return Err(DecodeError::new(path.clone(), DecodeErrorKind::MissingField));
                }
                Some(raw) => {
                    let value = self.decode_value(raw, &field.kind, path)?;
                    fields.insert(field.name.clone(), value);
                }
            }
            path.pop();
        }

        if rooted {
            path.pop();
        }

        let mut object = Object::new(tag);
        for (name, value) in fields {
            object.insert(name, value);
        }
        Ok(Node::Object(object))
    }

    fn decode_value(
        &self,
        raw: &Json,
        kind: &FieldKind,
        path: &mut FieldPath,
    ) -> Result<Value, DecodeError> {
        match kind {
            FieldKind::Primitive(p) => decode_primitive(raw, *p, path),
            FieldKind::Shape(tag) => self.decode_node(raw, Expect::Shape(tag), path).map(Value::Node),
            FieldKind::Variant(class) => {
                self.decode_node(raw, Expect::Class(class), path).map(Value::Node)
            }
            FieldKind::Array(inner) => {
                let Some(items) = raw.as_array() else {
                    return Err(DecodeError::mismatch(path, kind.to_string(), describe(raw)));
                };
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push_index(index);
                    values.push(self.decode_value(item, inner, path)?);
                    path.pop();
                }
                Ok(Value::Array(values))
            }
        }
    }
}

/// Largest magnitude a double holds exactly.
const MAX_INT53: i64 = (1 << 53) - 1;

fn decode_primitive(raw: &Json, primitive: Primitive, path: &FieldPath) -> Result<Value, DecodeError> {
    let mismatch = || DecodeError::mismatch(path, primitive.name(), describe(raw));

    match primitive {
        Primitive::Bool => raw.as_bool().map(Value::Bool).ok_or_else(mismatch),
        Primitive::Int32 => raw
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::Int32)
            .ok_or_else(mismatch),
        Primitive::Int53 => raw
            .as_i64()
            .filter(|n| (-MAX_INT53..=MAX_INT53).contains(n))
            .map(Value::Int53)
            .ok_or_else(mismatch),
        // Decimal text on the wire; integral numbers are tolerated on input.
        Primitive::Int64 => match raw {
            Json::String(s) => s.parse().map(Value::Int64).map_err(|_| mismatch()),
            Json::Number(n) => n.as_i64().map(Value::Int64).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        Primitive::Double => raw.as_f64().map(Value::Double).ok_or_else(mismatch),
        Primitive::String => raw
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        Primitive::Bytes => {
            let s = raw.as_str().ok_or_else(mismatch)?;
            STANDARD
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| DecodeError::mismatch(path, "base64 bytes", format!("string ({e})")))
        }
    }
}

fn describe(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "boolean".to_string(),
        Json::Number(n) => format!("number {n}"),
        Json::String(s) => format!("string {s:?}"),
        Json::Array(_) => "array".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Catalogue::bundled().unwrap()))
    }

    #[test]
    fn decodes_known_shape() {
        let node = dispatcher()
            .decode(&json!({"@type": "chat", "id": 42, "title": "Demo"}), Expect::Any)
            .unwrap();
        assert_eq!(node.tag(), "chat");
        assert_eq!(node.get("title").and_then(Value::as_str), Some("Demo"));
        assert_eq!(node.get("id"), Some(&Value::Int53(42)));
        assert!(node.get("type").is_none());
    }

    #[test]
    fn unknown_tag_is_unrecognized() {
        let raw = json!({"@type": "updateSomethingNew", "payload": {"deep": [1, 2, 3]}});
        let node = dispatcher().decode(&raw, Expect::Any).unwrap();
        assert!(node.is_unrecognized());
        assert_eq!(node.tag(), "updateSomethingNew");
        assert_eq!(node.to_json(), raw);
    }

    #[test]
    fn unknown_nested_tag_is_unrecognized() {
        let node = dispatcher()
            .decode(
                &json!({
                    "@type": "updateMessageContent",
                    "chat_id": 1,
                    "message_id": 2,
                    "new_content": {"@type": "messageHologram", "depth": 3}
                }),
                Expect::Any,
            )
            .unwrap();
        let content = node.get("new_content").and_then(Value::as_node).unwrap();
        assert!(content.is_unrecognized());
    }

    #[test]
    fn missing_tag() {
        let err = dispatcher().decode(&json!({"id": 1}), Expect::Any).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingTag);
        assert_eq!(err.path.to_string(), "@type");
    }

    #[test]
    fn missing_required_field_reports_path() {
        let err = dispatcher()
            .decode(&json!({"@type": "chat", "id": 1}), Expect::Any)
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingField);
        assert_eq!(err.path.to_string(), "chat.title");
    }

    #[test]
    fn null_counts_as_absent() {
        let d = dispatcher();
        let node = d
            .decode(&json!({"@type": "chat", "id": 1, "title": "x", "photo": null}), Expect::Any)
            .unwrap();
        assert!(node.get("photo").is_none());

        let err = d
            .decode(&json!({"@type": "chat", "id": 1, "title": null}), Expect::Any)
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingField);
    }

    #[test]
    fn known_tag_outside_variant_set_is_a_shape_mismatch() {
        let err = dispatcher()
            .decode(
                &json!({"@type": "chat", "id": 1, "title": "x", "type": {"@type": "userStatusEmpty"}}),
                Expect::Any,
            )
            .unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::ShapeMismatch {
                tag: "userStatusEmpty".into(),
                expected: "ChatType".into()
            }
        );
        assert_eq!(err.path.to_string(), "chat.type.@type");
    }

    #[test]
    fn nested_error_path_includes_array_index() {
        let err = dispatcher()
            .decode(
                &json!({
                    "@type": "formattedText",
                    "text": "hi @bob",
                    "entities": [
                        {"@type": "textEntity", "offset": 0, "length": 2, "type": {"@type": "textEntityTypeBold"}},
                        {"@type": "textEntity", "offset": 3, "length": 4, "type": {}}
                    ]
                }),
                Expect::Any,
            )
            .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::MissingTag);
        assert_eq!(err.path.to_string(), "formattedText.entities[1].type.@type");
    }

    #[test]
    fn nested_shape_may_omit_tag() {
        let node = dispatcher()
            .decode(
                &json!({"@type": "messageText", "text": {"text": "hi", "entities": []}}),
                Expect::Class("MessageContent"),
            )
            .unwrap();
        let text = node.get("text").and_then(Value::as_object).unwrap();
        assert_eq!(text.tag(), "formattedText");
    }

    #[test]
    fn nested_shape_rejects_other_known_tag() {
        let err = dispatcher()
            .decode(
                &json!({"@type": "messageText", "text": {"@type": "ok"}}),
                Expect::Any,
            )
            .unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::ShapeMismatch { .. }));
    }

    #[test]
    fn int64_decodes_exactly() {
        let big = (1_i64 << 53) + 1;
        let node = dispatcher()
            .decode(
                &json!({"@type": "optionValueInteger", "value": big.to_string()}),
                Expect::Class("OptionValue"),
            )
            .unwrap();
        assert_eq!(node.get("value"), Some(&Value::Int64(big)));
        assert_eq!(node.to_json()["value"], json!("9007199254740993"));
    }

    #[test]
    fn int64_accepts_signs_and_rejects_garbage() {
        let d = dispatcher();
        let node = d
            .decode(&json!({"@type": "optionValueInteger", "value": "-42"}), Expect::Any)
            .unwrap();
        assert_eq!(node.get("value"), Some(&Value::Int64(-42)));

        let err = d
            .decode(&json!({"@type": "optionValueInteger", "value": "12.5"}), Expect::Any)
            .unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::KindMismatch { .. }));
        assert_eq!(err.path.to_string(), "optionValueInteger.value");

        let err = d
            .decode(&json!({"@type": "optionValueInteger", "value": 1.5}), Expect::Any)
            .unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::KindMismatch { .. }));
    }

    #[test]
    fn int53_beyond_double_precision_is_a_mismatch() {
        let d = dispatcher();
        for id in [1_i64 << 60, -(1_i64 << 53)] {
            let err = d
                .decode(&json!({"@type": "chat", "id": id, "title": "x"}), Expect::Any)
                .unwrap_err();
            assert_eq!(err.path.to_string(), "chat.id");
            assert!(matches!(err.kind, DecodeErrorKind::KindMismatch { .. }));
        }

        let edge = json!({"@type": "chat", "id": (1_i64 << 53) - 1, "title": "x"});
        assert!(d.decode(&edge, Expect::Any).is_ok());
        let outgoing = Object::new("getChat").with("chat_id", Value::Int53(1 << 60));
        assert!(d.validate(&outgoing).is_err());
    }

    #[test]
    fn int32_out_of_range_is_a_mismatch() {
        let err = dispatcher()
            .decode(&json!({"@type": "testInt", "value": 3_000_000_000_i64}), Expect::Any)
            .unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::KindMismatch {
                expected: "int32".into(),
                found: "number 3000000000".into()
            }
        );
    }

    #[test]
    fn bytes_decode_from_base64() {
        let d = dispatcher();
        let node = d
            .decode(&json!({"@type": "testBytes", "value": "AAEC/w=="}), Expect::Any)
            .unwrap();
        assert_eq!(node.get("value").and_then(Value::as_bytes), Some(&[0, 1, 2, 255][..]));

        let err = d
            .decode(&json!({"@type": "testBytes", "value": "not base64!"}), Expect::Any)
            .unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::KindMismatch { ref expected, .. } if expected == "base64 bytes"));
    }

    #[test]
    fn class_constraint_at_top_level() {
        let err = dispatcher()
            .decode(&json!({"@type": "user", "id": 1, "first_name": "A"}), Expect::Class("Chat"))
            .unwrap_err();
        assert_eq!(err.path.to_string(), "user.@type");
    }

    #[test]
    fn non_object_and_invalid_json() {
        let d = dispatcher();
        let err = d.decode(&json!([1]), Expect::Any).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::KindMismatch { .. }));
        assert!(err.path.is_root());

        let err = d.decode_str("{not json", Expect::Any).unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::InvalidJson(_)));
    }

    #[test]
    fn validate_checks_outgoing_requests() {
        let d = dispatcher();
        let ok = Object::new("getChat").with("chat_id", Value::Int53(42));
        assert!(d.validate(&ok).is_ok());

        let missing = Object::new("getChat");
        let err = d.validate(&missing).unwrap_err();
        assert_eq!(err.path.to_string(), "getChat.chat_id");

        let wrong = Object::new("getChat").with("chat_id", "42");
        assert!(d.validate(&wrong).is_err());
    }

    fn sample(catalogue: &Catalogue, tag: &str, depth: usize) -> Object {
        assert!(depth < 16, "required fields recurse through `{tag}`");
        let shape = catalogue.shape(tag).unwrap();
        let mut object = Object::new(tag);
        for field in &shape.fields {
            if field.optional && depth > 2 {
                continue;
            }
            object.insert(field.name.clone(), sample_value(catalogue, &field.kind, depth + 1));
        }
        object
    }

    fn sample_value(catalogue: &Catalogue, kind: &FieldKind, depth: usize) -> Value {
        match kind {
            FieldKind::Primitive(Primitive::Bool) => Value::Bool(true),
            FieldKind::Primitive(Primitive::Int32) => Value::Int32(-17),
            FieldKind::Primitive(Primitive::Int53) => Value::Int53((1 << 52) + 3),
            FieldKind::Primitive(Primitive::Int64) => Value::Int64((1 << 53) + 7),
            FieldKind::Primitive(Primitive::Double) => Value::Double(0.25),
            FieldKind::Primitive(Primitive::String) => Value::String("héllo".into()),
            FieldKind::Primitive(Primitive::Bytes) => Value::Bytes(vec![0, 1, 254, 255]),
            FieldKind::Shape(tag) => sample(catalogue, tag, depth).into(),
            FieldKind::Variant(class) => {
                let member = catalogue.class(class).and_then(|m| m.iter().next()).unwrap();
                sample(catalogue, member, depth).into()
            }
            FieldKind::Array(inner) => Value::Array(vec![
                sample_value(catalogue, inner, depth),
                sample_value(catalogue, inner, depth),
            ]),
        }
    }

    #[test]
    fn every_catalogue_shape_survives_encode_and_decode() {
        let d = dispatcher();
        let catalogue = d.catalogue().clone();
        for shape in catalogue.shapes() {
            let object = sample(&catalogue, &shape.tag, 0);
            let text = object.to_json().to_string();
            let node = d.decode_str(&text, Expect::Any).unwrap();
            assert_eq!(node, Node::Object(object), "{}", shape.tag);
        }
    }
}
