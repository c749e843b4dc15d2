//! Field kinds and field specs.
//!
//! A field spec has the form `name[?]:type`, where `?` marks an optional
//! field and `type` is one of:
//! - a primitive: `int32`, `int53`, `int64`, `double`, `string`, `bytes`, `Bool`
//! - `vector<T>` for any field type `T`
//! - a lowercase constructor tag, e.g. `formattedText` (nested shape)
//! - a capitalised class name, e.g. `ChatType` (tagged variant set)

use crate::{CLIENT_ID_FIELD, EXTRA_FIELD, TAG_FIELD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scalar wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int32,
    /// Integer carried as a JSON number, at most 53 significant bits.
    Int53,
    /// Integer carried as a decimal string.
    Int64,
    Double,
    String,
    /// Binary data carried as a base64 string.
    Bytes,
}

impl Primitive {
    /// The schema name of this primitive.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int32 => "int32",
            Self::Int53 => "int53",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Bool" => Self::Bool,
            "int32" => Self::Int32,
            "int53" => Self::Int53,
            "int64" => Self::Int64,
            "double" => Self::Double,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }
}

/// What a field holds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Primitive(Primitive),
    /// Exactly one constructor, named by its tag. `@type` may be omitted.
    Shape(String),
    /// Any constructor of the named class. `@type` is required.
    Variant(String),
    Array(Box<FieldKind>),
}

impl FieldKind {
    /// The innermost element kind, looking through any arrays.
    pub fn element(&self) -> &FieldKind {
        match self {
            Self::Array(inner) => inner.element(),
            other => other,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Shape(tag) => f.write_str(tag),
            Self::Variant(class) => f.write_str(class),
            Self::Array(inner) => write!(f, "vector<{inner}>"),
        }
    }
}

impl FromStr for FieldKind {
    type Err = FieldSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(inner) = s.strip_prefix("vector<").and_then(|r| r.strip_suffix('>')) {
            return Ok(Self::Array(Box::new(inner.parse()?)));
        }
        if let Some(p) = Primitive::from_name(s) {
            return Ok(Self::Primitive(p));
        }
        if !is_identifier(s) {
            return Err(FieldSpecError::InvalidType(s.to_string()));
        }
        match s.chars().next() {
            Some(c) if c.is_ascii_uppercase() => Ok(Self::Variant(s.to_string())),
            Some(_) => Ok(Self::Shape(s.to_string())),
            None => Err(FieldSpecError::InvalidType(s.to_string())),
        }
    }
}

/// One field of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub optional: bool,
}

impl FieldDescriptor {
    /// A field that must be present.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    /// A field that may be absent or `null`.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.optional { "?" } else { "" };
        write!(f, "{}{}:{}", self.name, mark, self.kind)
    }
}

impl FromStr for FieldDescriptor {
    type Err = FieldSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, kind) = s
            .split_once(':')
            .ok_or_else(|| FieldSpecError::MissingColon(s.to_string()))?;

        let (name, optional) = match name.strip_suffix('?') {
            Some(name) => (name, true),
            None => (name, false),
        };

        if name.is_empty() {
            return Err(FieldSpecError::EmptyName);
        }
        if [TAG_FIELD, EXTRA_FIELD, CLIENT_ID_FIELD].contains(&name) {
            return Err(FieldSpecError::ReservedName(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            kind: kind.parse()?,
            optional,
        })
    }
}

impl TryFrom<String> for FieldDescriptor {
    type Error = FieldSpecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FieldDescriptor> for String {
    fn from(field: FieldDescriptor) -> Self {
        field.to_string()
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Error parsing a field spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldSpecError {
    #[error("field spec must contain ':' separator, got: {0}")]
    MissingColon(String),
    #[error("field name cannot be empty")]
    EmptyName,
    #[error("field name `{0}` is reserved for the transport envelope")]
    ReservedName(String),
    #[error("invalid field type: {0}")]
    InvalidType(String),
}
