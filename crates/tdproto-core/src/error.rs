//! Decode failures and the field paths that locate them.

use std::fmt;

/// One step into a decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A named field, or the tag of the root object.
    Field(String),
    /// A position in an array.
    Index(usize),
}

/// Location of a value inside a message, rendered like
/// `message.content.text.entities[2].type`.
///
/// The first segment of a top-level path is the outer discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// The empty path, pointing at the message itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub(crate) fn push_field(&mut self, name: &str) {
        self.0.push(Segment::Field(name.to_string()));
    }

    pub(crate) fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }

    /// A copy of this path extended by one field.
    pub(crate) fn join(&self, name: &str) -> Self {
        let mut path = self.clone();
        path.push_field(name);
        path
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Why a value failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("missing `@type` discriminator")]
    MissingTag,
    #[error("missing required field")]
    MissingField,
    #[error("expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
    #[error("`{tag}` is not a valid {expected}")]
    ShapeMismatch { tag: String, expected: String },
}

/// A decode failure and where it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at `{path}`")]
pub struct DecodeError {
    pub path: FieldPath,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(path: FieldPath, kind: DecodeErrorKind) -> Self {
        Self { path, kind }
    }

    pub(crate) fn mismatch(
        path: &FieldPath,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::new(
            path.clone(),
            DecodeErrorKind::KindMismatch {
                expected: expected.into(),
                found: found.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_path() {
        let mut path = FieldPath::root();
        assert_eq!(path.to_string(), "$");
        path.push_field("message");
        path.push_field("entities");
        path.push_index(2);
        path.push_field("@type");
        assert_eq!(path.to_string(), "message.entities[2].@type");
        path.pop();
        assert_eq!(path.to_string(), "message.entities[2]");
    }

    #[test]
    fn error_message_includes_path() {
        let err = DecodeError::new(FieldPath::root().join("chat").join("title"), DecodeErrorKind::MissingField);
        assert_eq!(err.to_string(), "missing required field at `chat.title`");
    }
}
