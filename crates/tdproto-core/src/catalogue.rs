//! The shape catalogue.
//!
//! Plain immutable data: a lookup table from discriminator to field layout,
//! plus the class (variant set) each data constructor belongs to and the
//! class each request function returns. Catalogues are loaded from a JSON
//! artifact and never change after construction.

use crate::kind::{FieldDescriptor, FieldKind};
use crate::{ERROR_TAG, UPDATE_CLASS};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

const BUNDLED: &str = include_str!("../catalogue/td_api.json");

/// What a shape is used for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeRole {
    /// A data constructor belonging to a class.
    Data { class: String },
    /// A request function and the class of its success result.
    Request { returns: String },
}

/// Layout of one tagged shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    pub tag: String,
    pub role: ShapeRole,
    pub fields: Vec<FieldDescriptor>,
}

impl ShapeDescriptor {
    /// Describe a data constructor.
    pub fn data(
        tag: impl Into<String>,
        class: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Self {
        Self {
            tag: tag.into(),
            role: ShapeRole::Data {
                class: class.into(),
            },
            fields: fields.into_iter().collect(),
        }
    }

    /// Describe a request function.
    pub fn request(
        tag: impl Into<String>,
        returns: impl Into<String>,
        fields: impl IntoIterator<Item = FieldDescriptor>,
    ) -> Self {
        Self {
            tag: tag.into(),
            role: ShapeRole::Request {
                returns: returns.into(),
            },
            fields: fields.into_iter().collect(),
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether this shape is a request function.
    pub fn is_request(&self) -> bool {
        matches!(self.role, ShapeRole::Request { .. })
    }
}

/// Serialized catalogue layout.
#[derive(Debug, Deserialize)]
struct Artifact {
    version: String,
    #[serde(default)]
    constructors: Vec<ConstructorDef>,
    #[serde(default)]
    functions: Vec<FunctionDef>,
}

#[derive(Debug, Deserialize)]
struct ConstructorDef {
    tag: String,
    class: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Deserialize)]
struct FunctionDef {
    tag: String,
    returns: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

/// The closed registry of known shapes for one protocol version.
#[derive(Debug, Clone)]
pub struct Catalogue {
    version: String,
    shapes: HashMap<String, ShapeDescriptor>,
    classes: HashMap<String, BTreeSet<String>>,
}

impl Catalogue {
    /// Build a catalogue, checking that tags are unique and every reference
    /// resolves.
    pub fn new(
        version: impl Into<String>,
        shapes: impl IntoIterator<Item = ShapeDescriptor>,
    ) -> Result<Self, CatalogueError> {
        let mut by_tag = HashMap::new();
        let mut classes: HashMap<String, BTreeSet<String>> = HashMap::new();

        for shape in shapes {
            if !is_tag(&shape.tag) {
                return Err(CatalogueError::InvalidTag(shape.tag));
            }

            let mut seen = HashSet::new();
            for field in &shape.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(CatalogueError::DuplicateField {
                        tag: shape.tag.clone(),
                        field: field.name.clone(),
                    });
                }
            }

            if let ShapeRole::Data { class } = &shape.role {
                if !is_class(class) {
                    return Err(CatalogueError::InvalidClass(class.clone()));
                }
                classes
                    .entry(class.clone())
                    .or_default()
                    .insert(shape.tag.clone());
            }

            if by_tag.contains_key(&shape.tag) {
                return Err(CatalogueError::DuplicateTag(shape.tag));
            }
            by_tag.insert(shape.tag.clone(), shape);
        }

        let catalogue = Self {
            version: version.into(),
            shapes: by_tag,
            classes,
        };
        catalogue.check_references()?;
        Ok(catalogue)
    }

    /// Parse a catalogue artifact.
    pub fn from_json(text: &str) -> Result<Self, CatalogueError> {
        let artifact: Artifact = serde_json::from_str(text)?;

        let constructors = artifact
            .constructors
            .into_iter()
            .map(|c| ShapeDescriptor::data(c.tag, c.class, c.fields));
        let functions = artifact
            .functions
            .into_iter()
            .map(|f| ShapeDescriptor::request(f.tag, f.returns, f.fields));

        Self::new(artifact.version, constructors.chain(functions))
    }

    /// Read and parse a catalogue artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CatalogueError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// The representative subset bundled with this crate.
    pub fn bundled() -> Result<Self, CatalogueError> {
        Self::from_json(BUNDLED)
    }

    /// Protocol version this catalogue describes.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of shapes, data and request alike.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True for a catalogue with no shapes at all.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// The shape named `tag`, if the catalogue has one.
    pub fn shape(&self, tag: &str) -> Option<&ShapeDescriptor> {
        self.shapes.get(tag)
    }

    /// All shapes, in no particular order.
    pub fn shapes(&self) -> impl Iterator<Item = &ShapeDescriptor> {
        self.shapes.values()
    }

    /// Constructor tags belonging to a class.
    pub fn class(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.classes.get(name)
    }

    /// All class names, in no particular order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// The class a data constructor belongs to.
    pub fn class_of(&self, tag: &str) -> Option<&str> {
        match &self.shapes.get(tag)?.role {
            ShapeRole::Data { class } => Some(class),
            ShapeRole::Request { .. } => None,
        }
    }

    /// Whether `tag` is a constructor of `class`.
    pub fn is_member(&self, tag: &str, class: &str) -> bool {
        self.classes.get(class).is_some_and(|tags| tags.contains(tag))
    }

    /// The success-result class of a request function.
    pub fn result_class(&self, request_tag: &str) -> Option<&str> {
        match &self.shapes.get(request_tag)?.role {
            ShapeRole::Request { returns } => Some(returns),
            ShapeRole::Data { .. } => None,
        }
    }

    /// Whether `tag` names an Update variant.
    pub fn is_update(&self, tag: &str) -> bool {
        self.is_member(tag, UPDATE_CLASS)
    }

    /// Whether `tag` is the application error shape.
    pub fn is_error(&self, tag: &str) -> bool {
        tag == ERROR_TAG && self.shapes.contains_key(tag)
    }

    fn check_references(&self) -> Result<(), CatalogueError> {
        for shape in self.shapes.values() {
            if let ShapeRole::Request { returns } = &shape.role {
                if !self.classes.contains_key(returns) {
                    return Err(CatalogueError::UnknownReturn {
                        tag: shape.tag.clone(),
                        class: returns.clone(),
                    });
                }
            }

            for field in &shape.fields {
                let known = match field.kind.element() {
                    FieldKind::Variant(class) => self.classes.contains_key(class),
                    FieldKind::Shape(tag) => self.shapes.get(tag).is_some_and(|s| !s.is_request()),
                    FieldKind::Primitive(_) | FieldKind::Array(_) => true,
                };
                if !known {
                    return Err(CatalogueError::UnknownType {
                        tag: shape.tag.clone(),
                        field: field.name.clone(),
                        kind: field.kind.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn is_tag(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_class(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Error loading a catalogue.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("failed to read catalogue {path}: {message}")]
    Io { path: String, message: String },
    #[error("malformed catalogue artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate discriminator `{0}`")]
    DuplicateTag(String),
    #[error("invalid discriminator `{0}`")]
    InvalidTag(String),
    #[error("invalid class name `{0}`")]
    InvalidClass(String),
    #[error("`{tag}` declares field `{field}` twice")]
    DuplicateField { tag: String, field: String },
    #[error("`{tag}.{field}` refers to unknown type `{kind}`")]
    UnknownType {
        tag: String,
        field: String,
        kind: String,
    },
    #[error("`{tag}` returns unknown class `{class}`")]
    UnknownReturn { tag: String, class: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Primitive;

    fn int53(name: &str) -> FieldDescriptor {
        FieldDescriptor::required(name, FieldKind::Primitive(Primitive::Int53))
    }

    #[test]
    fn bundled_catalogue_loads() {
        let catalogue = Catalogue::bundled().unwrap();
        assert!(!catalogue.is_empty());
        assert_eq!(catalogue.result_class("getChat"), Some("Chat"));
        assert!(catalogue.is_member("chat", "Chat"));
        assert!(catalogue.is_update("updateChatTitle"));
        assert!(!catalogue.is_update("chat"));
        assert!(catalogue.is_error("error"));
        assert_eq!(catalogue.class_of("chatTypePrivate"), Some("ChatType"));
        assert_eq!(catalogue.class_of("getChat"), None);
    }

    #[test]
    fn rejects_duplicate_tags() {
        let err = Catalogue::new(
            "test",
            [
                ShapeDescriptor::data("ok", "Ok", []),
                ShapeDescriptor::data("ok", "Ok", []),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::DuplicateTag(tag) if tag == "ok"));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let err = Catalogue::new(
            "test",
            [ShapeDescriptor::data("point", "Point", [int53("x"), int53("x")])],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::DuplicateField { .. }));
    }

    #[test]
    fn rejects_dangling_references() {
        let err = Catalogue::new(
            "test",
            [ShapeDescriptor::data(
                "holder",
                "Holder",
                [FieldDescriptor::required("inner", FieldKind::Variant("Missing".into()))],
            )],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownType { kind, .. } if kind == "Missing"));

        let err = Catalogue::new("test", [ShapeDescriptor::request("getThing", "Thing", [])])
            .unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownReturn { .. }));
    }

    #[test]
    fn nested_shape_cannot_name_a_request() {
        let err = Catalogue::new(
            "test",
            [
                ShapeDescriptor::data("ok", "Ok", []),
                ShapeDescriptor::request("close", "Ok", []),
                ShapeDescriptor::data(
                    "wrapper",
                    "Wrapper",
                    [FieldDescriptor::required("inner", FieldKind::Shape("close".into()))],
                ),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownType { .. }));
    }

    #[test]
    fn parses_artifact() {
        let catalogue = Catalogue::from_json(
            r#"{
                "version": "t",
                "constructors": [
                    {"tag": "ok", "class": "Ok"},
                    {"tag": "point", "class": "Point", "fields": ["x:int32", "label?:string"]}
                ],
                "functions": [{"tag": "getPoint", "returns": "Point", "fields": ["id:int64"]}]
            }"#,
        )
        .unwrap();
        assert_eq!(catalogue.version(), "t");
        assert_eq!(catalogue.len(), 3);
        let point = catalogue.shape("point").unwrap();
        assert!(point.field("label").unwrap().optional);
        assert!(catalogue.shape("getPoint").unwrap().is_request());
    }

    #[test]
    fn malformed_field_spec_is_a_parse_error() {
        let err = Catalogue::from_json(
            r#"{"version": "t", "constructors": [{"tag": "ok", "class": "Ok", "fields": ["broken"]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogueError::Parse(_)));
    }
}
