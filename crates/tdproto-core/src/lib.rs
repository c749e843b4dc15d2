//! Core types for the TDLib JSON protocol.
//!
//! This crate knows the wire: the catalogue of tagged shapes, how a raw JSON
//! object resolves to one of them, and how values travel (64-bit integers as
//! decimal strings, byte strings as base64). It has no notion of requests in
//! flight; see `tdproto-client` for that.

mod catalogue;
mod dispatch;
mod envelope;
mod error;
mod kind;
mod node;
mod token;

pub use catalogue::{Catalogue, CatalogueError, ShapeDescriptor, ShapeRole};
pub use dispatch::{Dispatcher, Expect};
pub use envelope::{Envelope, encode_request};
pub use error::{DecodeError, DecodeErrorKind, FieldPath, Segment};
pub use kind::{FieldDescriptor, FieldKind, FieldSpecError, Primitive};
pub use node::{Node, Object, Unrecognized, Value};
pub use token::{Token, TokenError};

/// Discriminator field present on every tagged object.
pub const TAG_FIELD: &str = "@type";

/// Correlation token echoed from request to response.
pub const EXTRA_FIELD: &str = "@extra";

/// Instance identifier attached by a multi-instance peer.
pub const CLIENT_ID_FIELD: &str = "@client_id";

/// Class whose members are unsolicited updates.
pub const UPDATE_CLASS: &str = "Update";

/// Tag of the protocol-level error response.
pub const ERROR_TAG: &str = "error";
