//! Error types for document registration, serialization and deserialization.
//!
//! Failures fall into three groups that callers usually handle differently:
//!
//! | Error | Raised by | Meaning |
//! |-------|-----------|---------|
//! | [`Error::UnregisteredType`] | provider, facade | the type was never added to the registry |
//! | [`Error::MalformedInput`] | deserialization | the input is not well-formed XML or does not fit the document |
//! | [`ConfigurationError`] | registry builder, provider | the registration itself is invalid |
//!
//! Sink and source failures, unsupported document shapes and cancellation
//! have their own variants.

// Variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::io;

use quick_xml::escape::EscapeError;
use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// The primary error type for serializer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The document type has no registration.
    #[error("document type `{type_name}` is not registered")]
    UnregisteredType { type_name: String },

    /// The input could not be read as a document of the requested type.
    #[error("malformed `{type_name}` document{}: {source}", at_position(.position))]
    MalformedInput {
        type_name: String,
        position: Option<u64>,
        #[source]
        source: MalformedCause,
    },

    /// The registry or one of its override sets is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The document value cannot be represented as a flat XML document.
    #[error("`{type_name}` cannot be written as XML: {message}")]
    Unsupported { type_name: String, message: String },

    /// Writing to the destination sink failed.
    #[error("failed to write `{type_name}` document: {source}")]
    Write {
        type_name: String,
        #[source]
        source: io::Error,
    },

    /// Reading from the source stream failed.
    #[error("failed to read document input: {0}")]
    Io(#[from] io::Error),

    /// The caller cancelled the operation before it completed.
    #[error("operation on `{type_name}` was cancelled")]
    Cancelled { type_name: String },
}

impl Error {
    /// Returns true if this error reports a missing registration.
    pub fn is_unregistered(&self) -> bool {
        matches!(self, Error::UnregisteredType { .. })
    }

    /// Returns true if this error reports unreadable input.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedInput { .. })
    }
}

fn at_position(position: &Option<u64>) -> String {
    match position {
        Some(offset) => format!(" at byte {offset}"),
        None => String::new(),
    }
}

/// The underlying diagnostic of an [`Error::MalformedInput`].
#[derive(Error, Debug)]
pub enum MalformedCause {
    /// The XML reader rejected the input.
    #[error(transparent)]
    Syntax(#[from] quick_xml::Error),

    /// An attribute of the root element is not well-formed.
    #[error(transparent)]
    Attribute(#[from] AttrError),

    /// A character or entity reference could not be resolved.
    #[error(transparent)]
    Escape(#[from] EscapeError),

    /// The input is not UTF-8.
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The XML is well-formed but does not have the document's structure.
    #[error("{0}")]
    Structure(String),

    /// A field value does not fit the document's field type.
    #[error("{0}")]
    Content(String),
}

/// Errors raised while building the registry or compiling serializers.
///
/// These are reported during startup, before any document traffic.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("document type `{type_name}` is already registered")]
    DuplicateRegistration { type_name: String },

    #[error("`{name}` is not a valid XML name (document type `{type_name}`)")]
    InvalidXmlName { type_name: String, name: String },

    #[error("field `{field}` of `{type_name}` is overridden more than once")]
    DuplicateFieldOverride { type_name: String, field: String },

    #[error("document type `{type_name}` must deserialize from a struct: {reason}")]
    NotAStruct { type_name: String, reason: String },

    #[error("override for `{type_name}` names unknown field `{field}`")]
    UnknownField { type_name: String, field: String },

    #[error("fields of `{type_name}` map to the same {placement} name `{xml_name}`")]
    ConflictingXmlName {
        type_name: String,
        placement: &'static str,
        xml_name: String,
    },

    #[error("invalid override configuration: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Result type alias for serializer operations.
pub type Result<T> = std::result::Result<T, Error>;
