//! The public serialize/deserialize API.
//!
//! Every call resolves the compiled serializer of the document's type, then
//! performs exactly one write or read. The string, slice, stream, typed and
//! untyped variants only differ in how they hand bytes to that core.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use xmlmap::{Serializer, XmlOptions};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Laptop {
//!     sku: String,
//!     title: String,
//!     screen_size: String,
//! }
//!
//! let serializer = Serializer::configure(|registry| {
//!     registry
//!         .add_with::<Laptop, _>(|o| {
//!             o.root("product")
//!                 .attribute("sku", "sku")
//!                 .element("screen_size", "screen-size");
//!         })
//!         .options(XmlOptions::fragment());
//! })?;
//!
//! let laptop = Laptop {
//!     sku: "ABC12".into(),
//!     title: "Test".into(),
//!     screen_size: "13in".into(),
//! };
//! let xml = serializer.serialize_to_string(&laptop)?;
//! assert_eq!(
//!     xml,
//!     r#"<product sku="ABC12"><title>Test</title><screen-size>13in</screen-size></product>"#
//! );
//! assert_eq!(serializer.from_str::<Laptop>(&xml)?, laptop);
//! # Ok::<(), xmlmap::Error>(())
//! ```

use std::any::Any;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::compiled::CompiledSerializer;
use crate::document::{AnyDocument, Document, DocumentType};
use crate::error::{ConfigurationError, Error, Result};
use crate::provider::SerializerProvider;
use crate::registry::{Registry, RegistryBuilder};

/// Serializes and deserializes registered document types.
///
/// Cloning is cheap; clones share the same compiled serializers.
#[derive(Debug, Clone)]
pub struct Serializer {
    provider: Arc<SerializerProvider>,
}

impl Serializer {
    /// Creates a facade over `provider`.
    pub fn new(provider: SerializerProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Compiles `registry` and wraps it.
    pub fn from_registry(registry: Registry) -> std::result::Result<Self, ConfigurationError> {
        Ok(Self::new(SerializerProvider::new(registry)?))
    }

    /// Builds the registry in `configure`, compiles it and wraps it.
    pub fn configure<F>(configure: F) -> std::result::Result<Self, ConfigurationError>
    where
        F: FnOnce(&mut RegistryBuilder),
    {
        Ok(Self::new(SerializerProvider::configure(configure)?))
    }

    /// The underlying provider.
    pub fn provider(&self) -> &SerializerProvider {
        &self.provider
    }

    pub(crate) fn compiled(&self, document: &DocumentType) -> Result<&Arc<CompiledSerializer>> {
        self.provider.get(document)
    }

    /// Serializes `document` to an XML string.
    pub fn serialize_to_string<T: Document>(&self, document: &T) -> Result<String> {
        let bytes = self.serialize_to_vec(document)?;
        into_string::<T>(bytes)
    }

    /// Serializes a type-erased document to an XML string.
    ///
    /// The concrete type is taken from the value behind the reference, so pass
    /// `boxed.as_ref()` rather than `&boxed` for an [`AnyDocument`].
    pub fn serialize_any_to_string(&self, document: &dyn Any) -> Result<String> {
        let mut out = Vec::new();
        self.serialize_any_to_writer(document, &mut out)?;
        String::from_utf8(out).map_err(|e| Error::Write {
            type_name: format!("{:?}", document.type_id()),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }

    /// Serializes `document` into a byte vector.
    pub fn serialize_to_vec<T: Document>(&self, document: &T) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_to_writer(document, &mut out)?;
        Ok(out)
    }

    /// Writes `document` to `out` and flushes it.
    pub fn serialize_to_writer<T, W>(&self, document: &T, out: W) -> Result<()>
    where
        T: Document,
        W: Write,
    {
        let doc_type = DocumentType::of::<T>();
        tracing::trace!(document = doc_type.name(), "serializing document");
        self.compiled(&doc_type)?.write(document, out)
    }

    /// Writes a type-erased document to `out` and flushes it.
    pub fn serialize_any_to_writer(&self, document: &dyn Any, out: &mut dyn Write) -> Result<()> {
        let compiled = self.provider.get_by_id(document.type_id())?;
        tracing::trace!(
            document = compiled.document_type().name(),
            "serializing type-erased document"
        );
        compiled.write_any(document, out)
    }

    /// Reads a document of type `document` from XML text.
    pub fn deserialize_from_str(&self, xml: &str, document: &DocumentType) -> Result<AnyDocument> {
        self.deserialize_from_slice(xml.as_bytes(), document)
    }

    /// Reads a document of type `document` from XML bytes.
    pub fn deserialize_from_slice(
        &self,
        bytes: &[u8],
        document: &DocumentType,
    ) -> Result<AnyDocument> {
        tracing::trace!(document = document.name(), len = bytes.len(), "deserializing document");
        self.compiled(document)?.read_any(bytes)
    }

    /// Reads a document of type `document` from `reader`, starting at its
    /// current position and consuming it to the end.
    pub fn deserialize_from_reader<R: Read>(
        &self,
        mut reader: R,
        document: &DocumentType,
    ) -> Result<AnyDocument> {
        let compiled = self.compiled(document)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        tracing::trace!(document = document.name(), len = bytes.len(), "deserializing document");
        compiled.read_any(&bytes)
    }

    /// Reads a `T` from XML text.
    pub fn from_str<T: Document>(&self, xml: &str) -> Result<T> {
        self.from_slice(xml.as_bytes())
    }

    /// Reads a `T` from XML bytes.
    pub fn from_slice<T: Document>(&self, bytes: &[u8]) -> Result<T> {
        let doc_type = DocumentType::of::<T>();
        tracing::trace!(document = doc_type.name(), len = bytes.len(), "deserializing document");
        self.compiled(&doc_type)?.read(bytes)
    }

    /// Reads a `T` from `reader`, starting at its current position.
    pub fn from_reader<T: Document, R: Read>(&self, mut reader: R) -> Result<T> {
        let compiled = self.compiled(&DocumentType::of::<T>())?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        compiled.read(&bytes)
    }
}

fn into_string<T: Document>(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Write {
        type_name: DocumentType::of::<T>().name().to_string(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })
}
