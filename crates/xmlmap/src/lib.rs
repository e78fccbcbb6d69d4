//! # xmlmap
//!
//! Per-type XML name overrides for flat serde documents, with one compiled
//! serializer cached per registered type.
//!
//! Document types stay plain `Serialize + Deserialize` structs. Their XML
//! shape (root element name, which fields become attributes, what each field
//! is called on the wire) is declared separately, at startup, in a
//! [`Registry`].
//!
//! ## Architecture
//!
//! - **Registry** ([`RegistryBuilder`], [`Registry`], [`OverrideSet`]): maps a
//!   [`DocumentType`] to its overrides. Built once, read-only afterwards.
//! - **Provider** ([`SerializerProvider`]): compiles a [`CompiledSerializer`]
//!   for every registered type when it is created and hands out the cached
//!   instance on every lookup.
//! - **Facade** ([`Serializer`]): string, byte, stream and async variants of
//!   serialize and deserialize, all dispatched by type to the same core.
//!
//! ## Wire format
//!
//! | Document | XML |
//! |----------|-----|
//! | root override `product` | `<product>...</product>` |
//! | `sku` as attribute `sku` | `<product sku="ABC12">` |
//! | `screen_size` as element `screen-size` | `<screen-size>13in</screen-size>` |
//! | field without override | `<title>Test</title>` |
//! | `None` | omitted |
//! | `""` | `<title/>` |
//!
//! Output is UTF-8, starts with `<?xml version="1.0" encoding="utf-8"?>` unless
//! [`XmlOptions::declaration`] is off, and never carries namespace
//! declarations.
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use xmlmap::{DocumentConfiguration, OverrideSet, Serializer};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Laptop {
//!     sku: String,
//!     title: String,
//!     screen_size: String,
//! }
//!
//! struct LaptopConfiguration;
//!
//! impl DocumentConfiguration<Laptop> for LaptopConfiguration {
//!     fn configure(&self, overrides: &mut OverrideSet) {
//!         overrides
//!             .root("product")
//!             .attribute("sku", "sku")
//!             .element("title", "title")
//!             .element("screen_size", "screen-size");
//!     }
//! }
//!
//! let serializer = Serializer::configure(|registry| {
//!     registry.add_configuration::<Laptop, _>(&LaptopConfiguration);
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
//!     "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
//!      <product sku=\"ABC12\"><title>Test</title><screen-size>13in</screen-size></product>"
//! );
//!
//! let back: Laptop = serializer.from_str(&xml)?;
//! assert_eq!(back, laptop);
//! # Ok::<(), xmlmap::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod compiled;
mod de;
pub mod document;
pub mod error;
pub mod facade;
pub mod options;
pub mod overrides;
pub mod provider;
pub mod registry;
mod ser;
pub mod shape;

#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
mod async_io;

pub use compiled::{CompiledSerializer, FieldPlan};
pub use document::{AnyDocument, Document, DocumentType};
pub use error::{ConfigurationError, Error, MalformedCause, Result};
pub use facade::Serializer;
pub use options::{XML_DECLARATION, XmlOptions};
pub use overrides::{NameOverride, OverrideSet, Placement, RootOverride};
pub use provider::SerializerProvider;
pub use registry::{DocumentConfiguration, Registration, Registry, RegistryBuilder};
pub use shape::DocumentShape;

#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub use tokio_util::sync::CancellationToken;
