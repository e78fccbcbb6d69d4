//! Document registry.
//!
//! The registry maps each [`DocumentType`] to the [`OverrideSet`] that
//! configures its XML shape. It is filled once at startup through a
//! [`RegistryBuilder`] and frozen by [`RegistryBuilder::build`]; the resulting
//! [`Registry`] has no mutating methods.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use xmlmap::{DocumentType, Registry};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Laptop {
//!     sku: String,
//!     title: String,
//! }
//!
//! let mut builder = Registry::builder();
//! builder.add_with::<Laptop, _>(|overrides| {
//!     overrides.root("product").attribute("sku", "sku");
//! });
//! let registry = builder.build()?;
//!
//! assert!(registry.contains(&DocumentType::of::<Laptop>()));
//! # Ok::<(), xmlmap::ConfigurationError>(())
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::compiled::Codec;
use crate::document::{Document, DocumentType};
use crate::error::ConfigurationError;
use crate::options::XmlOptions;
use crate::overrides::OverrideSet;

/// Configures the overrides of one document type.
///
/// Implemented by per-type configurator objects so the document types stay
/// free of XML concerns.
pub trait DocumentConfiguration<T: Document> {
    /// Populates the override set of `T`.
    fn configure(&self, overrides: &mut OverrideSet);
}

/// One registered document type.
pub struct Registration {
    document: DocumentType,
    overrides: OverrideSet,
    pub(crate) codec: Codec,
}

impl Registration {
    /// The registered type.
    pub fn document_type(&self) -> DocumentType {
        self.document
    }

    /// The overrides installed for the type.
    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("document", &self.document)
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Collects registrations during startup.
///
/// `add*` calls chain; the first invalid registration is reported by
/// [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
    index: HashMap<DocumentType, usize>,
    options: XmlOptions,
    error: Option<ConfigurationError>,
}

impl RegistryBuilder {
    /// Creates an empty builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` with the given overrides.
    pub fn add<T: Document>(&mut self, overrides: OverrideSet) -> &mut Self {
        let document = DocumentType::of::<T>();

        if self.error.is_some() {
            return self;
        }
        if self.index.contains_key(&document) {
            self.error = Some(ConfigurationError::DuplicateRegistration {
                type_name: document.name().to_string(),
            });
            return self;
        }
        if let Err(e) = overrides.validate(document.name()) {
            self.error = Some(e);
            return self;
        }

        tracing::debug!(
            document = document.name(),
            overrides = overrides.fields().len(),
            root = overrides.root_override().map(|r| r.xml_name.as_str()),
            "registered document type"
        );

        self.index.insert(document, self.registrations.len());
        self.registrations.push(Registration {
            document,
            overrides,
            codec: Codec::of::<T>(),
        });
        self
    }

    /// Registers `T`, building its overrides in `configure`.
    pub fn add_with<T, F>(&mut self, configure: F) -> &mut Self
    where
        T: Document,
        F: FnOnce(&mut OverrideSet),
    {
        let mut overrides = OverrideSet::new();
        configure(&mut overrides);
        self.add::<T>(overrides)
    }

    /// Registers `T` through its configurator object.
    pub fn add_configuration<T, C>(&mut self, configuration: &C) -> &mut Self
    where
        T: Document,
        C: DocumentConfiguration<T> + ?Sized,
    {
        self.add_with::<T, _>(|overrides| configuration.configure(overrides))
    }

    /// Sets the writer options.
    pub fn options(&mut self, options: XmlOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> Result<Registry, ConfigurationError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Registry {
            registrations: self.registrations,
            index: self.index,
            options: self.options,
        })
    }
}

/// Read-only mapping from document type to overrides.
pub struct Registry {
    registrations: Vec<Registration>,
    index: HashMap<DocumentType, usize>,
    options: XmlOptions,
}

impl Registry {
    /// Starts a new registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up the registration of a type.
    pub fn get(&self, document: &DocumentType) -> Option<&Registration> {
        self.index.get(document).map(|&i| &self.registrations[i])
    }

    /// Returns true if the type is registered.
    pub fn contains(&self, document: &DocumentType) -> bool {
        self.index.contains_key(document)
    }

    /// Registered types in registration order.
    pub fn document_types(&self) -> impl Iterator<Item = DocumentType> + '_ {
        self.registrations.iter().map(|r| r.document)
    }

    /// Registrations in registration order.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Writer options.
    pub fn options(&self) -> &XmlOptions {
        &self.options
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "document_types",
                &self.document_types().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}
