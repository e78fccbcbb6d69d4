//! Serializer provider.
//!
//! The provider owns the frozen [`Registry`] and one [`CompiledSerializer`]
//! per registered type. All serializers are compiled when the provider is
//! created, so configuration mistakes surface at startup and request-time
//! lookups are plain map reads.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compiled::CompiledSerializer;
use crate::document::DocumentType;
use crate::error::{ConfigurationError, Error, Result};
use crate::registry::{Registry, RegistryBuilder};

/// Builds and caches the compiled serializer of every registered type.
#[derive(Debug)]
pub struct SerializerProvider {
    registry: Registry,
    compiled: HashMap<TypeId, Arc<CompiledSerializer>>,
}

impl SerializerProvider {
    /// Compiles a serializer for every registration in `registry`.
    pub fn new(registry: Registry) -> std::result::Result<Self, ConfigurationError> {
        let mut compiled = HashMap::with_capacity(registry.len());

        for registration in registry.registrations() {
            let serializer = CompiledSerializer::compile(registration, registry.options())?;
            tracing::debug!(
                document = registration.document_type().name(),
                root = serializer.root_name(),
                fields = serializer.fields().len(),
                "compiled serializer"
            );
            compiled.insert(registration.document_type().id(), Arc::new(serializer));
        }

        Ok(Self { registry, compiled })
    }

    /// Builds the registry in `configure` and compiles it.
    ///
    /// ```
    /// use serde::{Deserialize, Serialize};
    /// use xmlmap::{DocumentType, SerializerProvider};
    ///
    /// #[derive(Serialize, Deserialize)]
    /// struct Laptop {
    ///     sku: String,
    /// }
    ///
    /// let provider = SerializerProvider::configure(|registry| {
    ///     registry.add_with::<Laptop, _>(|o| {
    ///         o.root("product");
    ///     });
    /// })?;
    /// let serializer = provider.get(&DocumentType::of::<Laptop>())?;
    /// assert_eq!(serializer.root_name(), "product");
    /// # Ok::<(), xmlmap::Error>(())
    /// ```
    pub fn configure<F>(configure: F) -> std::result::Result<Self, ConfigurationError>
    where
        F: FnOnce(&mut RegistryBuilder),
    {
        let mut builder = Registry::builder();
        configure(&mut builder);
        Self::new(builder.build()?)
    }

    /// Returns the cached serializer of `document`.
    pub fn get(&self, document: &DocumentType) -> Result<&Arc<CompiledSerializer>> {
        self.lookup(document).ok_or_else(|| {
            tracing::debug!(document = document.name(), "document type is not registered");
            Error::UnregisteredType {
                type_name: document.name().to_string(),
            }
        })
    }

    /// Returns the cached serializer of `document`, if registered.
    pub fn lookup(&self, document: &DocumentType) -> Option<&Arc<CompiledSerializer>> {
        self.compiled.get(&document.id())
    }

    /// Lookup by raw type id, for type-erased documents.
    pub(crate) fn get_by_id(&self, id: TypeId) -> Result<&Arc<CompiledSerializer>> {
        self.compiled.get(&id).ok_or_else(|| {
            tracing::debug!(type_id = ?id, "document type is not registered");
            Error::UnregisteredType {
                type_name: format!("{:?}", id),
            }
        })
    }

    /// The registry the provider was built from.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
