//! Document types and their runtime identifiers.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value that can be registered and written as a flat XML document.
///
/// Implemented for every `Serialize + DeserializeOwned` type that is
/// `Send + Sync + 'static`. Whether the type is actually flat is checked when
/// its serializer is compiled.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Document for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A type-erased deserialized document, returned by the untyped read calls.
pub type AnyDocument = Box<dyn Any + Send + Sync>;

/// Runtime identifier of a document type, used as the registry key.
///
/// Two identifiers are equal when they describe the same Rust type; the type
/// name is carried along for diagnostics only.
#[derive(Clone, Copy)]
pub struct DocumentType {
    id: TypeId,
    name: &'static str,
}

impl DocumentType {
    /// Returns the identifier of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the described type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type name without module path or generic arguments.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for DocumentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DocumentType {}

impl Hash for DocumentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DocumentType").field(&self.name).finish()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Laptop;

    mod nested {
        pub struct Wrapper<T>(pub T);
    }

    #[test]
    fn test_document_type_identity() {
        assert_eq!(DocumentType::of::<Laptop>(), DocumentType::of::<Laptop>());
        assert_ne!(DocumentType::of::<Laptop>(), DocumentType::of::<String>());
        assert_eq!(DocumentType::of::<Laptop>().id(), TypeId::of::<Laptop>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(DocumentType::of::<Laptop>().short_name(), "Laptop");
        assert_eq!(
            DocumentType::of::<nested::Wrapper<Laptop>>().short_name(),
            "Wrapper"
        );
        assert_eq!(DocumentType::of::<Laptop>().to_string(), "Laptop");
        assert!(DocumentType::of::<Laptop>().name().ends_with("::Laptop"));
    }
}
