//! Compiled, type-specific serializers.
//!
//! A [`CompiledSerializer`] joins a document type's declared shape with its
//! override set into a field plan: every declared field with its placement and
//! XML name, in declaration order. The plan is what the writer walks and what
//! the reader uses to map attribute and element names back to fields.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::de::{self, DecodeError};
use crate::document::{AnyDocument, Document, DocumentType};
use crate::error::{ConfigurationError, Error, Result};
use crate::options::XmlOptions;
use crate::overrides::{Placement, check_xml_name};
use crate::registry::Registration;
use crate::ser::{self, WriteError};
use crate::shape::{self, DocumentShape};

type ProbeFn = fn() -> std::result::Result<DocumentShape, String>;
type WriteFn = fn(&CompiledSerializer, &dyn Any, &mut dyn Write) -> Result<()>;
type ReadFn = fn(&CompiledSerializer, &[u8]) -> Result<AnyDocument>;

/// Entry points monomorphized for one registered type.
#[derive(Clone, Copy)]
pub(crate) struct Codec {
    probe: ProbeFn,
    write: WriteFn,
    read: ReadFn,
}

impl Codec {
    pub(crate) fn of<T: Document>() -> Self {
        Self {
            probe: shape::probe::<T>,
            write: write_erased::<T>,
            read: read_erased::<T>,
        }
    }
}

fn write_erased<T: Document>(
    compiled: &CompiledSerializer,
    document: &dyn Any,
    out: &mut dyn Write,
) -> Result<()> {
    match document.downcast_ref::<T>() {
        Some(document) => compiled.write(document, out),
        None => Err(compiled.type_mismatch()),
    }
}

fn read_erased<T: Document>(compiled: &CompiledSerializer, input: &[u8]) -> Result<AnyDocument> {
    let document: T = compiled.read(input)?;
    Ok(Box::new(document))
}

/// How one field is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    /// Serde name of the field.
    pub field: &'static str,
    /// Attribute or element.
    pub placement: Placement,
    /// Name written to the document.
    pub xml_name: String,
}

/// The cached serializer of one document type.
pub struct CompiledSerializer {
    document: DocumentType,
    shape: DocumentShape,
    root: String,
    fields: Vec<FieldPlan>,
    by_field: HashMap<&'static str, usize>,
    attributes: HashMap<String, usize>,
    elements: HashMap<String, usize>,
    options: XmlOptions,
    codec: Codec,
}

impl CompiledSerializer {
    /// Compiles the serializer of a registration.
    pub(crate) fn compile(
        registration: &Registration,
        options: &XmlOptions,
    ) -> std::result::Result<Self, ConfigurationError> {
        let document = registration.document_type();
        let type_name = document.name();
        let codec = registration.codec;
        let overrides = registration.overrides();

        let shape = (codec.probe)().map_err(|reason| ConfigurationError::NotAStruct {
            type_name: type_name.to_string(),
            reason,
        })?;

        if let Some(unknown) = overrides
            .fields()
            .iter()
            .find(|o| !shape.fields.contains(&o.field.as_str()))
        {
            return Err(ConfigurationError::UnknownField {
                type_name: type_name.to_string(),
                field: unknown.field.clone(),
            });
        }

        let mut fields = Vec::with_capacity(shape.fields.len());
        let mut by_field = HashMap::with_capacity(shape.fields.len());
        let mut attributes = HashMap::new();
        let mut elements = HashMap::new();

        for (index, &field) in shape.fields.iter().enumerate() {
            let (placement, xml_name) = match overrides.find(field) {
                Some(o) => (o.kind, o.xml_name.clone()),
                None => {
                    check_xml_name(type_name, field)?;
                    (Placement::Element, field.to_string())
                }
            };

            let names = match placement {
                Placement::Attribute => &mut attributes,
                Placement::Element => &mut elements,
            };
            if names.insert(xml_name.clone(), index).is_some() {
                return Err(ConfigurationError::ConflictingXmlName {
                    type_name: type_name.to_string(),
                    placement: placement.as_str(),
                    xml_name,
                });
            }

            by_field.insert(field, index);
            fields.push(FieldPlan {
                field,
                placement,
                xml_name,
            });
        }

        let root = match overrides.root_override() {
            Some(root) => root.xml_name.clone(),
            None => {
                check_xml_name(type_name, shape.name)?;
                shape.name.to_string()
            }
        };

        Ok(Self {
            document,
            shape,
            root,
            fields,
            by_field,
            attributes,
            elements,
            options: options.clone(),
            codec,
        })
    }

    /// The declared shape the plan was built from.
    pub fn shape(&self) -> &DocumentShape {
        &self.shape
    }

    /// The document type this serializer was compiled for.
    pub fn document_type(&self) -> DocumentType {
        self.document
    }

    /// Name of the root element.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Field plan in declaration order.
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// Writer options.
    pub fn options(&self) -> &XmlOptions {
        &self.options
    }

    /// Plan index of a serde field.
    pub(crate) fn field_index(&self, field: &str) -> Option<usize> {
        self.by_field.get(field).copied()
    }

    /// Plan index of the field written as attribute `name`.
    pub(crate) fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.get(name).copied()
    }

    /// Plan index of the field written as element `name`.
    pub(crate) fn element_index(&self, name: &str) -> Option<usize> {
        self.elements.get(name).copied()
    }

    /// Writes `document` to `out` and flushes it.
    pub fn write<T, W>(&self, document: &T, out: W) -> Result<()>
    where
        T: Serialize + 'static,
        W: Write,
    {
        if TypeId::of::<T>() != self.document.id() {
            return Err(self.type_mismatch());
        }
        ser::write_document(self, document, out).map_err(|e| self.write_error(e))
    }

    /// Reads a document of type `T` from `input`.
    pub fn read<T>(&self, input: &[u8]) -> Result<T>
    where
        T: DeserializeOwned + 'static,
    {
        if TypeId::of::<T>() != self.document.id() {
            return Err(self.type_mismatch());
        }
        de::read_document(self, input).map_err(|e| self.decode_error(e))
    }

    /// Writes a type-erased document.
    pub(crate) fn write_any(&self, document: &dyn Any, out: &mut dyn Write) -> Result<()> {
        (self.codec.write)(self, document, out)
    }

    /// Reads a type-erased document.
    pub(crate) fn read_any(&self, input: &[u8]) -> Result<AnyDocument> {
        (self.codec.read)(self, input)
    }

    fn type_mismatch(&self) -> Error {
        Error::Unsupported {
            type_name: self.document.name().to_string(),
            message: "value is not of the type this serializer was compiled for".to_string(),
        }
    }

    fn write_error(&self, err: WriteError) -> Error {
        let type_name = self.document.name().to_string();
        match err {
            WriteError::Io(source) => Error::Write { type_name, source },
            WriteError::Unsupported(message) => Error::Unsupported { type_name, message },
        }
    }

    fn decode_error(&self, err: DecodeError) -> Error {
        Error::MalformedInput {
            type_name: self.document.name().to_string(),
            position: err.position,
            source: err.cause,
        }
    }
}

impl fmt::Debug for CompiledSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSerializer")
            .field("document", &self.document)
            .field("root", &self.root)
            .field("fields", &self.fields)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct LaptopDocument {
        sku: String,
        title: String,
        description: Option<String>,
        screen_size: String,
    }

    fn compile_laptop(
        configure: impl FnOnce(&mut crate::OverrideSet),
    ) -> std::result::Result<CompiledSerializer, ConfigurationError> {
        let mut builder = Registry::builder();
        builder.add_with::<LaptopDocument, _>(configure);
        let registry = builder.build()?;
        let registration = registry
            .get(&DocumentType::of::<LaptopDocument>())
            .expect("registered");
        CompiledSerializer::compile(registration, registry.options())
    }

    #[test]
    fn test_plan_follows_declaration_order() {
        let compiled = compile_laptop(|o| {
            o.element("screen_size", "screen-size")
                .attribute("sku", "sku")
                .root("product");
        })
        .unwrap();

        assert_eq!(compiled.root_name(), "product");
        let plan: Vec<_> = compiled
            .fields()
            .iter()
            .map(|f| (f.field, f.placement, f.xml_name.as_str()))
            .collect();
        assert_eq!(
            plan,
            vec![
                ("sku", Placement::Attribute, "sku"),
                ("title", Placement::Element, "title"),
                ("description", Placement::Element, "description"),
                ("screen_size", Placement::Element, "screen-size"),
            ]
        );
        assert_eq!(compiled.attribute_index("sku"), Some(0));
        assert_eq!(compiled.element_index("screen-size"), Some(3));
        assert_eq!(compiled.element_index("screen_size"), None);
        assert_eq!(compiled.field_index("description"), Some(2));
    }

    #[test]
    fn test_default_root_is_type_name() {
        let compiled = compile_laptop(|_| {}).unwrap();
        assert_eq!(compiled.root_name(), "LaptopDocument");
    }

    #[test]
    fn test_shape_is_exposed() {
        let compiled = compile_laptop(|o| {
            o.root("product");
        })
        .unwrap();
        assert_eq!(
            compiled.shape(),
            &DocumentShape {
                name: "LaptopDocument",
                fields: &["sku", "title", "description", "screen_size"],
            }
        );
    }

    #[test]
    fn test_default_names_must_be_xml_names() {
        #[derive(Serialize, Deserialize)]
        struct Spaced {
            sku: String,
            #[serde(rename = "screen size")]
            screen_size: String,
        }

        #[derive(Serialize, Deserialize)]
        #[serde(rename = "my doc")]
        struct SpacedRoot {
            sku: String,
        }

        fn compile<T: crate::Document>(
            configure: impl FnOnce(&mut crate::OverrideSet),
        ) -> std::result::Result<CompiledSerializer, ConfigurationError> {
            let mut builder = Registry::builder();
            builder.add_with::<T, _>(configure);
            let registry = builder.build()?;
            let registration = registry.get(&DocumentType::of::<T>()).expect("registered");
            CompiledSerializer::compile(registration, registry.options())
        }

        let err = compile::<Spaced>(|o| {
            o.root("product");
        })
        .err()
        .unwrap();
        assert!(matches!(
            err,
            ConfigurationError::InvalidXmlName { ref name, .. } if name == "screen size"
        ));

        // An explicit override replaces the field's own name
        let compiled = compile::<Spaced>(|o| {
            o.root("product").element("screen size", "screen-size");
        })
        .unwrap();
        assert_eq!(compiled.element_index("screen-size"), Some(1));

        let err = compile::<SpacedRoot>(|_| {}).err().unwrap();
        assert!(matches!(
            err,
            ConfigurationError::InvalidXmlName { ref name, .. } if name == "my doc"
        ));

        let compiled = compile::<SpacedRoot>(|o| {
            o.root("doc");
        })
        .unwrap();
        assert_eq!(compiled.root_name(), "doc");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = compile_laptop(|o| {
            o.attribute("ram_volume", "ram");
        });
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownField { ref field, .. }) if field == "ram_volume"
        ));
    }

    #[test]
    fn test_conflicting_element_names() {
        let result = compile_laptop(|o| {
            o.element("description", "title");
        });
        assert!(matches!(
            result,
            Err(ConfigurationError::ConflictingXmlName { placement: "element", ref xml_name, .. })
                if xml_name == "title"
        ));
    }

    #[test]
    fn test_attribute_and_element_may_share_a_name() {
        let compiled = compile_laptop(|o| {
            o.attribute("sku", "title");
        })
        .unwrap();
        assert_eq!(compiled.attribute_index("title"), Some(0));
        assert_eq!(compiled.element_index("title"), Some(1));
    }

    #[test]
    fn test_typed_calls_check_the_type() {
        let compiled = compile_laptop(|_| {}).unwrap();
        let mut out = Vec::new();
        let result = compiled.write(&"not a laptop".to_string(), &mut out);
        assert!(matches!(result, Err(Error::Unsupported { .. })));
        assert!(out.is_empty());
    }
}
