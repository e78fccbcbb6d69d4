//! Shape discovery for document types.
//!
//! A document's shape is its serde struct name and the declared field list.
//! Both are reported by derived `Deserialize` impls through
//! `Deserializer::deserialize_struct`, so the probe below asks `T` to
//! deserialize itself, captures the arguments of that call and aborts. No
//! value of `T` is ever produced.

use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};

/// The declared shape of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentShape {
    /// Serde name of the struct (after `#[serde(rename)]`).
    pub name: &'static str,
    /// Serde field names in declaration order.
    pub fields: &'static [&'static str],
}

/// Discovers the shape of `T`.
///
/// Returns a description of what `T` asked for instead when it does not
/// deserialize from a struct.
pub(crate) fn probe<T: DeserializeOwned>() -> Result<DocumentShape, String> {
    match T::deserialize(ShapeProbe) {
        Err(ProbeOutcome::Found(shape)) => Ok(shape),
        Err(ProbeOutcome::Rejected(reason)) => Err(reason),
        Ok(_) => Err("type deserialized without requesting a struct".to_string()),
    }
}

#[derive(Debug)]
enum ProbeOutcome {
    Found(DocumentShape),
    Rejected(String),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Found(shape) => write!(f, "found struct `{}`", shape.name),
            ProbeOutcome::Rejected(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for ProbeOutcome {}

impl de::Error for ProbeOutcome {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ProbeOutcome::Rejected(msg.to_string())
    }
}

struct ShapeProbe;

impl<'de> de::Deserializer<'de> for ShapeProbe {
    type Error = ProbeOutcome;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, ProbeOutcome>
    where
        V: Visitor<'de>,
    {
        Err(ProbeOutcome::Rejected(
            "type is self-describing, not a struct".to_string(),
        ))
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProbeOutcome>
    where
        V: Visitor<'de>,
    {
        Err(ProbeOutcome::Found(DocumentShape { name, fields }))
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value, ProbeOutcome>
    where
        V: Visitor<'de>,
    {
        Err(ProbeOutcome::Rejected(
            "type deserializes from a map (flattened or untyped fields are not supported)"
                .to_string(),
        ))
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ProbeOutcome>
    where
        V: Visitor<'de>,
    {
        Err(ProbeOutcome::Rejected(format!("`{name}` is an enum")))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct identifier ignored_any
    }
}
