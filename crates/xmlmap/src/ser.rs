//! XML serialization through a custom `serde::Serializer`.
//!
//! Serialization happens in two steps:
//!
//! - **Collect**: the document's `Serialize` impl drives [`DocumentCollector`],
//!   which accepts exactly one struct and turns every field into an optional
//!   scalar string, indexed by the compiled field plan.
//! - **Emit**: the collected values are written with quick-xml. Attributes
//!   must precede child elements, so the values are buffered first rather than
//!   streamed in field order.
//!
//! No namespace declarations are ever written.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use serde::ser::{self, Impossible, Serialize};

use crate::compiled::CompiledSerializer;
use crate::overrides::{Placement, is_valid_xml_name};

/// Errors raised while writing a document.
#[derive(Debug)]
pub(crate) enum WriteError {
    /// The sink failed.
    Io(io::Error),
    /// The document is not a flat struct of scalars.
    Unsupported(String),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Io(e) => write!(f, "IO error: {}", e),
            WriteError::Unsupported(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Io(e) => Some(e),
            WriteError::Unsupported(_) => None,
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        WriteError::Io(err)
    }
}

impl From<quick_xml::Error> for WriteError {
    fn from(err: quick_xml::Error) -> Self {
        WriteError::Io(io::Error::other(err))
    }
}

impl ser::Error for WriteError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        WriteError::Unsupported(msg.to_string())
    }
}

type WriteResult<T> = std::result::Result<T, WriteError>;

/// Collected field values, in plan order, plus fields the plan does not know.
struct FieldValues {
    planned: Vec<Option<String>>,
    extra: Vec<(&'static str, String)>,
}

/// Serializes `document` as a flat XML document and flushes `out`.
pub(crate) fn write_document<T, W>(
    compiled: &CompiledSerializer,
    document: &T,
    out: W,
) -> WriteResult<()>
where
    T: Serialize + ?Sized,
    W: Write,
{
    let values = document.serialize(DocumentCollector { compiled })?;
    emit(compiled, &values, out)
}

fn emit<W: Write>(compiled: &CompiledSerializer, values: &FieldValues, out: W) -> WriteResult<()> {
    let options = compiled.options();
    let mut writer = match options.indent {
        Some(spaces) => Writer::new_with_indent(out, b' ', spaces),
        None => Writer::new(out),
    };

    if options.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    }

    let root_name = compiled.root_name();
    let mut root = BytesStart::new(root_name);
    for (plan, value) in compiled.fields().iter().zip(&values.planned) {
        if let (Placement::Attribute, Some(value)) = (plan.placement, value) {
            root.push_attribute(Attribute {
                key: QName(plan.xml_name.as_bytes()),
                value: Cow::Owned(escape_attribute(value).into_bytes()),
            });
        }
    }

    let mut children: Vec<(&str, &str)> = compiled
        .fields()
        .iter()
        .zip(&values.planned)
        .filter(|(plan, _)| plan.placement == Placement::Element)
        .filter_map(|(plan, value)| value.as_deref().map(|v| (plan.xml_name.as_str(), v)))
        .collect();
    children.extend(values.extra.iter().map(|(name, value)| (*name, value.as_str())));

    if children.is_empty() {
        writer.write_event(Event::Empty(root))?;
    } else {
        writer.write_event(Event::Start(root))?;
        for (name, value) in children {
            write_text_element(&mut writer, name, value)?;
        }
        writer.write_event(Event::End(BytesEnd::new(root_name)))?;
    }

    writer.into_inner().flush()?;
    Ok(())
}

/// Escapes an attribute value, keeping tab, CR and LF as character
/// references so readers do not normalize them to spaces.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    if !escaped.contains(['\t', '\n', '\r']) {
        return escaped.into_owned();
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    out
}

/// Returns true for characters allowed in XML 1.0 content.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
    )
}

/// Writes `<name>value</name>`, or `<name/>` for an empty value.
fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> WriteResult<()> {
    if value.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

fn not_a_struct(compiled: &CompiledSerializer, what: &str) -> WriteError {
    WriteError::Unsupported(format!(
        "document must serialize as a struct, found {} (root `{}`)",
        what,
        compiled.root_name()
    ))
}

/// Accepts the top-level struct of a document.
struct DocumentCollector<'a> {
    compiled: &'a CompiledSerializer,
}

impl<'a> ser::Serializer for DocumentCollector<'a> {
    type Ok = FieldValues;
    type Error = WriteError;

    type SerializeSeq = Impossible<FieldValues, WriteError>;
    type SerializeTuple = Impossible<FieldValues, WriteError>;
    type SerializeTupleStruct = Impossible<FieldValues, WriteError>;
    type SerializeTupleVariant = Impossible<FieldValues, WriteError>;
    type SerializeMap = Impossible<FieldValues, WriteError>;
    type SerializeStruct = FieldCollector<'a>;
    type SerializeStructVariant = Impossible<FieldValues, WriteError>;

    fn serialize_bool(self, _v: bool) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a boolean"))
    }

    fn serialize_i8(self, v: i8) -> WriteResult<FieldValues> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> WriteResult<FieldValues> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> WriteResult<FieldValues> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, _v: i64) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a number"))
    }

    fn serialize_u8(self, v: u8) -> WriteResult<FieldValues> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> WriteResult<FieldValues> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> WriteResult<FieldValues> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, _v: u64) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a number"))
    }

    fn serialize_f32(self, v: f32) -> WriteResult<FieldValues> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, _v: f64) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a number"))
    }

    fn serialize_char(self, _v: char) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a character"))
    }

    fn serialize_str(self, _v: &str) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a string"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "bytes"))
    }

    fn serialize_none(self) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "`None`"))
    }

    fn serialize_some<T>(self, value: &T) -> WriteResult<FieldValues>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, "a unit value"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, &format!("unit struct `{}`", name)))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> WriteResult<FieldValues> {
        Err(not_a_struct(self.compiled, &format!("enum `{}`", name)))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> WriteResult<FieldValues>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> WriteResult<FieldValues>
    where
        T: ?Sized + Serialize,
    {
        Err(not_a_struct(self.compiled, &format!("enum `{}`", name)))
    }

    fn serialize_seq(self, _len: Option<usize>) -> WriteResult<Self::SerializeSeq> {
        Err(not_a_struct(self.compiled, "a sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> WriteResult<Self::SerializeTuple> {
        Err(not_a_struct(self.compiled, "a tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeTupleStruct> {
        Err(not_a_struct(self.compiled, &format!("tuple struct `{}`", name)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeTupleVariant> {
        Err(not_a_struct(self.compiled, &format!("enum `{}`", name)))
    }

    fn serialize_map(self, _len: Option<usize>) -> WriteResult<Self::SerializeMap> {
        Err(not_a_struct(self.compiled, "a map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeStruct> {
        Ok(FieldCollector {
            compiled: self.compiled,
            values: FieldValues {
                planned: vec![None; self.compiled.fields().len()],
                extra: Vec::new(),
            },
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeStructVariant> {
        Err(not_a_struct(self.compiled, &format!("enum `{}`", name)))
    }
}

/// Collects the fields of the document struct.
struct FieldCollector<'a> {
    compiled: &'a CompiledSerializer,
    values: FieldValues,
}

impl<'a> ser::SerializeStruct for FieldCollector<'a> {
    type Ok = FieldValues;
    type Error = WriteError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> WriteResult<()>
    where
        T: ?Sized + Serialize,
    {
        let value = value.serialize(ScalarSerializer { field: key })?;
        match self.compiled.field_index(key) {
            Some(index) => self.values.planned[index] = value,
            // Serialize-only fields keep their natural name
            None => {
                if let Some(value) = value {
                    if !is_valid_xml_name(key) {
                        return Err(WriteError::Unsupported(format!(
                            "field `{}` is not a valid XML element name",
                            key
                        )));
                    }
                    self.values.extra.push((key, value));
                }
            }
        }
        Ok(())
    }

    fn end(self) -> WriteResult<FieldValues> {
        Ok(self.values)
    }
}

/// Turns one field value into its text form. `None` means "omit".
struct ScalarSerializer {
    field: &'static str,
}

impl ScalarSerializer {
    fn text(&self, v: &str) -> WriteResult<Option<String>> {
        match v.chars().find(|&c| !is_xml_char(c)) {
            Some(c) => Err(WriteError::Unsupported(format!(
                "field `{}` contains U+{:04X}, which XML 1.0 does not allow",
                self.field, c as u32
            ))),
            None => Ok(Some(v.to_string())),
        }
    }

    fn not_scalar(&self, what: &str) -> WriteError {
        WriteError::Unsupported(format!(
            "field `{}` is {}; only scalar fields can be written",
            self.field, what
        ))
    }
}

impl ser::Serializer for ScalarSerializer {
    type Ok = Option<String>;
    type Error = WriteError;

    type SerializeSeq = Impossible<Option<String>, WriteError>;
    type SerializeTuple = Impossible<Option<String>, WriteError>;
    type SerializeTupleStruct = Impossible<Option<String>, WriteError>;
    type SerializeTupleVariant = Impossible<Option<String>, WriteError>;
    type SerializeMap = Impossible<Option<String>, WriteError>;
    type SerializeStruct = Impossible<Option<String>, WriteError>;
    type SerializeStructVariant = Impossible<Option<String>, WriteError>;

    fn serialize_bool(self, v: bool) -> WriteResult<Option<String>> {
        Ok(Some(if v { "true" } else { "false" }.to_string()))
    }

    fn serialize_i8(self, v: i8) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_i16(self, v: i16) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_i32(self, v: i32) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_i64(self, v: i64) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_i128(self, v: i128) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_u8(self, v: u8) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_u16(self, v: u16) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_u32(self, v: u32) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_u64(self, v: u64) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_u128(self, v: u128) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_f32(self, v: f32) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_f64(self, v: f64) -> WriteResult<Option<String>> {
        Ok(Some(v.to_string()))
    }

    fn serialize_char(self, v: char) -> WriteResult<Option<String>> {
        self.text(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> WriteResult<Option<String>> {
        self.text(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> WriteResult<Option<String>> {
        Err(self.not_scalar("a byte array"))
    }

    fn serialize_none(self) -> WriteResult<Option<String>> {
        Ok(None)
    }

    fn serialize_some<T>(self, value: &T) -> WriteResult<Option<String>>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> WriteResult<Option<String>> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> WriteResult<Option<String>> {
        Ok(None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> WriteResult<Option<String>> {
        Ok(Some(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> WriteResult<Option<String>>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> WriteResult<Option<String>>
    where
        T: ?Sized + Serialize,
    {
        Err(self.not_scalar("an enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> WriteResult<Self::SerializeSeq> {
        Err(self.not_scalar("a sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> WriteResult<Self::SerializeTuple> {
        Err(self.not_scalar("a tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeTupleStruct> {
        Err(self.not_scalar("a tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeTupleVariant> {
        Err(self.not_scalar("an enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> WriteResult<Self::SerializeMap> {
        Err(self.not_scalar("a map"))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeStruct> {
        Err(self.not_scalar(&format!("a nested struct `{}`", name)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> WriteResult<Self::SerializeStructVariant> {
        Err(self.not_scalar("an enum variant with data"))
    }
}
