//! XML deserialization through a custom `serde::Deserializer`.
//!
//! Reading is split in two phases:
//!
//! 1. A quick-xml scan collects the text of every known attribute and leaf
//!    element into a slot per planned field. Structural problems (wrong root,
//!    duplicate fields, mixed content, truncated input) are reported here with
//!    the byte position of the reader.
//! 2. The collected strings are handed to `T::deserialize` as a map. Scalars
//!    are parsed on demand, so a field is only parsed as a number when `T`
//!    asks for a number.

use std::fmt;
use std::str::{self, FromStr};

use quick_xml::Reader;
use quick_xml::escape;
use quick_xml::events::{BytesStart, Event};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, Visitor};

use crate::compiled::CompiledSerializer;
use crate::error::MalformedCause;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Failure to read a document, with the reader position when known.
#[derive(Debug)]
pub(crate) struct DecodeError {
    pub(crate) position: Option<u64>,
    pub(crate) cause: MalformedCause,
}

/// Reads one document of type `T` from `input`.
pub(crate) fn read_document<T: DeserializeOwned>(
    compiled: &CompiledSerializer,
    input: &[u8],
) -> Result<T, DecodeError> {
    let input = input.strip_prefix(BOM).unwrap_or(input);
    let text = str::from_utf8(input).map_err(|e| DecodeError {
        position: Some(e.valid_up_to() as u64),
        cause: MalformedCause::Encoding(e),
    })?;

    let values = Scanner::new(compiled, text).run()?;

    let entries: Vec<(&'static str, String)> = compiled
        .fields()
        .iter()
        .zip(values)
        .filter_map(|(plan, value)| value.map(|v| (plan.field, v)))
        .collect();

    T::deserialize(FieldsDeserializer { entries }).map_err(|e| DecodeError {
        position: None,
        cause: MalformedCause::Content(e.0),
    })
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Event scanner filling one slot per planned field.
struct Scanner<'a> {
    compiled: &'a CompiledSerializer,
    reader: Reader<&'a [u8]>,
    values: Vec<Option<String>>,
}

impl<'a> Scanner<'a> {
    fn new(compiled: &'a CompiledSerializer, text: &'a str) -> Self {
        Self {
            compiled,
            reader: Reader::from_str(text),
            values: vec![None; compiled.fields().len()],
        }
    }

    fn error(&self, cause: impl Into<MalformedCause>) -> DecodeError {
        DecodeError {
            position: Some(self.reader.buffer_position() as u64),
            cause: cause.into(),
        }
    }

    fn structure(&self, message: impl Into<String>) -> DecodeError {
        self.error(MalformedCause::Structure(message.into()))
    }

    fn next(&mut self) -> Result<Event<'a>, DecodeError> {
        self.reader.read_event().map_err(|e| DecodeError {
            position: Some(self.reader.error_position() as u64),
            cause: MalformedCause::Syntax(e),
        })
    }

    fn run(mut self) -> Result<Vec<Option<String>>, DecodeError> {
        let has_children = loop {
            match self.next()? {
                Event::Start(e) => {
                    self.read_root(&e)?;
                    break true;
                }
                Event::Empty(e) => {
                    self.read_root(&e)?;
                    break false;
                }
                Event::Text(t) if is_blank(&t) => {}
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::End(_) => return Err(self.structure("end tag before the root element")),
                Event::Eof => return Err(self.structure("no root element")),
                _ => return Err(self.structure("text before the root element")),
            }
        };

        if has_children {
            self.read_children()?;
        }
        self.read_epilog()?;

        Ok(self.values)
    }

    fn read_root(&mut self, root: &BytesStart<'_>) -> Result<(), DecodeError> {
        let name = root.name().into_inner();
        let expected = self.compiled.root_name();
        if name != expected.as_bytes() {
            return Err(self.structure(format!(
                "expected root element `{}`, found `{}`",
                expected,
                String::from_utf8_lossy(name)
            )));
        }

        for attr in root.attributes() {
            let attr = attr.map_err(|e| self.error(e))?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let key = str::from_utf8(key).map_err(|e| self.error(e))?;
            let Some(index) = self.compiled.attribute_index(key) else {
                tracing::trace!(attribute = key, "ignoring unknown attribute");
                continue;
            };
            let raw = str::from_utf8(&attr.value).map_err(|e| self.error(e))?;
            let value = escape::unescape(raw).map_err(|e| self.error(e))?;
            self.values[index] = Some(value.into_owned());
        }
        Ok(())
    }

    fn read_children(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.next()? {
                Event::Start(e) => match self.element_index(&e)? {
                    Some(index) => {
                        let text = self.read_leaf(&e)?;
                        self.values[index] = Some(text);
                    }
                    None => {
                        self.reader
                            .read_to_end(e.name())
                            .map_err(|err| self.error(err))?;
                    }
                },
                Event::Empty(e) => {
                    if let Some(index) = self.element_index(&e)? {
                        self.values[index] = Some(String::new());
                    }
                }
                // The reader checks that it closes the root
                Event::End(_) => return Ok(()),
                Event::Text(t) if is_blank(&t) => {}
                Event::Comment(_) | Event::PI(_) => {}
                Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) => {
                    return Err(self.structure("text directly under the root element"));
                }
                Event::Eof => return Err(self.structure("unexpected end of input in root element")),
                Event::Decl(_) | Event::DocType(_) => {
                    return Err(self.structure("declaration inside the root element"));
                }
            }
        }
    }

    /// Plan index of a child element; fails when the field was already read.
    fn element_index(&self, element: &BytesStart<'_>) -> Result<Option<usize>, DecodeError> {
        let name = str::from_utf8(element.name().into_inner()).map_err(|e| self.error(e))?;
        match self.compiled.element_index(name) {
            Some(index) if self.values[index].is_some() => Err(self.structure(format!(
                "element `{}` appears more than once",
                name
            ))),
            Some(index) => Ok(Some(index)),
            None => {
                tracing::trace!(element = name, "skipping unknown element");
                Ok(None)
            }
        }
    }

    /// Reads the text content of a field element up to its end tag.
    fn read_leaf(&mut self, start: &BytesStart<'_>) -> Result<String, DecodeError> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Event::Text(t) => {
                    let raw = str::from_utf8(&t).map_err(|e| self.error(e))?;
                    let unescaped = escape::unescape(raw).map_err(|e| self.error(e))?;
                    text.push_str(&unescaped);
                }
                Event::CData(c) => {
                    text.push_str(str::from_utf8(&c).map_err(|e| self.error(e))?);
                }
                Event::GeneralRef(r) => {
                    let resolved = self.resolve_reference(&r)?;
                    text.push_str(&resolved);
                }
                Event::Comment(_) | Event::PI(_) => {}
                Event::End(_) => return Ok(text),
                Event::Start(_) | Event::Empty(_) => {
                    return Err(self.structure(format!(
                        "element `{}` must contain text only",
                        String::from_utf8_lossy(start.name().into_inner())
                    )));
                }
                Event::Eof => {
                    return Err(self.structure(format!(
                        "unexpected end of input in element `{}`",
                        String::from_utf8_lossy(start.name().into_inner())
                    )));
                }
                Event::Decl(_) | Event::DocType(_) => {
                    return Err(self.structure("declaration inside a field element"));
                }
            }
        }
    }

    /// Resolves `&name;` or a character reference.
    fn resolve_reference(&self, reference: &[u8]) -> Result<String, DecodeError> {
        let name = str::from_utf8(reference).map_err(|e| self.error(e))?;
        if let Some(code) = name.strip_prefix('#') {
            let parsed = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            parsed
                .and_then(char::from_u32)
                .map(String::from)
                .ok_or_else(|| self.structure(format!("invalid character reference `&{};`", name)))
        } else {
            escape::resolve_predefined_entity(name)
                .map(str::to_string)
                .ok_or_else(|| self.structure(format!("unknown entity `&{};`", name)))
        }
    }

    fn read_epilog(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.next()? {
                Event::Eof => return Ok(()),
                Event::Text(t) if is_blank(&t) => {}
                Event::Comment(_) | Event::PI(_) => {}
                Event::Start(_) | Event::Empty(_) => {
                    return Err(self.structure("more than one root element"));
                }
                _ => return Err(self.structure("unexpected content after the root element")),
            }
        }
    }
}

/// Error raised while feeding collected values to `T::deserialize`.
#[derive(Debug)]
struct ShapeError(String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ShapeError {}

impl de::Error for ShapeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ShapeError(msg.to_string())
    }
}

/// Presents the collected fields as a map.
struct FieldsDeserializer {
    entries: Vec<(&'static str, String)>,
}

impl<'de> de::Deserializer<'de> for FieldsDeserializer {
    type Error = ShapeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(FieldsAccess {
            entries: self.entries.into_iter(),
            pending: None,
        })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct FieldsAccess {
    entries: std::vec::IntoIter<(&'static str, String)>,
    pending: Option<(&'static str, String)>,
}

impl<'de> MapAccess<'de> for FieldsAccess {
    type Error = ShapeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, ShapeError>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((field, value)) => {
                self.pending = Some((field, value));
                seed.deserialize(field.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, ShapeError>
    where
        V: DeserializeSeed<'de>,
    {
        let (field, value) = self
            .pending
            .take()
            .ok_or_else(|| ShapeError("value requested before its key".to_string()))?;
        seed.deserialize(ScalarDeserializer { field, value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

/// Parses the text of one field as whatever scalar the field asks for.
struct ScalarDeserializer {
    field: &'static str,
    value: String,
}

impl ScalarDeserializer {
    fn parse<N>(&self, kind: &str) -> Result<N, ShapeError>
    where
        N: FromStr,
        N::Err: fmt::Display,
    {
        self.value.trim().parse().map_err(|e| {
            ShapeError(format!(
                "field `{}`: `{}` is not a valid {}: {}",
                self.field, self.value, kind, e
            ))
        })
    }

    fn not_scalar(&self, what: &str) -> ShapeError {
        ShapeError(format!(
            "field `{}` is declared as {}; only scalar fields can be read",
            self.field, what
        ))
    }
}

macro_rules! deserialize_number {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, ShapeError>
            where
                V: Visitor<'de>,
            {
                let value = self.parse::<$ty>(stringify!($ty))?;
                visitor.$visit(value)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ScalarDeserializer {
    type Error = ShapeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value)
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        match self.value.trim() {
            "true" | "1" => visitor.visit_bool(true),
            "false" | "0" => visitor.visit_bool(false),
            other => Err(ShapeError(format!(
                "field `{}`: `{}` is not a valid boolean",
                self.field, other
            ))),
        }
    }

    deserialize_number! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        let mut chars = self.value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(ShapeError(format!(
                "field `{}`: `{}` is not a single character",
                self.field, self.value
            ))),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value)
    }

    fn deserialize_bytes<V>(self, _visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("bytes"))
    }

    fn deserialize_byte_buf<V>(self, _visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("bytes"))
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, _visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("a sequence"))
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("a tuple"))
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("a tuple struct"))
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar("a map"))
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        Err(self.not_scalar(&format!("nested struct `{}`", name)))
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(self.value.into_deserializer())
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.value)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, ShapeError>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}
