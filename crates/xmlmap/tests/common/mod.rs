//! Shared document types, generators and checkers for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use xmlmap::{DocumentConfiguration, OverrideSet, Serializer};

pub const DEFAULT_TOKEN_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaptopDocument {
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub screen_size: String,
    pub processor: String,
    pub ram_volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalMouseDocument {
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub optical_tracking_dpi: i32,
    pub buttons: i32,
}

pub struct LaptopDocumentConfiguration;

impl DocumentConfiguration<LaptopDocument> for LaptopDocumentConfiguration {
    fn configure(&self, overrides: &mut OverrideSet) {
        overrides
            .root("product")
            .attribute("sku", "sku")
            .element("title", "title")
            .element("description", "description")
            .element("screen_size", "screen-size")
            .element("processor", "processor")
            .element("ram_volume", "ram-volume");
    }
}

pub struct OpticalMouseDocumentConfiguration;

impl DocumentConfiguration<OpticalMouseDocument> for OpticalMouseDocumentConfiguration {
    fn configure(&self, overrides: &mut OverrideSet) {
        overrides
            .root("product")
            .attribute("sku", "sku")
            .element("optical_tracking_dpi", "dpi");
    }
}

/// A serializer with the laptop configuration only.
pub fn laptop_serializer() -> Serializer {
    Serializer::configure(|registry| {
        registry.add_configuration::<LaptopDocument, _>(&LaptopDocumentConfiguration);
    })
    .expect("laptop configuration is valid")
}

/// A random upper-case token.
pub fn generate_token(length: usize) -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(length)
        .collect::<String>()
        .to_uppercase()
}

pub fn generate_laptop() -> LaptopDocument {
    LaptopDocument {
        sku: generate_token(DEFAULT_TOKEN_SIZE),
        title: generate_token(DEFAULT_TOKEN_SIZE),
        description: Some(generate_token(DEFAULT_TOKEN_SIZE)),
        screen_size: generate_token(DEFAULT_TOKEN_SIZE),
        processor: generate_token(DEFAULT_TOKEN_SIZE),
        ram_volume: generate_token(DEFAULT_TOKEN_SIZE),
    }
}

pub fn generate_mouse() -> OpticalMouseDocument {
    OpticalMouseDocument {
        sku: generate_token(DEFAULT_TOKEN_SIZE),
        title: generate_token(DEFAULT_TOKEN_SIZE),
        description: None,
        optical_tracking_dpi: 1600,
        buttons: 5,
    }
}

/// Hand-written, indented XML for a laptop.
pub fn generate_xml(document: &LaptopDocument) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<product sku="{}">
  <title>{}</title>
  <description>{}</description>
  <screen-size>{}</screen-size>
  <processor>{}</processor>
  <ram-volume>{}</ram-volume>
</product>"#,
        document.sku,
        document.title,
        document.description.as_deref().unwrap_or_default(),
        document.screen_size,
        document.processor,
        document.ram_volume
    )
}

/// A parsed flat document: root name, root attributes and leaf element texts.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub root: String,
    pub attributes: HashMap<String, String>,
    pub elements: HashMap<String, String>,
}

/// Parses flat XML independently of the crate under test.
pub fn parse_flat(xml: &str) -> ParsedDocument {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedDocument::default();
    let mut depth = 0usize;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().expect("well-formed XML") {
            Event::Start(e) | Event::Empty(e) if depth == 0 => {
                parsed.root = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
                for attr in e.attributes() {
                    let attr = attr.unwrap();
                    parsed.attributes.insert(
                        String::from_utf8(attr.key.as_ref().to_vec()).unwrap(),
                        unescape(&attr.value),
                    );
                }
                depth = 1;
            }
            Event::Start(e) => {
                let name = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
                parsed.elements.insert(name.clone(), String::new());
                current = Some(name);
                depth += 1;
            }
            Event::Empty(e) => {
                let name = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
                parsed.elements.insert(name, String::new());
            }
            Event::Text(t) => {
                if let Some(name) = &current {
                    parsed.elements.get_mut(name).unwrap().push_str(&unescape(&t));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(name) = &current {
                    let entity = String::from_utf8(r.to_vec()).unwrap();
                    let resolved = quick_xml::escape::resolve_predefined_entity(&entity)
                        .expect("predefined entity");
                    parsed.elements.get_mut(name).unwrap().push_str(resolved);
                }
            }
            Event::End(_) => {
                current = None;
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    parsed
}

fn unescape(raw: &[u8]) -> String {
    let raw = std::str::from_utf8(raw).unwrap();
    quick_xml::escape::unescape(raw).unwrap().into_owned()
}

/// Checks serialized laptop XML against the document it came from.
pub fn check_xml(document: &LaptopDocument, xml: &str) {
    assert!(!xml.is_empty());
    assert!(!xml.contains("xmlns"), "no namespace declarations: {xml}");

    let parsed = parse_flat(xml);
    assert_eq!(parsed.root, "product");
    assert_eq!(parsed.attributes.get("sku"), Some(&document.sku));
    assert_eq!(parsed.elements.get("title"), Some(&document.title));
    assert_eq!(
        parsed.elements.get("description").map(String::as_str),
        document.description.as_deref()
    );
    assert_eq!(parsed.elements.get("screen-size"), Some(&document.screen_size));
    assert_eq!(parsed.elements.get("processor"), Some(&document.processor));
    assert_eq!(parsed.elements.get("ram-volume"), Some(&document.ram_volume));
    assert!(!parsed.elements.contains_key("sku"));
}
