mod common;

use std::sync::Arc;
use std::thread;

use common::{
    LaptopDocument, OpticalMouseDocument, OpticalMouseDocumentConfiguration, generate_laptop,
    generate_mouse, laptop_serializer, parse_flat,
};
use serde::{Deserialize, Serialize};
use xmlmap::{
    ConfigurationError, DocumentType, Error, MalformedCause, OverrideSet, Registry, Result,
    Serializer, XML_DECLARATION, XmlOptions,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Laptop {
    sku: String,
    title: String,
    screen_size: String,
}

fn sample_serializer(options: XmlOptions) -> Serializer {
    Serializer::configure(|registry| {
        registry
            .add_with::<Laptop, _>(|o| {
                o.root("product")
                    .attribute("sku", "sku")
                    .element("title", "title")
                    .element("screen_size", "screen-size");
            })
            .options(options);
    })
    .expect("valid configuration")
}

fn sample_laptop() -> Laptop {
    Laptop {
        sku: "ABC12".to_string(),
        title: "Test".to_string(),
        screen_size: "13in".to_string(),
    }
}

#[test]
fn test_laptop_exact_output() -> Result<()> {
    let serializer = sample_serializer(XmlOptions::default());
    let xml = serializer.serialize_to_string(&sample_laptop())?;
    assert_eq!(
        xml,
        r#"<?xml version="1.0" encoding="utf-8"?><product sku="ABC12"><title>Test</title><screen-size>13in</screen-size></product>"#
    );
    assert!(xml.starts_with(XML_DECLARATION));
    Ok(())
}

#[test]
fn test_indented_output_reads_back() -> Result<()> {
    let serializer = sample_serializer(XmlOptions::default().with_indent(2));
    let xml = serializer.serialize_to_string(&sample_laptop())?;
    assert!(xml.contains("\n  <title>Test</title>"));
    assert_eq!(serializer.from_str::<Laptop>(&xml)?, sample_laptop());
    Ok(())
}

#[test]
fn test_round_trip_law() -> Result<()> {
    let serializer = Serializer::configure(|registry| {
        registry
            .add_configuration::<LaptopDocument, _>(&common::LaptopDocumentConfiguration)
            .add_configuration::<OpticalMouseDocument, _>(&OpticalMouseDocumentConfiguration);
    })?;

    for _ in 0..8 {
        let laptop = generate_laptop();
        let xml = serializer.serialize_to_string(&laptop)?;
        assert_eq!(serializer.from_str::<LaptopDocument>(&xml)?, laptop);

        let mouse = generate_mouse();
        let bytes = serializer.serialize_to_vec(&mouse)?;
        assert_eq!(serializer.from_slice::<OpticalMouseDocument>(&bytes)?, mouse);
    }

    let tricky = LaptopDocument {
        sku: "a\"b'c<d>&e".to_string(),
        title: "  padded  ".to_string(),
        description: Some(String::new()),
        screen_size: "15.6\" <matte>".to_string(),
        processor: "Ünïcödé ☃".to_string(),
        ram_volume: "16 & 32".to_string(),
    };
    let xml = serializer.serialize_to_string(&tricky)?;
    assert_eq!(serializer.from_str::<LaptopDocument>(&xml)?, tricky);
    Ok(())
}

#[test]
fn test_serialization_is_idempotent() -> Result<()> {
    let serializer = laptop_serializer();
    let laptop = generate_laptop();
    let first = serializer.serialize_to_string(&laptop)?;
    let second = serializer.serialize_to_string(&laptop)?;
    assert_eq!(first.as_bytes(), second.as_bytes());
    Ok(())
}

#[test]
fn test_attribute_and_element_placement() -> Result<()> {
    let serializer = Serializer::configure(|registry| {
        registry.add_configuration::<OpticalMouseDocument, _>(&OpticalMouseDocumentConfiguration);
    })?;
    let mouse = generate_mouse();
    let parsed = parse_flat(&serializer.serialize_to_string(&mouse)?);

    assert_eq!(parsed.attributes.get("sku"), Some(&mouse.sku));
    assert!(!parsed.elements.contains_key("sku"));

    assert_eq!(parsed.elements.get("dpi").map(String::as_str), Some("1600"));
    assert_eq!(parsed.elements.get("buttons").map(String::as_str), Some("5"));
    assert!(!parsed.attributes.contains_key("dpi"));
    assert!(!parsed.elements.contains_key("optical_tracking_dpi"));

    // None is omitted rather than written empty
    assert!(!parsed.elements.contains_key("description"));
    Ok(())
}

#[test]
fn test_root_name_override_and_default() -> Result<()> {
    let overridden = laptop_serializer();
    let parsed = parse_flat(&overridden.serialize_to_string(&generate_laptop())?);
    assert_eq!(parsed.root, "product");

    let defaulted = Serializer::configure(|registry| {
        registry.add::<LaptopDocument>(OverrideSet::new());
    })?;
    let laptop = generate_laptop();
    let xml = defaulted.serialize_to_string(&laptop)?;
    let parsed = parse_flat(&xml);
    assert_eq!(parsed.root, "LaptopDocument");
    assert_eq!(parsed.elements.get("screen_size"), Some(&laptop.screen_size));
    assert_eq!(defaulted.from_str::<LaptopDocument>(&xml)?, laptop);
    Ok(())
}

#[test]
fn test_unregistered_type() {
    let serializer = laptop_serializer();
    let mouse = generate_mouse();
    let mouse_type = DocumentType::of::<OpticalMouseDocument>();

    let err = serializer.serialize_to_string(&mouse).unwrap_err();
    assert!(err.is_unregistered());
    assert!(err.to_string().contains("OpticalMouseDocument"));

    let mut sink = Vec::new();
    assert!(
        serializer
            .serialize_to_writer(&mouse, &mut sink)
            .unwrap_err()
            .is_unregistered()
    );
    assert!(sink.is_empty());

    assert!(
        serializer
            .deserialize_from_str("<product/>", &mouse_type)
            .unwrap_err()
            .is_unregistered()
    );
    assert!(
        serializer
            .from_slice::<OpticalMouseDocument>(b"<product/>")
            .unwrap_err()
            .is_unregistered()
    );
    assert!(serializer.provider().lookup(&mouse_type).is_none());
}

#[test]
fn test_malformed_input() {
    let serializer = laptop_serializer();
    let laptop = generate_laptop();
    let xml = serializer.serialize_to_string(&laptop).unwrap();

    let inputs = [
        String::new(),
        "not xml at all".to_string(),
        r#"{"sku": "ABC12"}"#.to_string(),
        xml[..xml.len() / 2].to_string(),
        xml[..xml.len() - 3].to_string(),
        xml.replace("<product", "<laptop").replace("</product>", "</laptop>"),
        format!("{}{}", xml, "<product/>"),
        xml.replace("<title>", "<title><b>").replace("</title>", "</b></title>"),
    ];

    for input in inputs {
        let err = serializer.from_str::<LaptopDocument>(&input).unwrap_err();
        assert!(err.is_malformed(), "expected malformed input for {input:?}, got {err}");
    }
}

#[test]
fn test_malformed_input_keeps_diagnostics() {
    let serializer = laptop_serializer();
    let err = serializer
        .from_str::<LaptopDocument>(r#"<product sku="X"><title>T</titel></product>"#)
        .unwrap_err();

    match &err {
        Error::MalformedInput {
            type_name,
            position,
            source,
        } => {
            assert!(type_name.ends_with("LaptopDocument"));
            assert!(position.is_some());
            assert!(matches!(source, MalformedCause::Syntax(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());

    let err = serializer
        .from_str::<LaptopDocument>(r#"<product sku="X"><title>T</title></product>"#)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedInput {
            source: MalformedCause::Content(_),
            ..
        }
    ));
}

#[test]
fn test_configuration_errors_fail_fast() {
    let result = Serializer::configure(|registry| {
        registry
            .add::<Laptop>(OverrideSet::new())
            .add::<Laptop>(OverrideSet::new());
    });
    assert!(matches!(
        result,
        Err(ConfigurationError::DuplicateRegistration { .. })
    ));

    let result = Serializer::configure(|registry| {
        registry.add_with::<Laptop, _>(|o| {
            o.element("title", "screen_size").element("screen_size", "screen_size");
        });
    });
    assert!(matches!(
        result,
        Err(ConfigurationError::ConflictingXmlName { .. })
    ));

    let result = Serializer::configure(|registry| {
        registry.add_with::<Laptop, _>(|o| {
            o.attribute("sku", "xmlns:p");
        });
    });
    assert!(matches!(result, Err(ConfigurationError::InvalidXmlName { .. })));
}

#[test]
fn test_overrides_from_json_config() -> Result<()> {
    let overrides = OverrideSet::from_json_str(
        r#"{
            "root": { "xml_name": "product" },
            "fields": [
                { "field": "sku", "kind": "attribute", "xml_name": "sku" },
                { "field": "screen_size", "xml_name": "screen-size" }
            ]
        }"#,
    )?;
    let options: XmlOptions = serde_json::from_str(r#"{ "declaration": false }"#)
        .map_err(ConfigurationError::from)?;

    let mut builder = Registry::builder();
    builder.add::<Laptop>(overrides).options(options);
    let serializer = Serializer::from_registry(builder.build()?)?;

    assert_eq!(
        serializer.serialize_to_string(&sample_laptop())?,
        r#"<product sku="ABC12"><title>Test</title><screen-size>13in</screen-size></product>"#
    );
    Ok(())
}

#[test]
fn test_shared_across_threads() {
    let serializer = Arc::new(laptop_serializer());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let serializer = Arc::clone(&serializer);
            thread::spawn(move || {
                for _ in 0..16 {
                    let laptop = generate_laptop();
                    let xml = serializer.serialize_to_string(&laptop).unwrap();
                    assert_eq!(serializer.from_str::<LaptopDocument>(&xml).unwrap(), laptop);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
