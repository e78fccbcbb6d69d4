//! Declarative name overrides for one document type.
//!
//! An [`OverrideSet`] remaps the root element and individual fields of a
//! document to other XML names, and chooses whether each field is written as
//! an attribute of the root element or as a child element. Fields without an
//! override keep their serde name and are written as elements.
//!
//! Override sets are plain data and can be loaded from JSON:
//!
//! ```
//! use xmlmap::{OverrideSet, Placement};
//!
//! let overrides = OverrideSet::from_json_str(
//!     r#"{
//!         "root": { "xml_name": "product" },
//!         "fields": [
//!             { "field": "sku", "kind": "attribute", "xml_name": "sku" },
//!             { "field": "screen_size", "kind": "element", "xml_name": "screen-size" }
//!         ]
//!     }"#,
//! )?;
//! assert_eq!(overrides.root_override().map(|r| r.xml_name.as_str()), Some("product"));
//! assert_eq!(overrides.find("sku").map(|o| o.kind), Some(Placement::Attribute));
//! # Ok::<(), xmlmap::ConfigurationError>(())
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Where a field is written in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// `name="value"` on the root element.
    Attribute,
    /// `<name>value</name>` under the root element.
    #[default]
    Element,
}

impl Placement {
    /// Lowercase name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Attribute => "attribute",
            Placement::Element => "element",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remaps one field to an XML construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOverride {
    /// Serde name of the field.
    pub field: String,
    /// Attribute or element.
    #[serde(default)]
    pub kind: Placement,
    /// Name written to the document.
    pub xml_name: String,
}

impl NameOverride {
    /// Creates a new field override.
    pub fn new(field: impl Into<String>, kind: Placement, xml_name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            xml_name: xml_name.into(),
        }
    }
}

/// Renames the root element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootOverride {
    /// Tag name of the root element.
    pub xml_name: String,
}

/// Ordered field overrides plus an optional root override.
///
/// Built once through a configuration callback and never changed after it is
/// registered. An empty set means "use the default shape".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<RootOverride>,
    #[serde(default)]
    fields: Vec<NameOverride>,
}

impl OverrideSet {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an override set from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the root element name.
    pub fn root(&mut self, xml_name: impl Into<String>) -> &mut Self {
        self.root = Some(RootOverride {
            xml_name: xml_name.into(),
        });
        self
    }

    /// Writes `field` as an attribute of the root element named `xml_name`.
    pub fn attribute(
        &mut self,
        field: impl Into<String>,
        xml_name: impl Into<String>,
    ) -> &mut Self {
        self.push(NameOverride::new(field, Placement::Attribute, xml_name))
    }

    /// Writes `field` as a child element named `xml_name`.
    pub fn element(&mut self, field: impl Into<String>, xml_name: impl Into<String>) -> &mut Self {
        self.push(NameOverride::new(field, Placement::Element, xml_name))
    }

    /// Appends a field override.
    pub fn push(&mut self, field_override: NameOverride) -> &mut Self {
        self.fields.push(field_override);
        self
    }

    /// The root override, if any.
    pub fn root_override(&self) -> Option<&RootOverride> {
        self.root.as_ref()
    }

    /// Field overrides in the order they were added.
    pub fn fields(&self) -> &[NameOverride] {
        &self.fields
    }

    /// Finds the override of a field.
    pub fn find(&self, field: &str) -> Option<&NameOverride> {
        self.fields.iter().find(|o| o.field == field)
    }

    /// Returns true if nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.fields.is_empty()
    }

    /// Checks names and duplicate field overrides.
    pub(crate) fn validate(&self, type_name: &str) -> Result<(), ConfigurationError> {
        if let Some(root) = &self.root {
            check_xml_name(type_name, &root.xml_name)?;
        }

        let mut seen = HashSet::new();
        for field_override in &self.fields {
            check_xml_name(type_name, &field_override.xml_name)?;
            if !seen.insert(field_override.field.as_str()) {
                return Err(ConfigurationError::DuplicateFieldOverride {
                    type_name: type_name.to_string(),
                    field: field_override.field.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Checks that `name` can be used as an element or attribute name.
///
/// Names starting with `xmlns` would turn an attribute into a namespace
/// declaration and are rejected.
pub(crate) fn is_valid_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if name.starts_with("xmlns") {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub(crate) fn check_xml_name(type_name: &str, name: &str) -> Result<(), ConfigurationError> {
    if is_valid_xml_name(name) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidXmlName {
            type_name: type_name.to_string(),
            name: name.to_string(),
        })
    }
}
