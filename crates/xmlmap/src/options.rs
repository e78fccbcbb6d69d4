//! Writer configuration shared by every compiled serializer.
//!
//! # Example
//!
//! ```
//! use xmlmap::XmlOptions;
//!
//! // Defaults: declaration on, no indentation
//! let options = XmlOptions::default();
//! assert!(options.declaration);
//!
//! // Or from a configuration file
//! let options: XmlOptions = serde_json::from_str(r#"{"indent": 2}"#)?;
//! assert_eq!(options.indent, Some(2));
//! assert!(options.declaration);
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::{Deserialize, Serialize};

/// The XML declaration written before the root element.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Output options for serialized documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Write `<?xml version="1.0" encoding="utf-8"?>` before the root element.
    pub declaration: bool,

    /// Indent child elements by this many spaces, one per line.
    pub indent: Option<usize>,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            declaration: true,
            indent: None,
        }
    }
}

impl XmlOptions {
    /// Compact output without a declaration.
    pub fn fragment() -> Self {
        Self {
            declaration: false,
            indent: None,
        }
    }

    /// Sets the indentation width.
    pub fn with_indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }
}
