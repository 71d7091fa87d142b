//! Error types for the codec.
//!
//! Every variant is terminal for the call that produced it: neither direction
//! returns partial output.

use std::fmt;

use thiserror::Error;

/// Which kind of XML name failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// An element tag name.
    Tag,
    /// An attribute name.
    Attribute,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag => f.write_str("tag"),
            Self::Attribute => f.write_str("attribute"),
        }
    }
}

/// Main error type for the codec library.
#[derive(Debug, Error)]
pub enum XmlMapError {
    /// An element or attribute name does not match the tag-name pattern.
    #[error("Illegal character in {kind} name. {kind}: {name}{}", .context.as_ref().map(|c| format!(" in node: {c}")).unwrap_or_default())]
    IllegalTagName {
        kind: NameKind,
        name: String,
        context: Option<String>,
    },

    /// The encoder input does not describe exactly one root element.
    #[error("Xml needs to have one root element (found {count})")]
    RootCardinality { count: usize },

    /// The XML text could not be parsed. Only the first diagnostic is kept.
    #[error("XML parse error at byte {position}: {message}")]
    ParseError { message: String, position: u64 },

    /// A marker or attribute value that has to be text is a map or list.
    #[error("Value for '{key}' in node: {context} must be a scalar")]
    NonScalarValue { key: String, context: String },

    /// Text destined for the document contains a character XML does not allow.
    #[error("Invalid character U+{code:04X} in node: {context}")]
    InvalidCharacter { code: u32, context: String },

    /// The declared encoding has no byte encoder.
    #[error("Unsupported encoding: {encoding}")]
    UnsupportedEncoding { encoding: String },

    /// Configuration overrides could not be merged over the defaults.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    /// Writing the serialized document failed.
    #[error("Failed to write XML: {0}")]
    Write(#[source] std::io::Error),

    /// JSON input or output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, XmlMapError>;
