//! xmlmap - Convert nested key-value maps to XML documents and back.
//!
//! Maps describe elements: keys are tag names, scalars are text content and
//! lists are repeated siblings. Three configurable marker keys carry what a
//! plain map cannot: `@attributes`, `@value` (text next to attributes) and
//! `@cdata`.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xmlmap::{Config, Decoder, Encoder, Value};
//!
//! let input = Value::from(json!({
//!     "note": {
//!         "@attributes": {"id": "501"},
//!         "to": ["Tove", "Jani"],
//!     }
//! }));
//!
//! let xml = Encoder::new(Config::default())
//!     .build_xml_string(input.as_map().unwrap())
//!     .unwrap();
//! assert!(xml.contains(r#"<note id="501"><to>Tove</to><to>Jani</to></note>"#));
//!
//! let decoded = Decoder::new(Config::default()).build_from_str(&xml).unwrap();
//! assert_eq!(Value::Map(decoded), input);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Options and tag-name validation
//! - [`value`]: The map model
//! - [`document`]: Owned XML tree, strict parser and serializer
//! - [`encoder`]: Map → XML
//! - [`decoder`]: XML → map
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod decoder;
pub mod document;
pub mod encoder;
pub mod error;
pub mod value;

pub use config::{is_valid_tag_name, Config};
pub use decoder::Decoder;
pub use document::XmlDocument;
pub use encoder::Encoder;
pub use error::{NameKind, Result, XmlMapError};
pub use value::{Map, Value};
