//! Map → XML conversion.
//!
//! Marker keys are processed in a fixed order: attributes, then the text
//! value, then CDATA, then the remaining keys as child elements in insertion
//! order. Decoding mixed content relies on this order, so it must not change.

use crate::config::{is_valid_tag_name, Config};
use crate::document::{invalid_char, OutputEncoding, XmlDocument, XmlElement};
use crate::error::{NameKind, Result, XmlMapError};
use crate::value::{Map, Value};

/// The pieces of a map-valued element, split by marker key.
///
/// Computed without touching the input map: the children are whatever keys
/// remain once the markers are taken out.
#[derive(Debug, Default)]
struct ElementParts<'a> {
    attributes: Option<&'a Map>,
    text: Option<&'a Value>,
    cdata: Option<&'a Value>,
    children: Vec<(&'a str, &'a Value)>,
}

impl<'a> ElementParts<'a> {
    fn split(map: &'a Map, config: &Config) -> Self {
        let mut parts = Self::default();
        for (key, value) in map {
            match value {
                Value::Map(attributes) if *key == config.attributes_key => {
                    parts.attributes = Some(attributes);
                }
                _ if *key == config.value_key => parts.text = Some(value),
                _ if *key == config.cdata_key => parts.cdata = Some(value),
                _ => parts.children.push((key.as_str(), value)),
            }
        }
        parts
    }
}

/// Converts maps into XML documents.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use xmlmap::{Config, Encoder, Value};
///
/// let input = Value::from(json!({"note": {"to": "Tove", "from": "Jani"}}));
/// let xml = Encoder::new(Config::default())
///     .build_xml_string(input.as_map().unwrap())
///     .unwrap();
/// assert_eq!(
///     xml,
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<note><to>Tove</to><from>Jani</from></note>\n"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: Config,
}

impl Encoder {
    /// Create an encoder with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build an XML document from a map with exactly one key.
    ///
    /// # Errors
    /// - `RootCardinality` if the map does not describe exactly one root element
    /// - `IllegalTagName` for an invalid element or attribute name
    /// - `NonScalarValue` for a map or list where text is required
    /// - `InvalidCharacter` for text XML cannot carry, such as control characters
    /// - `UnsupportedEncoding` if the configured encoding has no byte encoder
    pub fn build_xml(&self, root: &Map) -> Result<XmlDocument> {
        OutputEncoding::for_label(&self.config.encoding)?;
        if root.len() != 1 {
            return Err(XmlMapError::RootCardinality { count: root.len() });
        }
        let Some((name, value)) = root.first() else {
            return Err(XmlMapError::RootCardinality { count: 0 });
        };

        tracing::debug!(root = %name, "building XML document");

        let mut elements = self.convert_entry(name, value, None)?;
        if elements.len() != 1 {
            return Err(XmlMapError::RootCardinality {
                count: elements.len(),
            });
        }
        let Some(root_element) = elements.pop() else {
            return Err(XmlMapError::RootCardinality { count: 0 });
        };

        Ok(XmlDocument::new(
            self.config.version.as_str(),
            self.config.encoding.as_str(),
            root_element,
        )
        .with_format_output(self.config.format_output))
    }

    /// Build a document from any value; non-maps have no root element.
    ///
    /// # Errors
    /// Same as [`Encoder::build_xml`].
    pub fn build_xml_value(&self, root: &Value) -> Result<XmlDocument> {
        match root {
            Value::Map(map) => self.build_xml(map),
            _ => Err(XmlMapError::RootCardinality { count: 0 }),
        }
    }

    /// Build a document and serialize it.
    ///
    /// # Errors
    /// Same as [`Encoder::build_xml`], plus `Write` on serialization failure.
    pub fn build_xml_string(&self, root: &Map) -> Result<String> {
        self.build_xml(root)?.to_xml_string()
    }

    /// Build a document and serialize it in the configured encoding.
    ///
    /// # Errors
    /// Same as [`Encoder::build_xml`], plus `Write` on serialization failure.
    pub fn build_xml_bytes(&self, root: &Map) -> Result<Vec<u8>> {
        self.build_xml(root)?.to_xml_bytes()
    }

    /// Convert one map entry. Lists expand to one element per item; an empty
    /// list is an empty element.
    fn convert_entry(
        &self,
        name: &str,
        value: &Value,
        parent: Option<&str>,
    ) -> Result<Vec<XmlElement>> {
        match value {
            Value::List(items) if items.is_empty() => {
                Ok(vec![self.create_element(name, parent)?])
            }
            Value::List(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.extend(self.convert_entry(name, item, parent)?);
                }
                Ok(elements)
            }
            Value::Scalar(text) => {
                let mut element = self.create_element(name, parent)?;
                element.push_text(checked_text(text, name)?);
                Ok(vec![element])
            }
            Value::Map(map) => Ok(vec![self.convert_map(name, map, parent)?]),
        }
    }

    fn create_element(&self, name: &str, parent: Option<&str>) -> Result<XmlElement> {
        if !is_valid_tag_name(name) {
            return Err(XmlMapError::IllegalTagName {
                kind: NameKind::Tag,
                name: name.to_string(),
                context: parent.map(String::from),
            });
        }
        Ok(XmlElement::new(name))
    }

    fn convert_map(&self, name: &str, map: &Map, parent: Option<&str>) -> Result<XmlElement> {
        let mut element = self.create_element(name, parent)?;
        let parts = ElementParts::split(map, &self.config);

        if let Some(attributes) = parts.attributes {
            for (attribute, value) in attributes {
                if !is_valid_tag_name(attribute) {
                    return Err(XmlMapError::IllegalTagName {
                        kind: NameKind::Attribute,
                        name: attribute.clone(),
                        context: Some(name.to_string()),
                    });
                }
                element.set_attribute(attribute.as_str(), scalar_text(value, attribute, name)?);
            }
        }

        if let Some(text) = parts.text {
            element.push_text(scalar_text(text, &self.config.value_key, name)?);
        }

        if let Some(cdata) = parts.cdata {
            element.push_cdata(scalar_text(cdata, &self.config.cdata_key, name)?);
        }

        for (key, value) in parts.children {
            for child in self.convert_entry(key, value, Some(name))? {
                element.push_element(child);
            }
        }

        Ok(element)
    }
}

/// Text of a scalar that is about to become an attribute, text or CDATA.
fn scalar_text<'v>(value: &'v Value, key: &str, context: &str) -> Result<&'v str> {
    let text = value.as_str().ok_or_else(|| XmlMapError::NonScalarValue {
        key: key.to_string(),
        context: context.to_string(),
    })?;
    checked_text(text, context)
}

fn checked_text<'t>(text: &'t str, context: &str) -> Result<&'t str> {
    match invalid_char(text) {
        Some(c) => Err(XmlMapError::InvalidCharacter {
            code: u32::from(c),
            context: context.to_string(),
        }),
        None => Ok(text),
    }
}
