//! XML → map conversion.

use indexmap::IndexMap;

use crate::config::Config;
use crate::document::{XmlDocument, XmlElement, XmlNode};
use crate::error::Result;
use crate::value::{Map, Value};

/// Converts XML documents into maps.
///
/// # Examples
/// ```
/// use xmlmap::{Config, Decoder, Value};
///
/// let map = Decoder::new(Config::default())
///     .build_from_str("<note><to>run1</to><to>run2</to></note>")
///     .unwrap();
/// assert_eq!(
///     map["note"].get("to"),
///     Some(&Value::List(vec!["run1".into(), "run2".into()]))
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: Config,
}

impl Decoder {
    /// Create a decoder with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse XML text and convert it.
    ///
    /// # Errors
    /// Returns `ParseError` with the first problem found in the input.
    pub fn build_from_str(&self, input: &str) -> Result<Map> {
        let document = XmlDocument::parse(input, &self.config)?;
        Ok(self.build_from_document(&document))
    }

    /// Convert an already parsed document.
    pub fn build_from_document(&self, document: &XmlDocument) -> Map {
        let mut walk = Walk::new(&self.config);
        let root = &document.root;
        let mut converted = walk.element(root);

        if !walk.namespaces.is_empty() {
            tracing::debug!(count = walk.namespaces.len(), "adding namespaces to root");
            converted = walk.inject_namespaces(converted);
        }

        tracing::debug!(root = %root.name, "decoded XML document");

        let mut output = Map::new();
        output.insert(root.name.clone(), converted);
        output
    }
}

/// State of one conversion: namespace URIs seen so far and their prefixes.
struct Walk<'c> {
    config: &'c Config,
    namespaces: IndexMap<String, String>,
}

impl<'c> Walk<'c> {
    fn new(config: &'c Config) -> Self {
        Self {
            config,
            namespaces: IndexMap::new(),
        }
    }

    /// Record the namespace of a node the first time it is seen.
    fn collate(&mut self, namespace: Option<&str>, qualified_name: &str) {
        if !self.config.use_namespaces {
            return;
        }
        let Some(uri) = namespace else {
            return;
        };
        if uri.is_empty() || self.namespaces.contains_key(uri) {
            return;
        }

        let prefix = qualified_name
            .split_once(':')
            .map(|(prefix, _)| prefix)
            .unwrap_or_default();
        tracing::trace!(uri, prefix, "namespace collated");
        self.namespaces.insert(uri.to_string(), prefix.to_string());
    }

    /// Convert a non-element child. Comments yield nothing.
    fn inline(&self, node: &XmlNode) -> Option<Value> {
        match node {
            XmlNode::Text(text) => Some(Value::Scalar(trim_text(text).to_string())),
            XmlNode::CData(text) => {
                let mut map = Map::new();
                map.insert(
                    self.config.cdata_key.clone(),
                    Value::Scalar(trim_text(text).to_string()),
                );
                Some(Value::Map(map))
            }
            XmlNode::Element(_) | XmlNode::Comment(_) => None,
        }
    }

    fn element(&mut self, element: &XmlElement) -> Value {
        self.collate(element.namespace.as_deref(), &element.name);

        let mut output = self.children(element);

        if !element.attributes.is_empty() {
            let mut attributes = Map::new();
            for attribute in &element.attributes {
                attributes.insert(
                    attribute.name.clone(),
                    Value::Scalar(attribute.value.clone()),
                );
                self.collate(attribute.namespace.as_deref(), &attribute.name);
            }

            let mut map = match output {
                Value::Map(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert(self.config.value_key.clone(), other);
                    map
                }
            };
            map.insert(self.config.attributes_key.clone(), Value::Map(attributes));
            output = Value::Map(map);
        }

        output
    }

    /// Convert the children of an element.
    ///
    /// Element children are grouped by name. The first non-empty text or
    /// CDATA child becomes the whole output and ends the walk.
    fn children(&mut self, element: &XmlElement) -> Value {
        let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();

        for child in &element.children {
            if let XmlNode::Element(child) = child {
                let value = self.element(child);
                groups.entry(child.name.clone()).or_default().push(value);
                continue;
            }
            match self.inline(child) {
                Some(value) if !value.is_empty() => return value,
                _ => {}
            }
        }

        if groups.is_empty() {
            return Value::Scalar(String::new());
        }

        let force_list = self.config.force_one_element_array;
        Value::Map(
            groups
                .into_iter()
                .map(|(name, mut items)| {
                    let value = if items.len() == 1 && !force_list {
                        items.remove(0)
                    } else {
                        Value::List(items)
                    };
                    (name, value)
                })
                .collect(),
        )
    }

    /// Add `xmlns` attributes for every collated namespace to the root value.
    fn inject_namespaces(&self, root: Value) -> Value {
        let mut map = match root {
            Value::Map(map) => map,
            Value::Scalar(text) if text.is_empty() => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert(self.config.value_key.clone(), other);
                map
            }
        };

        let attributes = map
            .entry(self.config.attributes_key.clone())
            .or_insert_with(|| Value::Map(Map::new()));
        if !matches!(attributes, Value::Map(_)) {
            *attributes = Value::Map(Map::new());
        }
        if let Value::Map(attributes) = attributes {
            for (uri, prefix) in &self.namespaces {
                let name = if prefix.is_empty() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{prefix}")
                };
                attributes.insert(name, Value::Scalar(uri.clone()));
            }
        }

        Value::Map(map)
    }
}

/// Strip the ASCII whitespace and NUL characters around text content.
/// Other Unicode spaces, such as no-break space, are content.
fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
}
