//! Owned XML tree used on both sides of the codec.
//!
//! The encoder builds an [`XmlDocument`], the decoder walks one. Documents
//! come from [`XmlDocument::parse`], from [`XmlDocument::from_roxmltree`] or
//! from the encoder, and serialize back to text with
//! [`XmlDocument::to_xml_string`].

mod parser;
mod roxml;

use std::io::{self, Write};

use encoding_rs::Encoding;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::Config;
use crate::error::{Result, XmlMapError};

pub use roxml::qualified_name;

/// Indentation width used when `format_output` is enabled.
const INDENT_SIZE: usize = 2;

/// A namespace declared on an element (`xmlns` or `xmlns:<prefix>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// Declared prefix, `None` for the default namespace.
    pub prefix: Option<String>,
    /// Namespace URI.
    pub uri: String,
}

impl NamespaceDeclaration {
    /// Attribute name of the declaration.
    pub fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        }
    }
}

/// An attribute with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
    /// Resolved namespace URI, if the parser resolved one.
    pub namespace: Option<String>,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    /// Resolved namespace URI, if the parser resolved one.
    pub namespace: Option<String>,
    pub namespace_declarations: Vec<NamespaceDeclaration>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Prefix of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Set an attribute. `xmlns` and `xmlns:<prefix>` become namespace
    /// declarations.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        if name == "xmlns" {
            self.declare_namespace(None, value);
            return;
        }
        if let Some(prefix) = name.strip_prefix("xmlns:") {
            self.declare_namespace(Some(prefix.to_string()), value);
            return;
        }

        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(XmlAttribute {
                name,
                value,
                namespace: None,
            }),
        }
    }

    /// Look up an attribute value by qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    fn declare_namespace(&mut self, prefix: Option<String>, uri: String) {
        match self
            .namespace_declarations
            .iter_mut()
            .find(|d| d.prefix == prefix)
        {
            Some(existing) => existing.uri = uri,
            None => self
                .namespace_declarations
                .push(NamespaceDeclaration { prefix, uri }),
        }
    }

    /// Append a text child, merging with a directly preceding text child.
    pub fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Append a CDATA section.
    pub fn push_cdata(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::CData(text.into()));
    }

    /// Append a child element.
    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    /// Iterate over element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        let declarations: Vec<(String, &str)> = self
            .namespace_declarations
            .iter()
            .map(|d| (d.attribute_name(), d.uri.as_str()))
            .collect();
        for (name, uri) in &declarations {
            start.push_attribute((name.as_str(), *uri));
        }
        for attribute in &self.attributes {
            start.push_attribute((attribute.name.as_str(), checked(&attribute.value)?));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write(writer)?,
                XmlNode::Text(text) => {
                    writer.write_event(Event::Text(BytesText::new(checked(text)?)))?
                }
                XmlNode::CData(text) => {
                    for section in cdata_sections(checked(text)?) {
                        writer.write_event(Event::CData(BytesCData::new(section)))?;
                    }
                }
                XmlNode::Comment(text) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped(checked(text)?)))?
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }
}

/// Whether `c` matches the XML 1.0 `Char` production.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
    )
}

/// First character of `text` that may not appear in an XML document.
pub(crate) fn invalid_char(text: &str) -> Option<char> {
    text.chars().find(|c| !is_xml_char(*c))
}

fn checked(text: &str) -> io::Result<&str> {
    match invalid_char(text) {
        Some(c) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid XML character U+{:04X}", u32::from(c)),
        )),
        None => Ok(text),
    }
}

/// Byte encoding of serialized output, resolved from the declaration label.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OutputEncoding {
    Ascii,
    Other(&'static Encoding),
}

impl OutputEncoding {
    /// Resolve an encoding label such as `UTF-8` or `ISO-8859-1`.
    ///
    /// Labels without a byte encoder of their own (UTF-16 and friends) are
    /// rejected.
    pub(crate) fn for_label(label: &str) -> Result<Self> {
        if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            return Ok(Self::Ascii);
        }
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) if encoding.output_encoding() == encoding => Ok(Self::Other(encoding)),
            _ => Err(XmlMapError::UnsupportedEncoding {
                encoding: label.to_string(),
            }),
        }
    }

    /// Characters outside the encoding become numeric character references.
    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Ascii => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    if c.is_ascii() {
                        out.push(c);
                    } else {
                        out.push_str(&format!("&#{};", u32::from(c)));
                    }
                }
                out.into_bytes()
            }
            Self::Other(encoding) => encoding.encode(text).0.into_owned(),
        }
    }
}

/// Split CDATA content so that no section contains `]]>`.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(index) = rest.find("]]>") {
        // Cut between "]]" and ">" so each half is a valid section.
        sections.push(&rest[..index + 2]);
        rest = &rest[index + 2..];
    }
    sections.push(rest);
    sections
}

/// An XML document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub version: String,
    pub encoding: String,
    /// Indent when serializing.
    pub format_output: bool,
    pub root: XmlElement,
}

impl XmlDocument {
    /// Create a document around a root element.
    #[must_use]
    pub fn new(version: impl Into<String>, encoding: impl Into<String>, root: XmlElement) -> Self {
        Self {
            version: version.into(),
            encoding: encoding.into(),
            format_output: false,
            root,
        }
    }

    /// Toggle indented output.
    #[must_use]
    pub fn with_format_output(mut self, enabled: bool) -> Self {
        self.format_output = enabled;
        self
    }

    /// Parse XML text strictly.
    ///
    /// All problems found while parsing are collected; only the first one is
    /// reported.
    ///
    /// # Errors
    /// Returns `ParseError` carrying the first diagnostic.
    ///
    /// # Examples
    /// ```
    /// use xmlmap::{Config, XmlDocument};
    ///
    /// let doc = XmlDocument::parse("<note><to>Tove</to></note>", &Config::default()).unwrap();
    /// assert_eq!(doc.root.name, "note");
    ///
    /// let err = XmlDocument::parse("no_xml", &Config::default()).unwrap_err();
    /// assert!(err.to_string().contains("Start tag expected"));
    /// ```
    pub fn parse(input: &str, config: &Config) -> Result<Self> {
        parser::parse(input, config)
    }

    /// Serialize to a string, including the XML declaration.
    ///
    /// The string is Unicode text whatever the declared encoding; use
    /// [`XmlDocument::to_xml_bytes`] or [`XmlDocument::write_to`] for bytes
    /// in that encoding.
    ///
    /// # Errors
    /// Returns `Write` if serialization fails.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_utf8(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| XmlMapError::Write(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Serialize to bytes in the declared encoding.
    ///
    /// Characters the encoding cannot represent are written as numeric
    /// character references.
    ///
    /// # Errors
    /// Returns `UnsupportedEncoding` for an unknown or non-ASCII-compatible
    /// label, `Write` if serialization fails.
    ///
    /// # Examples
    /// ```
    /// use xmlmap::document::XmlElement;
    /// use xmlmap::XmlDocument;
    ///
    /// let mut root = XmlElement::new("a");
    /// root.push_text("é");
    /// let bytes = XmlDocument::new("1.0", "ISO-8859-1", root).to_xml_bytes().unwrap();
    /// assert!(bytes.ends_with(b"<a>\xE9</a>\n"));
    /// ```
    pub fn to_xml_bytes(&self) -> Result<Vec<u8>> {
        let encoding = OutputEncoding::for_label(&self.encoding)?;
        Ok(encoding.encode(&self.to_xml_string()?))
    }

    /// Serialize into a writer in the declared encoding.
    ///
    /// # Errors
    /// Same as [`XmlDocument::to_xml_bytes`], plus `Write` if the writer fails.
    pub fn write_to<W: Write>(&self, mut sink: W) -> Result<()> {
        let bytes = self.to_xml_bytes()?;
        sink.write_all(&bytes).map_err(XmlMapError::Write)
    }

    fn write_utf8<W: Write>(&self, sink: W) -> Result<()> {
        let mut writer = if self.format_output {
            Writer::new_with_indent(sink, b' ', INDENT_SIZE)
        } else {
            Writer::new(sink)
        };

        writer
            .write_event(Event::Decl(BytesDecl::new(
                &self.version,
                Some(&self.encoding),
                None,
            )))
            .map_err(XmlMapError::Write)?;
        // The indenting writer breaks the line before the root on its own.
        if !self.format_output {
            writer.get_mut().write_all(b"\n").map_err(XmlMapError::Write)?;
        }
        self.root.write(&mut writer).map_err(XmlMapError::Write)?;
        writer.get_mut().write_all(b"\n").map_err(XmlMapError::Write)?;

        Ok(())
    }
}
