//! Strict text parser building an [`XmlDocument`] on top of quick-xml.
//!
//! quick-xml is lenient about document structure, so the builder checks the
//! rules the codec relies on (one root, no text outside it, every element
//! closed, only XML characters) and queues a diagnostic for each violation.
//! Reader errors end the parse; structural diagnostics do not.
//!
//! Line endings are normalized to `\n`, attribute values get whitespace
//! normalization, and general entities declared in the DOCTYPE internal
//! subset are expanded as text.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_xml_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use regex::Regex;
use roxmltree::NS_XML_URI;

use super::{
    invalid_char, is_xml_char, NamespaceDeclaration, XmlAttribute, XmlDocument, XmlElement,
    XmlNode,
};
use crate::config::Config;
use crate::error::{Result, XmlMapError};

/// `<!ENTITY name "value">` in an internal subset. Parameter entities and
/// external entities do not match.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ENTITY_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!ENTITY\s+([A-Za-z_][A-Za-z0-9._:-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
        .expect("valid regex")
});

/// A problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Diagnostic {
    message: String,
    position: u64,
}

/// Builds the element tree from reader events.
struct TreeBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    version: String,
    encoding: String,
    entities: HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
    position: u64,
}

impl TreeBuilder {
    fn new(config: &Config) -> Self {
        Self {
            stack: Vec::new(),
            root: None,
            version: config.version.clone(),
            encoding: config.encoding.clone(),
            entities: HashMap::new(),
            diagnostics: Vec::new(),
            position: 0,
        }
    }

    fn report(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            message: message.into(),
            position: self.position,
        });
    }

    /// Report the first character of `text` that XML does not allow.
    fn check_chars(&mut self, text: &str, what: &str) {
        if let Some(c) = invalid_char(text) {
            self.report(format!("{what} invalid Char value {}", u32::from(c)));
        }
    }

    fn open(&mut self, element: XmlElement) {
        if self.stack.is_empty() && self.root.is_some() {
            self.report("Extra content at the end of the document");
        }
        self.stack.push(element);
    }

    fn close(&mut self) {
        match self.stack.pop() {
            Some(element) => self.attach(element),
            None => self.report("Unexpected end tag outside of the root element"),
        }
    }

    fn attach(&mut self, element: XmlElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.push_element(element),
            None => {
                if self.root.is_none() {
                    self.root = Some(element);
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(parent) => parent.push_text(text),
            None => self.outside_root(text),
        }
    }

    fn node(&mut self, node: XmlNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if let XmlNode::CData(text) = node {
                    self.outside_root(&text);
                }
            }
        }
    }

    fn outside_root(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self.root.is_none() {
            self.report("Start tag expected, '<' not found");
        } else {
            self.report("Extra content at the end of the document");
        }
    }

    /// Record the general entities of a DOCTYPE internal subset. The first
    /// declaration of a name is binding.
    fn declare_entities(&mut self, doctype: &str) {
        for captures in ENTITY_DECLARATION.captures_iter(doctype) {
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map_or("", |m| m.as_str());
            let value = unescape_with(value, resolve_xml_entity)
                .map_or_else(|_| value.to_string(), Cow::into_owned);
            self.entities
                .entry(captures[1].to_string())
                .or_insert(value);
        }
    }

    /// Replacement text of an entity or character reference.
    fn expand(&self, reference: &str) -> std::result::Result<String, String> {
        if let Some(code) = reference.strip_prefix('#') {
            return char_reference(code)
                .map(String::from)
                .ok_or_else(|| format!("xmlParseCharRef: invalid xmlChar value {code}"));
        }
        if let Some(resolved) = resolve_xml_entity(reference) {
            return Ok(resolved.to_string());
        }
        self.entities
            .get(reference)
            .cloned()
            .ok_or_else(|| format!("Entity '{reference}' not defined"))
    }

    fn finish(mut self) -> Result<XmlDocument> {
        if let Some(open) = self.stack.last() {
            let message = format!("Premature end of data in tag {}", open.name);
            self.report(message);
        }
        if self.root.is_none() && self.diagnostics.is_empty() {
            self.report("Document is empty");
        }

        let mut diagnostics = std::mem::take(&mut self.diagnostics).into_iter();
        if let Some(first) = diagnostics.next() {
            let discarded = diagnostics.count();
            if discarded > 0 {
                tracing::debug!(discarded, "discarding additional parse diagnostics");
            }
            return Err(XmlMapError::ParseError {
                message: first.message,
                position: first.position,
            });
        }

        match self.root {
            Some(root) => Ok(XmlDocument::new(self.version, self.encoding, root)),
            None => Err(XmlMapError::ParseError {
                message: "Document is empty".to_string(),
                position: self.position,
            }),
        }
    }
}

/// Parse XML text into a document, reporting the first diagnostic.
pub(super) fn parse(input: &str, config: &Config) -> Result<XmlDocument> {
    let mut reader = NsReader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut builder = TreeBuilder::new(config);

    loop {
        builder.position = reader.buffer_position() as u64;
        let (resolve, event) = match reader.read_resolved_event() {
            Ok(resolved) => resolved,
            Err(err) => {
                builder.report(err.to_string());
                break;
            }
        };
        let namespace = resolve_namespace(&resolve);
        let unknown_prefix = matches!(resolve, ResolveResult::Unknown(_));

        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                let is_empty = matches!(event, Event::Empty(_));
                let element = read_element(&reader, start, namespace, &mut builder);
                if unknown_prefix {
                    let message = match element.prefix() {
                        Some(prefix) => format!(
                            "Namespace prefix {prefix} on {} is not defined",
                            element.name
                        ),
                        None => format!("Namespace of {} is not defined", element.name),
                    };
                    builder.report(message);
                }
                builder.open(element);
                if is_empty {
                    builder.close();
                }
            }
            Event::End(_) => builder.close(),
            Event::Text(text) => match text.decode() {
                Ok(text) => {
                    builder.check_chars(&text, "PCDATA");
                    builder.text(&normalize_line_endings(&text));
                }
                Err(err) => builder.report(err.to_string()),
            },
            Event::GeneralRef(reference) => match reference.decode() {
                Ok(name) => match builder.expand(&name) {
                    Ok(resolved) => builder.text(&resolved),
                    Err(message) => builder.report(message),
                },
                Err(err) => builder.report(err.to_string()),
            },
            Event::CData(cdata) => match cdata.decode() {
                Ok(text) => {
                    builder.check_chars(&text, "CData section");
                    builder.node(XmlNode::CData(normalize_line_endings(&text).into_owned()));
                }
                Err(err) => builder.report(err.to_string()),
            },
            Event::Comment(comment) => match comment.decode() {
                Ok(text) => {
                    builder.check_chars(&text, "Comment");
                    builder.node(XmlNode::Comment(normalize_line_endings(&text).into_owned()));
                }
                Err(err) => builder.report(err.to_string()),
            },
            Event::Decl(decl) => {
                if let Ok(version) = decl.version() {
                    builder.version = String::from_utf8_lossy(&version).into_owned();
                }
                if let Some(Ok(encoding)) = decl.encoding() {
                    builder.encoding = String::from_utf8_lossy(&encoding).into_owned();
                }
            }
            Event::DocType(doctype) => match doctype.decode() {
                Ok(text) => builder.declare_entities(&text),
                Err(err) => builder.report(err.to_string()),
            },
            Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    builder.position = reader.buffer_position() as u64;
    builder.finish()
}

/// Collect name, namespace declarations and attributes of a start tag.
fn read_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
    builder: &mut TreeBuilder,
) -> XmlElement {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    element.namespace = namespace;

    for attribute in start.attributes() {
        let attribute = match attribute {
            Ok(attribute) => attribute,
            Err(err) => {
                builder.report(err.to_string());
                continue;
            }
        };
        let key = attribute.key;
        let value = match attribute_value(&attribute.value, &builder.entities) {
            Ok(value) => value,
            Err(message) => {
                builder.report(message);
                continue;
            }
        };
        if invalid_char(&value).is_some() {
            builder.report(format!(
                "invalid character in attribute value {}",
                String::from_utf8_lossy(key.as_ref())
            ));
            continue;
        }

        if key.as_ref() == b"xmlns" {
            element
                .namespace_declarations
                .push(NamespaceDeclaration { prefix: None, uri: value });
            continue;
        }
        if let Some(prefix) = key.prefix() {
            if prefix.as_ref() == b"xmlns" {
                element.namespace_declarations.push(NamespaceDeclaration {
                    prefix: Some(String::from_utf8_lossy(key.local_name().as_ref()).into_owned()),
                    uri: value,
                });
                continue;
            }
        }

        let (resolve, local) = reader.resolver().resolve_attribute(key);
        let attribute_namespace = match key.prefix() {
            Some(prefix) if prefix.as_ref() == b"xml" => Some(NS_XML_URI.to_string()),
            _ => {
                if let ResolveResult::Unknown(prefix) = &resolve {
                    builder.report(format!(
                        "Namespace prefix {} for {} on {} is not defined",
                        String::from_utf8_lossy(prefix),
                        String::from_utf8_lossy(local.as_ref()),
                        element.name
                    ));
                }
                resolve_namespace(&resolve)
            }
        };
        element.attributes.push(XmlAttribute {
            name: String::from_utf8_lossy(key.as_ref()).into_owned(),
            value,
            namespace: attribute_namespace,
        });
    }

    element
}

/// Normalize and unescape a raw attribute value.
fn attribute_value(
    raw: &[u8],
    entities: &HashMap<String, String>,
) -> std::result::Result<String, String> {
    let raw = std::str::from_utf8(raw).map_err(|e| e.to_string())?;
    let normalized = normalize_attribute_whitespace(raw);
    unescape_with(&normalized, |name: &str| {
        resolve_xml_entity(name).or_else(|| entities.get(name).map(String::as_str))
    })
    .map(Cow::into_owned)
    .map_err(|e| e.to_string())
}

/// Namespace URI of a resolved name, if bound.
fn resolve_namespace(resolve: &ResolveResult<'_>) -> Option<String> {
    match resolve {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

/// `\r\n` and lone `\r` become `\n`.
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Line endings, tabs and newlines in a literal attribute value become
/// single spaces. Character references are expanded afterwards and keep
/// their character.
fn normalize_attribute_whitespace(raw: &str) -> String {
    raw.replace("\r\n", " ").replace(['\r', '\n', '\t'], " ")
}

/// Character of a reference body such as `65` or `x41`, if XML allows it.
fn char_reference(code: &str) -> Option<char> {
    let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse::<u32>().ok()?,
    };
    char::from_u32(value).filter(|c| is_xml_char(*c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(input: &str) -> Result<XmlDocument> {
        parse(input, &Config::default())
    }

    fn parse_error(input: &str) -> String {
        match parse_default(input) {
            Err(XmlMapError::ParseError { message, .. }) => message,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_document() {
        let doc = parse_default("<note><to>Tove</to><from>Jani</from></note>").unwrap();
        assert_eq!(doc.root.name, "note");
        let names: Vec<_> = doc.root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["to", "from"]);
    }

    #[test]
    fn test_parse_declaration() {
        let doc = parse_default("<?xml version=\"1.1\" encoding=\"ISO-8859-1\"?><a/>").unwrap();
        assert_eq!(doc.version, "1.1");
        assert_eq!(doc.encoding, "ISO-8859-1");

        let doc = parse_default("<a/>").unwrap();
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.encoding, "UTF-8");
    }

    #[test]
    fn test_text_without_root() {
        assert_eq!(parse_error("no_xml"), "Start tag expected, '<' not found");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_error(""), "Document is empty");
        assert_eq!(parse_error("   \n"), "Document is empty");
    }

    #[test]
    fn test_extra_content_after_root() {
        assert_eq!(
            parse_error("<a></a><b></b>"),
            "Extra content at the end of the document"
        );
        assert_eq!(
            parse_error("<a></a>trailing"),
            "Extra content at the end of the document"
        );
    }

    #[test]
    fn test_unclosed_element() {
        assert_eq!(
            parse_error("<note><to>Tove</to>"),
            "Premature end of data in tag note"
        );
    }

    #[test]
    fn test_first_diagnostic_wins() {
        // Leading text is reported before the unclosed element.
        assert_eq!(
            parse_error("oops<note>"),
            "Start tag expected, '<' not found"
        );
    }

    #[test]
    fn test_mismatched_end_tag_is_reported() {
        assert!(parse_default("<a><b></a>").is_err());
    }

    #[test]
    fn test_undeclared_prefix() {
        assert_eq!(
            parse_error("<h:table><h:tr/></h:table>"),
            "Namespace prefix h on h:table is not defined"
        );
    }

    #[test]
    fn test_entities_and_char_refs() {
        let doc = parse_default("<a>fish &amp; chips &#65;&#x42;</a>").unwrap();
        assert_eq!(
            doc.root.children,
            vec![XmlNode::Text("fish & chips AB".to_string())]
        );
    }

    #[test]
    fn test_undefined_entity() {
        assert_eq!(parse_error("<a>&nbsp;</a>"), "Entity 'nbsp' not defined");
    }

    #[test]
    fn test_cdata_and_comments_are_kept() {
        let doc = parse_default("<a><!-- note --><![CDATA[<raw>]]></a>").unwrap();
        assert_eq!(
            doc.root.children,
            vec![
                XmlNode::Comment(" note ".to_string()),
                XmlNode::CData("<raw>".to_string()),
            ]
        );
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let doc = parse_default(
            r#"<root xmlns="urn:default" xmlns:h="urn:html"><h:td h:id="1" plain="2"/></root>"#,
        )
        .unwrap();

        assert_eq!(doc.root.namespace.as_deref(), Some("urn:default"));
        assert_eq!(doc.root.namespace_declarations.len(), 2);
        assert!(doc.root.attributes.is_empty());

        let td = doc.root.child_elements().next().unwrap();
        assert_eq!(td.name, "h:td");
        assert_eq!(td.namespace.as_deref(), Some("urn:html"));
        assert_eq!(td.attributes[0].name, "h:id");
        assert_eq!(td.attributes[0].namespace.as_deref(), Some("urn:html"));
        assert_eq!(td.attributes[1].name, "plain");
        assert_eq!(td.attributes[1].namespace, None);
    }

    #[test]
    fn test_attribute_values_are_unescaped() {
        let doc = parse_default(r#"<a title="x &amp; y"/>"#).unwrap();
        assert_eq!(doc.root.attribute("title"), Some("x & y"));
    }

    #[test]
    fn test_char_reference() {
        assert_eq!(char_reference("x41"), Some('A'));
        assert_eq!(char_reference("66"), Some('B'));
        assert_eq!(char_reference("xZZ"), None);
        assert_eq!(char_reference("0"), None);
        assert_eq!(char_reference("xD800"), None);
    }

    #[test]
    fn test_line_endings_are_normalized() {
        let doc = parse_default("<a>x\r\ny\rz<![CDATA[1\r\n2]]></a>").unwrap();
        assert_eq!(
            doc.root.children,
            vec![
                XmlNode::Text("x\ny\nz".to_string()),
                XmlNode::CData("1\n2".to_string()),
            ]
        );
    }

    #[test]
    fn test_char_ref_carriage_return_survives() {
        let doc = parse_default("<a>x&#13;y</a>").unwrap();
        assert_eq!(doc.root.children, vec![XmlNode::Text("x\ry".to_string())]);
    }

    #[test]
    fn test_attribute_whitespace_is_normalized() {
        let doc = parse_default("<a t=\"x\ty\r\nz\nw\" r=\"1&#10;2\"/>").unwrap();
        assert_eq!(doc.root.attribute("t"), Some("x y z w"));
        assert_eq!(doc.root.attribute("r"), Some("1\n2"));
    }

    #[test]
    fn test_undeclared_attribute_prefix() {
        assert_eq!(
            parse_error(r#"<a x:id="1">t</a>"#),
            "Namespace prefix x for id on a is not defined"
        );
    }

    #[test]
    fn test_xml_prefix_needs_no_declaration() {
        let doc = parse_default(r#"<a xml:lang="nl"/>"#).unwrap();
        assert_eq!(doc.root.attributes[0].namespace.as_deref(), Some(NS_XML_URI));
    }

    #[test]
    fn test_internal_subset_entities() {
        let doc = parse_default(
            r#"<!DOCTYPE a [<!ENTITY e "x"><!ENTITY amp2 '&#38;'>]><a t="&e;">&e;-&amp2;</a>"#,
        )
        .unwrap();
        assert_eq!(doc.root.children, vec![XmlNode::Text("x-&".to_string())]);
        assert_eq!(doc.root.attribute("t"), Some("x"));
    }

    #[test]
    fn test_invalid_characters_are_rejected() {
        assert_eq!(
            parse_error("<a>&#0;</a>"),
            "xmlParseCharRef: invalid xmlChar value 0"
        );
        assert_eq!(parse_error("<a>x\u{1}</a>"), "PCDATA invalid Char value 1");
        assert!(parse_error("<a t=\"\u{2}\"/>").starts_with("invalid character in attribute value"));
    }
}
