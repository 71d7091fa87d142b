//! Import of trees already parsed by roxmltree.
//!
//! roxmltree keeps local names and resolved namespaces, so qualified names
//! are rebuilt from the in-scope prefixes. It also folds CDATA sections into
//! plain text, so imported documents never contain [`XmlNode::CData`].

use roxmltree::{Document, Node, NS_XML_URI};

use super::{NamespaceDeclaration, XmlAttribute, XmlDocument, XmlElement, XmlNode};
use crate::config::{DEFAULT_ENCODING, DEFAULT_VERSION};

/// Get the qualified tag name (`prefix:local`) of an element.
///
/// # Arguments
/// * `node` - XML element node
///
/// # Returns
/// Tag name with the prefix bound to its namespace, if any
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use xmlmap::document::qualified_name;
///
/// let xml = r#"<ns:root xmlns:ns="http://example.com"><child/></ns:root>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert_eq!(qualified_name(doc.root_element()), "ns:root");
/// ```
pub fn qualified_name(node: Node<'_, '_>) -> String {
    let tag = node.tag_name();
    prefixed(node, tag.namespace(), tag.name())
}

/// Prefix a local name with the prefix bound to `namespace` at `node`.
fn prefixed(node: Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    let prefix = namespace.and_then(|uri| {
        if uri == NS_XML_URI {
            Some("xml")
        } else {
            node.lookup_prefix(uri)
        }
    });

    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Namespaces declared on this element rather than inherited.
fn declared_namespaces(node: Node<'_, '_>) -> Vec<NamespaceDeclaration> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != NS_XML_URI)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| NamespaceDeclaration {
            prefix: ns.name().map(String::from),
            uri: ns.uri().to_string(),
        })
        .collect()
}

fn import_element(node: Node<'_, '_>) -> XmlElement {
    let mut element = XmlElement::new(qualified_name(node));
    element.namespace = node.tag_name().namespace().map(String::from);
    element.namespace_declarations = declared_namespaces(node);
    element.attributes = node
        .attributes()
        .map(|attribute| XmlAttribute {
            name: prefixed(node, attribute.namespace(), attribute.name()),
            value: attribute.value().to_string(),
            namespace: attribute.namespace().map(String::from),
        })
        .collect();

    for child in node.children() {
        if child.is_element() {
            element.push_element(import_element(child));
        } else if child.is_text() {
            element.push_text(child.text().unwrap_or_default());
        } else if child.is_comment() {
            element
                .children
                .push(XmlNode::Comment(child.text().unwrap_or_default().to_string()));
        }
    }

    element
}

impl XmlDocument {
    /// Import a document parsed by roxmltree.
    ///
    /// # Examples
    /// ```
    /// use roxmltree::Document;
    /// use xmlmap::XmlDocument;
    ///
    /// let doc = Document::parse("<note><to>Tove</to></note>").unwrap();
    /// let imported = XmlDocument::from_roxmltree(&doc);
    /// assert_eq!(imported.root.name, "note");
    /// ```
    pub fn from_roxmltree(doc: &Document<'_>) -> Self {
        XmlDocument::new(
            DEFAULT_VERSION,
            DEFAULT_ENCODING,
            import_element(doc.root_element()),
        )
    }
}
