//! Template Tree - Owned SVG Document
//!
//! Templates are parsed once into an owned node tree, mutated in place by
//! the binder and compositor, then written back out for rasterization.

use std::fmt;
use std::str::FromStr;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Malformed template XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Template has no root element")]
    MissingRoot,

    #[error("Unbalanced closing tag </{0}>")]
    Unbalanced(String),

    #[error("Unclosed element <{0}>")]
    Unclosed(String),

    #[error("Template is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    Declaration(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An XML element. The qualified name is kept exactly as written so the
/// output round-trips prefixes such as `svg:g` or `xlink:href`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: vec![],
            children: vec![],
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn is(&self, local_name: &str) -> bool {
        self.local_name() == local_name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace an existing attribute in place, or append it.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Concatenated text of this element and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Pre-order traversal over this element and every descendant element.
    pub fn walk<'a, F: FnMut(&'a Element)>(&'a self, f: &mut F) {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }

    /// Pre-order traversal with mutable access. Children are visited after
    /// `f` returns, so nodes `f` appends are visited as well.
    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }

    /// All descendant-or-self elements with the given id.
    pub fn find_by_id<'a>(&'a self, id: &str) -> Vec<&'a Element> {
        let mut found = vec![];
        self.walk(&mut |e: &'a Element| {
            if e.id() == Some(id) {
                found.push(e);
            }
        });
        found
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

/// A parsed template: prolog nodes, the root element, trailing nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Template {
    pub fn new(root: Element) -> Self {
        Self {
            prolog: vec![],
            root,
            epilog: vec![],
        }
    }

    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut reader = Reader::from_str(source);
        let mut stack: Vec<Element> = vec![];
        let mut prolog = vec![];
        let mut root: Option<Element> = None;
        let mut epilog = vec![];

        loop {
            let node = match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(element_from(&start)?);
                    continue;
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    let element = stack.pop().ok_or(TemplateError::Unbalanced(name))?;
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(element_from(&start)?),
                Event::Text(text) => Node::Text(text.unescape()?.into_owned()),
                Event::CData(data) => Node::CData(lossy(&data)),
                Event::Comment(comment) => Node::Comment(lossy(&comment)),
                Event::Decl(decl) => Node::Declaration(lossy(&decl)),
                Event::PI(pi) => Node::ProcessingInstruction(lossy(&pi)),
                Event::DocType(doctype) => Node::DocType(lossy(&doctype)),
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }
            match (node, root.is_some()) {
                (Node::Element(element), false) => root = Some(element),
                (node, false) => prolog.push(node),
                (node, true) => epilog.push(node),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(TemplateError::Unclosed(open.name));
        }
        let root = root.ok_or(TemplateError::MissingRoot)?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TemplateError> {
        let source = String::from_utf8(bytes)?;
        Self::parse(&source)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Declare `xmlns:<prefix>` on the root unless already present.
    pub fn ensure_namespace(&mut self, prefix: &str, uri: &str) {
        let key = format!("xmlns:{}", prefix);
        if self.root.attr(&key).is_none() {
            self.root.set_attr(key, uri);
        }
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            write_node(node, &mut out);
        }
        write_element(&self.root, &mut out);
        for node in &self.epilog {
            write_node(node, &mut out);
        }
        out
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_svg_string())
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, TemplateError> {
    let mut element = Element::new(lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = lossy(attr.key.as_ref());
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, out),
        Node::Text(t) => out.push_str(&escape(t.as_str())),
        Node::CData(t) => {
            out.push_str("<![CDATA[");
            out.push_str(t);
            out.push_str("]]>");
        }
        Node::Comment(t) => {
            out.push_str("<!--");
            out.push_str(t);
            out.push_str("-->");
        }
        Node::ProcessingInstruction(t) | Node::Declaration(t) => {
            out.push_str("<?");
            out.push_str(t);
            out.push_str("?>");
        }
        Node::DocType(t) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(t.trim_start());
            out.push('>');
        }
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LABEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- label -->
<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100">
  <g id="layer1">
    <text id="item.sku"><tspan>SKU</tspan></text>
    <image id="dm" width="100" height="100" transform="translate(10,10)"/>
  </g>
</svg>
"#;

    #[test]
    fn test_round_trip_is_stable() {
        let template = Template::parse(LABEL).unwrap();
        let once = template.to_svg_string();
        let twice = Template::parse(&once).unwrap().to_svg_string();
        assert_eq!(once, twice);
        assert!(once.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(once.contains("<!-- label -->"));
        assert!(once.contains(r#"<image id="dm" width="100" height="100" transform="translate(10,10)"/>"#));
    }

    #[test]
    fn test_text_is_escaped_on_output() {
        let mut template = Template::parse(LABEL).unwrap();
        template.root_mut().walk_mut(&mut |e| {
            if e.is("text") {
                e.set_text("Fish & <Chips>");
            }
        });
        let out = template.to_svg_string();
        assert!(out.contains("Fish &amp; &lt;Chips&gt;"));
    }

    #[test]
    fn test_local_name_ignores_prefix() {
        let template = Template::parse(
            r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"><svg:g id="a"/></svg:svg>"#,
        )
        .unwrap();
        let group = template.root().child_elements().next().unwrap();
        assert!(group.is("g"));
        assert_eq!(group.name, "svg:g");
    }

    #[test]
    fn test_find_by_id_returns_duplicates() {
        let template = Template::parse(
            r#"<svg><g><text id="x">a</text></g><g><text id="x">b</text></g></svg>"#,
        )
        .unwrap();
        let found = template.root().find_by_id("x");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text_content(), "a");
        assert_eq!(found[1].text_content(), "b");
    }

    #[test]
    fn test_ensure_namespace_is_idempotent() {
        let mut template = Template::parse("<svg/>").unwrap();
        template.ensure_namespace("xlink", XLINK_NS);
        template.ensure_namespace("xlink", XLINK_NS);
        assert_eq!(
            template.to_svg_string(),
            r#"<svg xmlns:xlink="http://www.w3.org/1999/xlink"/>"#
        );
    }

    #[test]
    fn test_malformed_templates_error() {
        assert!(matches!(Template::parse(""), Err(TemplateError::MissingRoot)));
        assert!(Template::parse("<svg><g></svg>").is_err());
        assert!(Template::parse("<svg><g>").is_err());
    }
}
