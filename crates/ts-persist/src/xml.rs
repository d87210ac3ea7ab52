use std::borrow::Cow;

use indexmap::IndexMap;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use roxmltree::{Document, Node, NodeType};
use ts_core::TaskScriptError;

/// Owned, mutable XML tree. Attribute and child order is preserved so that
/// migrations and re-serialization keep documents byte-stable apart from
/// the rewrites they intend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Removes an attribute, keeping the relative order of the others.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.element_children().find(|child| child.name == name)
    }

    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(value) => Some(value.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Applies `visit` to every descendant element (self included) whose
    /// name matches.
    pub fn visit_named_mut(&mut self, name: &str, visit: &mut impl FnMut(&mut XmlElement)) {
        if self.name == name {
            visit(self);
        }
        for child in &mut self.children {
            if let XmlNode::Element(element) = child {
                element.visit_named_mut(name, &mut *visit);
            }
        }
    }
}

pub fn parse_xml_document(source: &str) -> Result<XmlDocument, TaskScriptError> {
    let document = Document::parse(source)
        .map_err(|error| TaskScriptError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(TaskScriptError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    Ok(XmlDocument {
        root: parse_element(root),
    })
}

fn parse_element(node: Node<'_, '_>) -> XmlElement {
    let mut attributes = IndexMap::new();
    for attribute in node.attributes() {
        attributes.insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let mut children = Vec::new();
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => children.push(XmlNode::Element(parse_element(child))),
            NodeType::Text => {
                let value = child.text().unwrap_or_default();
                if value.is_empty() {
                    continue;
                }
                children.push(XmlNode::Text(value.to_string()));
            }
            _ => {}
        }
    }

    // Whitespace-only text between element children is indentation, not
    // content. In leaf elements (Variable, Cell, Item) the same text is the
    // value and must survive.
    if children.iter().any(|c| matches!(c, XmlNode::Element(_))) {
        children.retain(|child| match child {
            XmlNode::Text(value) => !value.trim().is_empty(),
            XmlNode::Element(_) => true,
        });
    }

    XmlElement {
        name: node.tag_name().name().to_string(),
        attributes,
        children,
    }
}

pub fn write_xml_document(document: &XmlDocument) -> Result<String, TaskScriptError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_error)?;
    write_element(&mut writer, &document.root)?;

    String::from_utf8(writer.into_inner())
        .map_err(|error| TaskScriptError::new("XML_WRITE_ERROR", error.to_string()))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &XmlElement,
) -> Result<(), TaskScriptError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attributes {
        start.push_attribute(Attribute {
            key: QName(name.as_bytes()),
            value: Cow::Owned(escape_attribute_value(value).into_bytes()),
        });
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(value) => writer
                .write_event(Event::Text(BytesText::from_escaped(escape_text_value(
                    value,
                ))))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

/// Attribute escaping that also entitizes control characters. Attribute-value
/// normalization folds literal newlines and tabs into spaces on reparse;
/// numeric character references survive it.
fn escape_attribute_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Text escaping. Carriage returns are entitized because line-ending
/// normalization would rewrite them to newlines on reparse.
fn escape_text_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#13;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn write_error(error: impl std::fmt::Display) -> TaskScriptError {
    TaskScriptError::new("XML_WRITE_ERROR", error.to_string())
}
