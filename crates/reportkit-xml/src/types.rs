//! Tree types produced by the parser.

use crate::Span;

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// The single root element.
    pub root: XmlElement,

    /// Span of the whole document.
    pub span: Span,
}

/// An XML element with spans for its name and its full extent.
#[derive(Debug, Clone)]
pub struct XmlElement {
    /// Local name (namespace prefix stripped).
    pub name: String,

    /// Span of the element name inside the start tag.
    pub name_span: Span,

    /// Namespace prefix, if any.
    pub prefix: Option<String>,

    pub attributes: Vec<XmlAttribute>,

    pub children: XmlChildren,

    /// Span from `<` of the start tag to `>` of the end tag (or `/>`).
    pub span: Span,
}

/// An attribute with separate spans for name and value.
#[derive(Debug, Clone)]
pub struct XmlAttribute {
    pub name: String,
    pub name_span: Span,
    pub prefix: Option<String>,
    /// Unescaped value.
    pub value: String,
    /// Span of the value in the source, quotes included.
    pub value_span: Span,
}

/// Content of an element.
#[derive(Debug, Clone)]
pub enum XmlChildren {
    /// Only child elements (whitespace between them is dropped).
    Elements(Vec<XmlElement>),

    /// Only text.
    Text { content: String, span: Span },

    /// Text interleaved with elements.
    Mixed(Vec<XmlChild>),

    Empty,
}

/// One item of mixed content.
#[derive(Debug, Clone)]
pub enum XmlChild {
    Element(XmlElement),
    Text { content: String, span: Span },
}

impl XmlElement {
    /// Get an attribute value by local name.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Get an attribute with its spans.
    pub fn get_attribute_full(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.children, XmlChildren::Empty)
    }

    /// Text content, if this element contains only text.
    pub fn text(&self) -> Option<&str> {
        match &self.children {
            XmlChildren::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Concatenated text of all direct text children (mixed content included).
    pub fn text_content(&self) -> String {
        match &self.children {
            XmlChildren::Text { content, .. } => content.clone(),
            XmlChildren::Mixed(children) => children
                .iter()
                .filter_map(|c| match c {
                    XmlChild::Text { content, .. } => Some(content.as_str()),
                    XmlChild::Element(_) => None,
                })
                .collect(),
            XmlChildren::Elements(_) | XmlChildren::Empty => String::new(),
        }
    }

    /// Child elements with the given local name, in document order.
    pub fn get_children(&self, name: &str) -> Vec<&XmlElement> {
        self.all_children()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// First child element with the given local name.
    pub fn get_child(&self, name: &str) -> Option<&XmlElement> {
        self.all_children().into_iter().find(|e| e.name == name)
    }

    /// All child elements, ignoring text in mixed content.
    pub fn all_children(&self) -> Vec<&XmlElement> {
        match &self.children {
            XmlChildren::Elements(elements) => elements.iter().collect(),
            XmlChildren::Mixed(children) => children
                .iter()
                .filter_map(|c| match c {
                    XmlChild::Element(e) => Some(e),
                    XmlChild::Text { .. } => None,
                })
                .collect(),
            XmlChildren::Text { .. } | XmlChildren::Empty => vec![],
        }
    }
}
