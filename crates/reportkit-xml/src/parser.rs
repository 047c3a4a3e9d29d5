//! XML parser that builds [`XmlDocument`] trees.

use crate::{Error, Result, Span, XmlAttribute, XmlChild, XmlChildren, XmlDocument, XmlElement};
use quick_xml::Reader;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

/// Parse XML text into a span-tracked tree.
///
/// Comments, processing instructions, the XML declaration and DOCTYPE are
/// skipped. Whitespace-only text between child elements is dropped.
///
/// # Errors
///
/// Returns an error if the text is not well-formed XML, has no root element,
/// or has more than one root element.
pub fn parse(content: &str) -> Result<XmlDocument> {
    XmlParser::new(content).parse()
}

struct XmlParser<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    stack: Vec<OpenElement>,
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    name_span: Span,
    prefix: Option<String>,
    attributes: Vec<XmlAttribute>,
    start_offset: usize,
    children: Vec<XmlChild>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            stack: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<XmlDocument> {
        let mut root: Option<XmlElement> = None;

        loop {
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let open = self.open_element(&e, event_start)?;
                    self.stack.push(open);
                }
                Ok(Event::End(e)) => {
                    let element = self.close_element(e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Empty(e)) => {
                    let open = self.open_element(&e, event_start)?;
                    let end_offset = self.reader.buffer_position() as usize;
                    let element = XmlElement {
                        name: open.name,
                        name_span: open.name_span,
                        prefix: open.prefix,
                        attributes: open.attributes,
                        children: XmlChildren::Empty,
                        span: Span::new(event_start, end_offset),
                    };
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Text(e)) => self.push_text(e, event_start)?,
                Ok(Event::CData(e)) => self.push_cdata(e, event_start),
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position() as usize),
                    });
                }
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", open.name),
                location: Some(open.name_span),
            });
        }

        let root = root.ok_or(Error::EmptyDocument)?;
        Ok(XmlDocument {
            root,
            span: Span::new(0, self.source.len()),
        })
    }

    /// Hand a finished element to its parent, or make it the root.
    fn attach(&mut self, element: XmlElement, root: &mut Option<XmlElement>) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(XmlChild::Element(element));
                Ok(())
            }
            None if root.is_some() => Err(Error::MultipleRoots {
                location: Some(element.span),
            }),
            None => {
                *root = Some(element);
                Ok(())
            }
        }
    }

    fn open_element(&self, e: &BytesStart<'_>, event_start: usize) -> Result<OpenElement> {
        let (name, prefix) = split_name(e.name().as_ref());
        let name_start = event_start + 1;
        let name_span = Span::new(name_start, name_start + e.name().as_ref().len());
        let attributes = self.parse_attributes(e, event_start)?;

        Ok(OpenElement {
            name,
            name_span,
            prefix,
            attributes,
            start_offset: event_start,
            children: Vec::new(),
        })
    }

    fn close_element(&mut self, e: BytesEnd<'_>) -> Result<XmlElement> {
        let (end_name, _) = split_name(e.name().as_ref());

        let open = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
            message: format!("Unexpected closing tag </{}>", end_name),
            location: None,
        })?;

        if open.name != end_name {
            return Err(Error::MismatchedEndTag {
                expected: open.name,
                found: end_name,
                location: Some(open.name_span),
            });
        }

        let end_offset = self.reader.buffer_position() as usize;
        Ok(XmlElement {
            name: open.name,
            name_span: open.name_span,
            prefix: open.prefix,
            attributes: open.attributes,
            children: finalize_children(open.children),
            span: Span::new(open.start_offset, end_offset),
        })
    }

    fn push_text(&mut self, e: BytesText<'_>, event_start: usize) -> Result<()> {
        let text = e.unescape().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid text content: {}", err),
            position: Some(event_start),
        })?;
        let span = Span::new(event_start, self.reader.buffer_position() as usize);

        if let Some(open) = self.stack.last_mut() {
            open.children.push(XmlChild::Text {
                content: text.into_owned(),
                span,
            });
        }
        Ok(())
    }

    fn push_cdata(&mut self, e: BytesCData<'_>, event_start: usize) {
        let content = String::from_utf8_lossy(e.as_ref()).into_owned();
        let span = Span::new(event_start, self.reader.buffer_position() as usize);

        if let Some(open) = self.stack.last_mut() {
            open.children.push(XmlChild::Text { content, span });
        }
    }

    fn parse_attributes(&self, e: &BytesStart<'_>, tag_start: usize) -> Result<Vec<XmlAttribute>> {
        // Raw tag content starts right after '<'.
        let content_start = tag_start + 1;
        let raw = e.as_ref();
        let mut cursor = e.name().as_ref().len();
        let mut attributes = Vec::new();

        for attr in e.attributes() {
            let attr = attr?;
            let key = attr.key.as_ref();
            let (name, prefix) = split_name(key);

            let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: Some(tag_start),
            })?;

            let (name_range, value_range) = locate_attribute(raw, cursor, key);
            cursor = value_range.1;

            attributes.push(XmlAttribute {
                name,
                name_span: Span::new(content_start + name_range.0, content_start + name_range.1),
                prefix,
                value: value.into_owned(),
                value_span: Span::new(
                    content_start + value_range.0,
                    content_start + value_range.1,
                ),
            });
        }

        Ok(attributes)
    }
}

/// Split `prefix:local` into `(local, Some(prefix))`.
fn split_name(raw: &[u8]) -> (String, Option<String>) {
    let full = String::from_utf8_lossy(raw);
    match full.split_once(':') {
        Some((prefix, local)) => (local.to_string(), Some(prefix.to_string())),
        None => (full.into_owned(), None),
    }
}

/// Find the byte ranges of attribute `key` and its value in the raw tag,
/// scanning forward from `from`. Attributes are visited in source order, so
/// the first occurrence of `key` at a word boundary after `from` is the one.
fn locate_attribute(raw: &[u8], from: usize, key: &[u8]) -> ((usize, usize), (usize, usize)) {
    let mut pos = from;
    while pos + key.len() <= raw.len() {
        let at_boundary = pos == 0 || raw[pos - 1].is_ascii_whitespace();
        if at_boundary && &raw[pos..pos + key.len()] == key {
            let name_end = pos + key.len();
            let mut i = name_end;
            while i < raw.len() && raw[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < raw.len() && raw[i] == b'=' {
                i += 1;
                while i < raw.len() && raw[i].is_ascii_whitespace() {
                    i += 1;
                }
                let value_start = i;
                let value_end = match raw.get(i) {
                    Some(&quote) if quote == b'"' || quote == b'\'' => raw[i + 1..]
                        .iter()
                        .position(|&b| b == quote)
                        .map_or(raw.len(), |p| i + 1 + p + 1),
                    _ => raw[i..]
                        .iter()
                        .position(|b| b.is_ascii_whitespace())
                        .map_or(raw.len(), |p| i + p),
                };
                return ((pos, name_end), (value_start, value_end));
            }
        }
        pos += 1;
    }
    ((from, from), (from, from))
}

/// Collapse accumulated children into the most specific [`XmlChildren`] shape.
fn finalize_children(children: Vec<XmlChild>) -> XmlChildren {
    let has_elements = children.iter().any(|c| matches!(c, XmlChild::Element(_)));
    let text_is_blank = children.iter().all(|c| match c {
        XmlChild::Text { content, .. } => content.trim().is_empty(),
        XmlChild::Element(_) => true,
    });

    if has_elements && text_is_blank {
        let elements = children
            .into_iter()
            .filter_map(|c| match c {
                XmlChild::Element(e) => Some(e),
                XmlChild::Text { .. } => None,
            })
            .collect();
        return XmlChildren::Elements(elements);
    }

    if has_elements {
        return XmlChildren::Mixed(children);
    }

    let mut texts = children.into_iter().filter_map(|c| match c {
        XmlChild::Text { content, span } => Some((content, span)),
        XmlChild::Element(_) => None,
    });
    match texts.next() {
        None => XmlChildren::Empty,
        Some((mut content, first)) => {
            let mut span = first;
            for (more, more_span) in texts {
                content.push_str(&more);
                span.end = more_span.end;
            }
            XmlChildren::Text { content, span }
        }
    }
}
