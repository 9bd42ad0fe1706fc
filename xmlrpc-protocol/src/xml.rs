//! Minimal owned element tree.
//!
//! Wire documents are small, so they are read into a tree of [`Element`]s
//! before interpretation. Only element names, character data and nesting are
//! kept; attributes, comments, processing instructions and the XML
//! declaration carry no meaning in the protocol and are dropped.

use crate::error::ProtocolError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Maximum element nesting accepted in a document.
pub const MAX_DEPTH: usize = 128;

/// An element with its character data and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Reads a complete document and returns its root element.
    pub fn parse(input: &[u8]) -> Result<Element, ProtocolError> {
        let mut reader = Reader::from_reader(input);
        let mut buf = Vec::new();
        let mut open: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    if open.len() >= MAX_DEPTH {
                        return Err(ProtocolError::TooDeep { max: MAX_DEPTH });
                    }
                    open.push(Element::new(element_name(&start)?));
                }
                Event::Empty(start) => {
                    let element = Element::new(element_name(&start)?);
                    attach(&mut open, &mut root, element)?;
                }
                Event::End(end) => {
                    let element = open.pop().ok_or_else(|| {
                        ProtocolError::UnexpectedClose(
                            String::from_utf8_lossy(end.name().as_ref()).into_owned(),
                        )
                    })?;
                    attach(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        let data =
                            std::str::from_utf8(&data).map_err(|_| ProtocolError::InvalidUtf8)?;
                        current.text.push_str(data);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(unclosed) = open.pop() {
            return Err(ProtocolError::UnclosedElement(unclosed.name));
        }
        root.ok_or(ProtocolError::EmptyDocument)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Character data directly inside this element.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// Returns the first child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns every child with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String, ProtocolError> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

fn attach(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ProtocolError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(ProtocolError::MultipleRoots),
        None => *root = Some(element),
    }
    Ok(())
}
