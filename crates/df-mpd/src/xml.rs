//! Lossless XML tree.
//!
//! Every element, attribute, text run, comment and CDATA section read from a
//! document is kept in order and written back, so elements the manifest
//! helpers never look at (`SegmentTemplate`, `EssentialProperty`, `Label`
//! and the like) survive a rewrite untouched. The XML declaration is always
//! re-emitted as `<?xml version="1.0" encoding="UTF-8"?>`; processing
//! instructions and doctype declarations are not kept.

use std::fmt::Display;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use df_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data, whitespace included.
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, prefix included.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of `name`, or append it when absent.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements whose local name is `name`.
    pub fn children_named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'b> {
        self.elements().filter(move |e| e.local_name() == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children_named(name).next()
    }

    /// Concatenated text and CDATA content of this element's direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// This element and every element below it, depth first.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let current = out[i];
            let at = i + 1;
            for (n, child) in current.elements().enumerate() {
                out.insert(at + n, child);
            }
            i += 1;
        }
        out
    }

    /// Append `child` after the last child element, reusing the indentation
    /// of the existing siblings when the element is pretty-printed.
    pub fn append_element(&mut self, child: Element) {
        let trailing = match self.children.last() {
            Some(Node::Text(t)) if is_blank(t) => self.children.pop(),
            _ => None,
        };
        if let Some(indent) = self.sibling_indent() {
            self.children.push(Node::Text(indent));
        }
        self.children.push(Node::Element(child));
        if let Some(trailing) = trailing {
            self.children.push(trailing);
        }
    }

    /// Remove every child element named `name` together with the whitespace
    /// run in front of it. Returns the number of elements removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.children.len() {
            let matches = matches!(&self.children[i], Node::Element(e) if e.local_name() == name);
            if !matches {
                i += 1;
                continue;
            }
            self.children.remove(i);
            removed += 1;
            if i > 0 && matches!(&self.children[i - 1], Node::Text(t) if is_blank(t)) {
                self.children.remove(i - 1);
                i -= 1;
            }
        }
        removed
    }

    fn sibling_indent(&self) -> Option<String> {
        let last = self
            .children
            .iter()
            .rposition(|n| matches!(n, Node::Element(_)))?;
        match self.children.get(last.checked_sub(1)?) {
            Some(Node::Text(t)) if is_blank(t) => Some(t.clone()),
            _ => None,
        }
    }
}

/// A parsed document: comments ahead of the root, then the root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub prolog: Vec<String>,
    pub root: Element,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut prolog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(invalid(format!(
                        "{e} at byte {}",
                        reader.buffer_position()
                    )))
                }
            };
            match event {
                Event::Start(start) => stack.push(open(&start)?),
                Event::Empty(start) => {
                    let element = open(&start)?;
                    close(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| invalid("unbalanced closing tag"))?;
                    close(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape().map_err(invalid)?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8_lossy(&data).into_owned();
                        parent.children.push(Node::CData(data));
                    }
                }
                Event::Comment(comment) => {
                    let comment = String::from_utf8_lossy(&comment).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Comment(comment)),
                        None if root.is_none() => prolog.push(comment),
                        None => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(invalid(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| invalid("no root element"))?;
        Ok(Self { prolog, root })
    }

    /// Serialize with an XML declaration and a trailing newline.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(unwritable)?;
        for comment in &self.prolog {
            writer.write_event(Event::Text(BytesText::new("\n"))).map_err(unwritable)?;
            writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(unwritable)?;
        }
        writer.write_event(Event::Text(BytesText::new("\n"))).map_err(unwritable)?;
        write_element(&mut writer, &self.root)?;
        writer.write_event(Event::Text(BytesText::new("\n"))).map_err(unwritable)?;

        String::from_utf8(writer.into_inner()).map_err(unwritable)
    }
}

fn open(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(invalid)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(invalid)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(invalid("more than one root element")),
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(unwritable);
    }

    writer.write_event(Event::Start(start)).map_err(unwritable)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(unwritable)?,
            Node::CData(d) => writer
                .write_event(Event::CData(BytesCData::new(d.as_str())))
                .map_err(unwritable)?,
            Node::Comment(c) => writer
                .write_event(Event::Comment(BytesText::from_escaped(c.as_str())))
                .map_err(unwritable)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(unwritable)
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

fn invalid(e: impl Display) -> Error {
    Error::Manifest(format!("invalid manifest: {e}"))
}

fn unwritable(e: impl Display) -> Error {
    Error::Manifest(format!("could not serialize manifest: {e}"))
}
