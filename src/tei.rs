//! Minimal owned element tree for TEI documents.
//!
//! The document is read once with quick-xml into a tree of elements and text
//! nodes. Each element keeps the byte span it occupies in the source text so
//! an article can be re-emitted verbatim.

use crate::error::{ConvertError, Result};
use crate::normalize::collapse_whitespace;
use bzip2::read::BzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local name, namespace prefix removed
    pub name: String,
    /// Attributes keyed by their qualified name (`xml:id` stays `xml:id`)
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub span: Range<usize>,
}

/// Elements that separate words without carrying text of their own.
const BREAK_ELEMENTS: &[&str] = &["lb", "pb", "cb"];

impl Element {
    fn from_start(start: &BytesStart, offset: usize) -> std::result::Result<Element, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            attrs.push((key, value));
        }
        Ok(Element {
            name,
            attrs,
            children: Vec::new(),
            span: offset..offset,
        })
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value with surrounding whitespace removed; empty counts as absent.
    pub fn attr_trimmed(&self, key: &str) -> Option<&str> {
        self.attr(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First descendant (depth-first, document order) with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.is(name) {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given name, in document order. Matches are not
    /// searched for nested matches of the same name.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if child.is(name) {
                out.push(child);
            } else {
                child.collect_named(name, out);
            }
        }
    }

    /// Concatenated descendant text with whitespace collapsed.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        self.push_text(&mut buf);
        collapse_whitespace(&buf)
    }

    /// Line, page and column breaks.
    pub fn is_break(&self) -> bool {
        BREAK_ELEMENTS.contains(&self.name.as_str())
    }

    pub(crate) fn push_text(&self, buf: &mut String) {
        if self.is_break() {
            buf.push(' ');
            return;
        }
        for child in &self.children {
            match child {
                Node::Text(t) => buf.push_str(t),
                Node::Element(e) => e.push_text(buf),
            }
        }
    }
}

/// A parsed source document together with its text.
#[derive(Debug)]
pub struct TeiDocument {
    pub text: String,
    pub root: Element,
}

impl TeiDocument {
    /// Read and parse a document from disk. `.bz2` files are decompressed.
    pub fn load(path: &Path) -> Result<TeiDocument> {
        let text = read_source(path)?;
        TeiDocument::parse(text, path)
    }

    /// Parse document text. `path` is only used in diagnostics.
    pub fn parse(text: String, path: &Path) -> Result<TeiDocument> {
        let root = parse_tree(&text).map_err(|(position, message)| ConvertError::Xml {
            path: path.to_path_buf(),
            position,
            message,
        })?;
        if !matches!(root.name.as_str(), "TEI" | "teiCorpus") {
            return Err(ConvertError::UnexpectedRoot {
                path: path.to_path_buf(),
                found: root.name,
            });
        }
        Ok(TeiDocument { text, root })
    }

    /// Verbatim source of an element.
    pub fn source_of(&self, element: &Element) -> &str {
        self.text.get(element.span.clone()).unwrap_or("")
    }
}

fn read_source(path: &Path) -> Result<String> {
    let io_err = |source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    if path.to_string_lossy().ends_with(".bz2") {
        debug!("Decompressing {}", path.display());
        let mut reader = BufReader::with_capacity(256 * 1024, BzDecoder::new(file));
        reader.read_to_end(&mut bytes).map_err(io_err)?;
    } else {
        let mut reader = BufReader::with_capacity(256 * 1024, file);
        reader.read_to_end(&mut bytes).map_err(io_err)?;
    }
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("{} is not valid UTF-8, replacing invalid sequences", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    })
}

/// Build the element tree. Errors carry the byte position of the failure.
fn parse_tree(text: &str) -> std::result::Result<Element, (usize, String)> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| (reader.buffer_position(), e.to_string()))?;
        let after = reader.buffer_position();
        // A tag cannot contain '<', so the last one before the reader is its start
        let tag_start = text[..after].rfind('<').unwrap_or(0);
        match event {
            Event::Start(start) => {
                let element =
                    Element::from_start(&start, tag_start).map_err(|m| (tag_start, m))?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let mut element =
                    Element::from_start(&start, tag_start).map_err(|m| (tag_start, m))?;
                element.span.end = after;
                attach(&mut stack, &mut root, element, tag_start)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| (tag_start, "unexpected closing tag".to_string()))?;
                element.span.end = after;
                attach(&mut stack, &mut root, element, tag_start)?;
            }
            Event::Text(t) => {
                if let Some(parent) = stack.last_mut() {
                    let value = t
                        .unescape()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    push_text_node(parent, value);
                }
            }
            Event::CData(c) => {
                if let Some(parent) = stack.last_mut() {
                    push_text_node(parent, String::from_utf8_lossy(&c).into_owned());
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err((text.len(), format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| (0, "document has no root element".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: usize,
) -> std::result::Result<(), (usize, String)> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err((position, "multiple root elements".to_string())),
    }
}

fn push_text_node(parent: &mut Element, value: String) {
    // Adjacent text and CDATA sections merge into one node
    if let Some(Node::Text(prev)) = parent.children.last_mut() {
        prev.push_str(&value);
    } else {
        parent.children.push(Node::Text(value));
    }
}
