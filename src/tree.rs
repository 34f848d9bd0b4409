//! Note tree parsing.
//!
//! The export is a CherryTree-style XML document: a root element holding
//! nested `node` elements. Each node carries `unique_id`, `name`,
//! `ts_creation` and `ts_lastsave` attributes; its body is the sequence of
//! `rich_text` children, and nested `node` children form the hierarchy.
//!
//! Parsing is a single pass over the event stream with an explicit stack of
//! open elements, so deep trees cannot exhaust the call stack.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::debug;

use crate::markup::{self, Run, Style};

/// One note of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The export's `unique_id`
    pub id: String,
    pub title: String,
    pub body: Vec<Run>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Nesting level; top-level nodes are at depth 0
    pub depth: usize,
    /// Index of the parent node, `None` for top-level nodes
    pub parent: Option<usize>,
    /// Indices of the child nodes, in document order
    pub children: Vec<usize>,
}

impl Node {
    pub fn has_body(&self) -> bool {
        markup::has_text(&self.body)
    }
}

/// All nodes of an export, indexed in document (pre-)order.
///
/// A node's index is its position in [`NoteTree::nodes`]; parents always
/// precede their children.
#[derive(Debug, Clone, Default)]
pub struct NoteTree {
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl NoteTree {
    /// Parse an export.
    ///
    /// Timestamps of `0` mean "unknown" and are inherited from the parent
    /// node; top-level nodes inherit `fallback` instead.
    pub fn parse(xml: &str, fallback: DateTime<Utc>) -> Result<Self, ParseError> {
        let mut reader = Reader::from_str(xml);
        let mut builder = Builder::new(fallback);
        let mut stack: Vec<OpenElement> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|source| ParseError::Xml {
                position: reader.error_position() as u64,
                source,
            })?;

            match event {
                Event::Start(start) => {
                    let frame = builder.open(&start, stack.last().map(|o| &o.frame), position)?;
                    stack.push(OpenElement {
                        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                        position,
                        frame,
                    });
                }
                Event::Empty(start) => {
                    let frame = builder.open(&start, stack.last().map(|o| &o.frame), position)?;
                    builder.close(frame);
                }
                Event::End(_) => {
                    let Some(open) = stack.pop() else {
                        return Err(ParseError::OutsideRoot { position });
                    };
                    builder.close(open.frame);
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|source| ParseError::Xml { position, source })?;
                    builder.text(stack.last_mut().map(|o| &mut o.frame), &text, position)?;
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data);
                    builder.text(stack.last_mut().map(|o| &mut o.frame), &text, position)?;
                }
                Event::Eof => {
                    if let Some(open) = stack.last() {
                        return Err(ParseError::Unclosed {
                            element: open.name.clone(),
                            position: open.position,
                        });
                    }
                    if !builder.seen_root {
                        return Err(ParseError::Empty);
                    }
                    break;
                }
                _ => {}
            }
        }

        Ok(builder.finish())
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Look up a node by its export id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&index| &self.nodes[index])
    }

    /// Indices of the top-level nodes.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// -------------------------------------------------------------------------
// Internal helpers
// -------------------------------------------------------------------------

/// What an open element means for the tree being built.
enum Frame {
    Root,
    Node(usize),
    RichText { node: usize, run: Run },
    /// Code boxes, tables, images and anything else we don't render
    Skip,
}

struct OpenElement {
    name: String,
    position: u64,
    frame: Frame,
}

struct Builder {
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
    roots: Vec<usize>,
    fallback: DateTime<Utc>,
    seen_root: bool,
}

impl Builder {
    fn new(fallback: DateTime<Utc>) -> Self {
        Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            roots: Vec::new(),
            fallback,
            seen_root: false,
        }
    }

    fn open(
        &mut self,
        start: &BytesStart<'_>,
        parent: Option<&Frame>,
        position: u64,
    ) -> Result<Frame, ParseError> {
        let name = start.name();
        match parent {
            None if self.seen_root => Err(ParseError::OutsideRoot { position }),
            None => {
                self.seen_root = true;
                Ok(Frame::Root)
            }
            Some(Frame::Root) if name.as_ref() == b"node" => {
                Ok(Frame::Node(self.open_node(start, None, position)?))
            }
            Some(&Frame::Node(parent)) if name.as_ref() == b"node" => {
                Ok(Frame::Node(self.open_node(start, Some(parent), position)?))
            }
            Some(&Frame::Node(node)) if name.as_ref() == b"rich_text" => {
                let mut style = Style::default();
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| ParseError::Xml {
                        position,
                        source: e.into(),
                    })?;
                    let value = attr
                        .unescape_value()
                        .map_err(|source| ParseError::Xml { position, source })?;
                    style.apply(&String::from_utf8_lossy(attr.key.as_ref()), &value);
                }
                Ok(Frame::RichText {
                    node,
                    run: Run {
                        text: String::new(),
                        style,
                    },
                })
            }
            Some(_) => Ok(Frame::Skip),
        }
    }

    fn text(&mut self, top: Option<&mut Frame>, text: &str, position: u64) -> Result<(), ParseError> {
        match top {
            Some(Frame::RichText { run, .. }) => run.text.push_str(text),
            None if !text.trim().is_empty() => return Err(ParseError::OutsideRoot { position }),
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, frame: Frame) {
        if let Frame::RichText { node, run } = frame {
            if !run.text.is_empty() {
                self.nodes[node].body.push(run);
            }
        }
    }

    fn open_node(
        &mut self,
        start: &BytesStart<'_>,
        parent: Option<usize>,
        position: u64,
    ) -> Result<usize, ParseError> {
        let mut id = None;
        let mut title = None;
        let mut created = None;
        let mut modified = None;

        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml {
                position,
                source: e.into(),
            })?;
            let value = attr
                .unescape_value()
                .map_err(|source| ParseError::Xml { position, source })?
                .into_owned();
            match attr.key.as_ref() {
                b"unique_id" => id = Some(value),
                b"name" => title = Some(value),
                b"ts_creation" => created = Some(value),
                b"ts_lastsave" => modified = Some(value),
                _ => {}
            }
        }

        let id = id.ok_or(ParseError::MissingAttribute {
            node: None,
            attribute: "unique_id",
            position,
        })?;
        let missing = |attribute| ParseError::MissingAttribute {
            node: Some(id.clone()),
            attribute,
            position,
        };
        let title = title.ok_or_else(|| missing("name"))?;
        let created = created.ok_or_else(|| missing("ts_creation"))?;
        let modified = modified.ok_or_else(|| missing("ts_lastsave"))?;

        if self.by_id.contains_key(&id) {
            return Err(ParseError::DuplicateId { node: id, position });
        }

        let (inherited_created, inherited_modified) = match parent {
            Some(p) => (self.nodes[p].created, self.nodes[p].modified),
            None => (self.fallback, self.fallback),
        };
        let created = parse_timestamp(&id, "ts_creation", &created)?.unwrap_or(inherited_created);
        let modified = parse_timestamp(&id, "ts_lastsave", &modified)?.unwrap_or(inherited_modified);
        if modified < created {
            debug!(node = %id, %created, %modified, "node modified before it was created");
        }

        let index = self.nodes.len();
        let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        self.by_id.insert(id.clone(), index);
        self.nodes.push(Node {
            id,
            title,
            body: Vec::new(),
            created,
            modified,
            depth,
            parent,
            children: Vec::new(),
        });
        Ok(index)
    }

    fn finish(self) -> NoteTree {
        NoteTree {
            nodes: self.nodes,
            by_id: self.by_id,
            roots: self.roots,
        }
    }
}

/// Parse a seconds-since-epoch attribute; `Ok(None)` means "unknown".
fn parse_timestamp(
    node: &str,
    attribute: &'static str,
    raw: &str,
) -> Result<Option<DateTime<Utc>>, ParseError> {
    let invalid = || ParseError::InvalidTimestamp {
        node: node.to_string(),
        attribute,
        value: raw.to_string(),
    };

    let seconds: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    if seconds == 0.0 {
        return Ok(None);
    }

    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .map(Some)
        .ok_or_else(invalid)
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that make an export unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML near byte {position}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("document has no root element")]
    Empty,

    #[error("element <{element}> opened at byte {position} is never closed")]
    Unclosed { element: String, position: u64 },

    #[error("unexpected content outside the root element at byte {position}")]
    OutsideRoot { position: u64 },

    #[error(
        "node {} at byte {position} is missing the `{attribute}` attribute",
        .node.as_deref().unwrap_or("<unknown>")
    )]
    MissingAttribute {
        node: Option<String>,
        attribute: &'static str,
        position: u64,
    },

    #[error("node {node} has an invalid `{attribute}` value '{value}'")]
    InvalidTimestamp {
        node: String,
        attribute: &'static str,
        value: String,
    },

    #[error("node id {node} is used more than once (again at byte {position})")]
    DuplicateId { node: String, position: u64 },
}

impl ParseError {
    /// Id of the offending node, when known.
    pub fn node(&self) -> Option<&str> {
        match self {
            ParseError::MissingAttribute { node, .. } => node.as_deref(),
            ParseError::InvalidTimestamp { node, .. } | ParseError::DuplicateId { node, .. } => {
                Some(node.as_str())
            }
            _ => None,
        }
    }
}
