//! The flattened output document.
//!
//! A [`Document`] is the accumulator threaded through replay: each replayed
//! entry reveals a node (its heading, and possibly its body), and the whole
//! text is re-rendered before every commit.

use serde::Deserialize;

use crate::markup::{self, Dialect};
use crate::tree::Node;

/// Order of sections in the rendered document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Sections in the order they were revealed
    #[default]
    Chronological,
    /// Sections in tree order, showing only what has been revealed so far
    Outline,
}

#[derive(Debug)]
struct Section {
    node: usize,
    heading: String,
    body: String,
    show_body: bool,
}

/// Growing output document.
#[derive(Debug)]
pub struct Document {
    layout: Layout,
    dialect: Dialect,
    sections: Vec<Section>,
}

impl Document {
    pub fn new(layout: Layout, dialect: Dialect) -> Self {
        Self {
            layout,
            dialect,
            sections: Vec::new(),
        }
    }

    /// Make node `index` visible, optionally with its body.
    ///
    /// Revealing a node twice never duplicates its heading; a body once shown
    /// stays shown. Returns whether the rendered text changed.
    pub fn reveal(&mut self, index: usize, node: &Node, with_body: bool) -> bool {
        if let Some(section) = self.sections.iter_mut().find(|s| s.node == index) {
            let changed = with_body && !section.show_body && !section.body.is_empty();
            section.show_body |= with_body;
            return changed;
        }

        let section = Section {
            node: index,
            heading: self.dialect.heading(node.depth, &node.title),
            body: markup::render_body(&node.body, self.dialect),
            show_body: with_body,
        };
        match self.layout {
            Layout::Chronological => self.sections.push(section),
            Layout::Outline => {
                let at = self.sections.partition_point(|s| s.node < index);
                self.sections.insert(at, section);
            }
        }
        true
    }

    /// Number of revealed nodes.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Full text of the document, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&section.heading);
            out.push('\n');
            if section.show_body && !section.body.is_empty() {
                out.push_str(&section.body);
                out.push('\n');
            }
        }
        out
    }
}

/// Heading levels of a rendered document, top to bottom.
pub fn heading_levels(text: &str, dialect: Dialect) -> Vec<usize> {
    text.lines()
        .filter_map(|line| dialect.heading_level(line))
        .collect()
}
