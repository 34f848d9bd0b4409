//! Treeplay: flatten a hierarchical note export into one outline document
//! whose git history replays when each note was written.
//!
//! Every note of a CherryTree-style XML export becomes a section of a single
//! Org or Markdown file, headed at its depth in the tree. Sections are
//! committed one by one in the order the notes were last modified, with the
//! commit dates set to the notes' own timestamps.
//!
//! # Architecture
//!
//! - **Tree**: Parse the XML export into nodes
//! - **Markup**: Convert rich-text runs into the output dialect
//! - **Timeline**: Order nodes (or their creation/modification events) for replay
//! - **Document**: Accumulate and render the flattened document
//! - **Replay**: Write the document and commit it, entry by entry
//! - **Git**: Drive the `git` command line

pub mod config;
pub mod document;
pub mod git;
pub mod markup;
pub mod replay;
pub mod timeline;
pub mod tree;

pub use config::{Config, Settings};
pub use document::{Document, Layout, heading_levels};
pub use markup::Dialect;
pub use replay::{Error, Summary, convert};
pub use timeline::ReplayMode;
pub use tree::{Node, NoteTree, ParseError};
