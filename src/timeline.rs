//! Chronological replay order.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::tree::NoteTree;

/// How nodes are turned into commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// One commit per node at its modification time
    #[default]
    Node,
    /// A commit when a node's heading appears (creation) and another when its
    /// body is filled in (modification)
    Event,
}

/// What a replayed entry reveals of its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// The heading only
    Heading,
    /// The body of a node whose heading is already present
    Body,
    /// Heading and body at once
    Complete,
}

/// One future commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Index into the tree's nodes
    pub node: usize,
    pub reveal: Reveal,
    /// Author date of the commit
    pub authored: DateTime<Utc>,
    /// Committer date of the commit; the timeline is sorted by it
    pub committed: DateTime<Utc>,
}

/// Build the replay order for `tree`.
///
/// The sort is stable: entries with equal timestamps keep document order, and
/// a node's heading precedes its body.
pub fn build(tree: &NoteTree, mode: ReplayMode) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(tree.len());
    for (index, node) in tree.nodes().iter().enumerate() {
        match mode {
            ReplayMode::Node => entries.push(Entry {
                node: index,
                reveal: Reveal::Complete,
                authored: node.created,
                committed: node.modified,
            }),
            ReplayMode::Event if !node.has_body() || node.modified <= node.created => {
                entries.push(Entry {
                    node: index,
                    reveal: Reveal::Complete,
                    authored: node.created,
                    committed: node.created,
                })
            }
            ReplayMode::Event => {
                entries.push(Entry {
                    node: index,
                    reveal: Reveal::Heading,
                    authored: node.created,
                    committed: node.created,
                });
                entries.push(Entry {
                    node: index,
                    reveal: Reveal::Body,
                    authored: node.modified,
                    committed: node.modified,
                });
            }
        }
    }

    entries.sort_by_key(|entry| entry.committed);
    merge_consecutive(entries)
}

/// Fold a node's heading entry into its body entry when nothing happened in
/// between.
fn merge_consecutive(entries: Vec<Entry>) -> Vec<Entry> {
    let mut merged: Vec<Entry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match merged.last_mut() {
            Some(last) if last.node == entry.node && last.reveal == Reveal::Heading => {
                last.reveal = Reveal::Complete;
                last.authored = entry.authored;
                last.committed = entry.committed;
            }
            _ => merged.push(entry),
        }
    }
    merged
}
