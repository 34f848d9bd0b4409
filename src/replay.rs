//! Replay a note tree as a series of dated commits.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::document::Document;
use crate::git::{self, Git};
use crate::timeline::{self, Entry, Reveal};
use crate::tree::{NoteTree, ParseError};

/// Files written by a scaffolded run before the first note.
const TEMPLATE_FILES: &[(&str, &str)] = &[(".gitattributes", "* text=auto\n"), (".gitignore", ".#*\n")];

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Nodes in the export
    pub nodes: usize,
    /// Commits created, including the scaffold commit
    pub commits: usize,
    pub document: PathBuf,
}

/// Convert the export at `config.input` into a dated history in
/// `config.output`.
///
/// The export is parsed completely before the output directory is touched.
/// Any later failure aborts the run; commits already made stay in place.
pub fn convert(config: &Config) -> Result<Summary, Error> {
    let content = std::fs::read_to_string(&config.input).map_err(|e| Error::ReadInput {
        path: config.input.display().to_string(),
        source: e,
    })?;
    let tree = NoteTree::parse(&content, config.fallback_time).map_err(|e| Error::Parse {
        path: config.input.display().to_string(),
        source: e,
    })?;
    info!(nodes = tree.len(), input = %config.input.display(), "parsed note tree");

    let entries = timeline::build(&tree, config.replay);
    if entries.is_empty() {
        warn!("export contains no notes");
    }

    let git = prepare_output(config)?;
    let document_path = config.document_path();
    let mut commits = 0;

    if config.scaffold {
        let at = entries.first().map_or(config.fallback_time, |e| e.authored.min(e.committed));
        scaffold(&git, config, at)?;
        commits += 1;
    }

    let mut document = Document::new(config.layout, config.dialect);
    for (i, entry) in entries.iter().enumerate() {
        let hash = replay_entry(&git, config, &tree, entry, &mut document)?;
        commits += 1;
        debug!(
            "[{}/{}] {} {}",
            i + 1,
            entries.len(),
            hash,
            tree.node(entry.node).title
        );
    }

    info!(commits, document = %document_path.display(), "replay complete");
    Ok(Summary {
        nodes: tree.len(),
        commits,
        document: document_path,
    })
}

/// Create the output directory if needed and make it a repository.
fn prepare_output(config: &Config) -> Result<Git, Error> {
    std::fs::create_dir_all(&config.output).map_err(|e| Error::CreateOutput {
        path: config.output.display().to_string(),
        source: e,
    })?;

    let git = Git::open_or_init(&config.output).map_err(|e| Error::Repository {
        path: config.output.display().to_string(),
        source: e,
    })?;
    Ok(git.with_identity(config.identity.clone()))
}

/// Write the template files and an empty document as the `init` commit.
fn scaffold(git: &Git, config: &Config, at: DateTime<Utc>) -> Result<(), Error> {
    let mut paths = Vec::with_capacity(TEMPLATE_FILES.len() + 1);
    for (name, content) in TEMPLATE_FILES {
        write_file(&git.root().join(name), content)?;
        paths.push(*name);
    }
    write_file(&config.document_path(), "")?;
    paths.push(config.document_name.as_str());

    let commit_err = |e| Error::Commit {
        node: "init".to_string(),
        source: e,
    };
    git.add(&paths).map_err(commit_err)?;
    let hash = git.commit_at("init", at, at).map_err(commit_err)?;
    debug!(%hash, "scaffold committed");
    Ok(())
}

/// Apply one timeline entry to the document and commit it.
fn replay_entry(
    git: &Git,
    config: &Config,
    tree: &NoteTree,
    entry: &Entry,
    document: &mut Document,
) -> Result<String, Error> {
    let node = tree.node(entry.node);
    let with_body = entry.reveal != Reveal::Heading;
    if !document.reveal(entry.node, node, with_body) {
        debug!(node = %node.id, "entry leaves the document unchanged");
    }
    write_file(&config.document_path(), &document.render())?;

    let message = commit_message(&node.id, &node.title, entry.reveal);
    let commit_err = |e| Error::Commit {
        node: node.id.clone(),
        source: e,
    };
    git.add(&[config.document_name.as_str()]).map_err(commit_err)?;
    git.commit_at(&message, entry.authored, entry.committed)
        .map_err(commit_err)
}

fn commit_message(id: &str, title: &str, reveal: Reveal) -> String {
    let title = title.trim();
    let name = if title.is_empty() {
        format!("node {id}")
    } else {
        title.to_string()
    };
    match reveal {
        Reveal::Heading => format!("section: {name}"),
        Reveal::Body | Reveal::Complete => name,
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), Error> {
    std::fs::write(path, content).map_err(|e| Error::WriteDocument {
        path: path.display().to_string(),
        source: e,
    })
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that abort a conversion run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read input file '{path}'")]
    ReadInput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}'")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to create output directory '{path}'")]
    CreateOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}'")]
    WriteDocument {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up repository in '{path}'")]
    Repository {
        path: String,
        #[source]
        source: git::Error,
    },

    #[error("failed to commit node {node}")]
    Commit {
        node: String,
        #[source]
        source: git::Error,
    },
}
