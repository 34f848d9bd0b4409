//! Conversion settings.
//!
//! Settings come from the command line, optionally layered over a TOML file:
//!
//! ```toml
//! format = "markdown"
//! layout = "outline"
//! replay = "event"
//! document = "journal.md"
//! scaffold = true
//! author-name = "Ada"
//! author-email = "ada@example.com"
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::document::Layout;
use crate::git::Identity;
use crate::markup::Dialect;
use crate::timeline::ReplayMode;

/// Optional settings, as read from a config file or the command line.
///
/// Every field is optional so that layers can be merged; see [`Settings::or`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    pub format: Option<Dialect>,
    pub layout: Option<Layout>,
    pub replay: Option<ReplayMode>,
    /// Output file name inside the output directory
    pub document: Option<String>,
    pub scaffold: Option<bool>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl Settings {
    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            format: self.format.or(fallback.format),
            layout: self.layout.or(fallback.layout),
            replay: self.replay.or(fallback.replay),
            document: self.document.or(fallback.document),
            scaffold: self.scaffold.or(fallback.scaffold),
            author_name: self.author_name.or(fallback.author_name),
            author_email: self.author_email.or(fallback.author_email),
        }
    }
}

/// Everything a conversion run needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// The XML export to read
    pub input: PathBuf,
    /// Directory receiving the document and its history
    pub output: PathBuf,
    pub dialect: Dialect,
    pub layout: Layout,
    pub replay: ReplayMode,
    pub document_name: String,
    /// Write template files and an `init` commit before replaying
    pub scaffold: bool,
    pub identity: Identity,
    /// Stand-in for timestamps the export leaves at zero on top-level nodes
    pub fallback_time: DateTime<Utc>,
}

impl Config {
    /// Defaults for everything but the two paths.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::from_settings(input, output, Settings::default())
    }

    /// Resolve `settings` into a complete config, using the current time as
    /// the fallback timestamp.
    pub fn from_settings(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        settings: Settings,
    ) -> Self {
        let dialect = settings.format.unwrap_or_default();
        Self {
            input: input.into(),
            output: output.into(),
            dialect,
            layout: settings.layout.unwrap_or_default(),
            replay: settings.replay.unwrap_or_default(),
            document_name: settings
                .document
                .unwrap_or_else(|| dialect.default_document_name().to_string()),
            scaffold: settings.scaffold.unwrap_or(false),
            identity: Identity {
                name: settings.author_name,
                email: settings.author_email,
            },
            fallback_time: Utc::now(),
        }
    }

    /// Path of the output document.
    pub fn document_path(&self) -> PathBuf {
        self.output.join(&self.document_name)
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
