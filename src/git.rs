//! Git repository operations.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};

/// Name and email recorded on commits.
///
/// Unset fields fall back to git's own configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A git repository handle that provides common operations.
pub struct Git {
    root: PathBuf,
    identity: Identity,
}

/// One line of `git log`, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub authored: DateTime<Utc>,
    pub committed: DateTime<Utc>,
    pub subject: String,
}

impl Git {
    /// Find the git repository root starting from the given directory.
    pub fn discover(start_dir: &Path) -> Result<Self, Error> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(start_dir)
            .output()
            .map_err(|e| Error::Exec(format!("git rev-parse: {e}")))?;

        if !output.status.success() {
            return Err(Error::NotARepo(start_dir.display().to_string()));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(root),
            identity: Identity::default(),
        })
    }

    /// Create (or reinitialize) a repository in `dir`.
    pub fn init(dir: &Path) -> Result<Self, Error> {
        let git = Self {
            root: dir.to_path_buf(),
            identity: Identity::default(),
        };
        git.run(&["init", "--quiet"])?;
        Ok(git)
    }

    /// Open `dir` if it is the top of a work tree, initializing it otherwise.
    ///
    /// A directory nested inside some other repository gets its own.
    pub fn open_or_init(dir: &Path) -> Result<Self, Error> {
        if let Ok(git) = Self::discover(dir) {
            if same_dir(git.root(), dir) {
                return Ok(git);
            }
        }
        Self::init(dir)
    }

    /// Record commits under `identity`.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Get the repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage the given paths, relative to the root.
    pub fn add(&self, paths: &[&str]) -> Result<(), Error> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(&args)
    }

    /// Whether the index differs from HEAD (or holds anything, before the
    /// first commit).
    pub fn has_staged_changes(&self) -> Result<bool, Error> {
        let output = self.command(&["diff", "--cached", "--quiet"]).output().map_err(|e| {
            Error::Exec(format!("git diff: {e}"))
        })?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Error::Failed(format!(
                "git diff --cached: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    /// Commit the index with explicit author and committer dates, returning
    /// the short hash.
    pub fn commit_at(
        &self,
        message: &str,
        authored: DateTime<Utc>,
        committed: DateTime<Utc>,
    ) -> Result<String, Error> {
        if !self.has_staged_changes()? {
            return Err(Error::NothingToCommit);
        }

        let mut command = self.command(&[
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "--no-verify",
            "-m",
            message,
        ]);
        command
            .env("GIT_AUTHOR_DATE", git_date(authored))
            .env("GIT_COMMITTER_DATE", git_date(committed));
        if let Some(name) = &self.identity.name {
            command.env("GIT_AUTHOR_NAME", name).env("GIT_COMMITTER_NAME", name);
        }
        if let Some(email) = &self.identity.email {
            command.env("GIT_AUTHOR_EMAIL", email).env("GIT_COMMITTER_EMAIL", email);
        }

        let output = command
            .output()
            .map_err(|e| Error::Exec(format!("git commit: {e}")))?;
        if !output.status.success() {
            return Err(Error::Failed(format!(
                "git commit: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        self.head_short()
    }

    /// Get the short hash of HEAD.
    pub fn head_short(&self) -> Result<String, Error> {
        let hash = self.run_output(&["rev-parse", "HEAD"])?;
        let hash = hash.trim();
        Ok(hash[..8.min(hash.len())].to_string())
    }

    /// History of the current branch, oldest first.
    pub fn log(&self) -> Result<Vec<LogEntry>, Error> {
        let output = self.run_output(&["log", "--reverse", "--format=%at%x09%ct%x09%s"])?;
        output
            .lines()
            .map(|line| {
                let mut fields = line.splitn(3, '\t');
                let authored = parse_epoch(fields.next());
                let committed = parse_epoch(fields.next());
                match (authored, committed, fields.next()) {
                    (Some(authored), Some(committed), Some(subject)) => Ok(LogEntry {
                        authored,
                        committed,
                        subject: subject.to_string(),
                    }),
                    _ => Err(Error::Failed(format!("unexpected git log line '{line}'"))),
                }
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command.args(args).current_dir(&self.root);
        command
    }

    /// Run a git command that produces no output we care about.
    fn run(&self, args: &[&str]) -> Result<(), Error> {
        self.run_output(args).map(drop)
    }

    /// Run a git command and capture its stdout.
    fn run_output(&self, args: &[&str]) -> Result<String, Error> {
        let output = self
            .command(args)
            .output()
            .map_err(|e| Error::Exec(format!("git {}: {e}", args.first().unwrap_or(&""))))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::Failed(format!(
                "git {}: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Git's raw date format: seconds since the epoch plus a UTC offset.
fn git_date(at: DateTime<Utc>) -> String {
    format!("@{} +0000", at.timestamp())
}

fn parse_epoch(field: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(field?.parse().ok()?, 0)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Errors from git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute: {0}")]
    Exec(String),

    #[error("not a git repository (searched from '{0}')")]
    NotARepo(String),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_use_raw_epoch_format() {
        let at = DateTime::from_timestamp(1_500_000_000, 750_000_000).unwrap();
        assert_eq!(git_date(at), "@1500000000 +0000");
    }

    #[test]
    fn parses_log_epochs() {
        assert_eq!(
            parse_epoch(Some("1500000000")),
            DateTime::from_timestamp(1_500_000_000, 0)
        );
        assert_eq!(parse_epoch(Some("soon")), None);
        assert_eq!(parse_epoch(None), None);
    }
}
