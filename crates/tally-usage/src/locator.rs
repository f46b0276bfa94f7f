//! Resolving a session id to its main log file.
//!
//! Lookup is a strategy passed in by the caller, so the aggregation code
//! never reads the home directory on its own. Any `Fn(&str) -> Option<PathBuf>`
//! is a locator.

use std::fs;
use std::path::{Path, PathBuf};

use tally_core::{Result, TallyError};
use tracing::debug;

/// Maps a session id to the path of its main log, if one exists.
pub trait SessionLocator {
    fn locate(&self, session_id: &str) -> Option<PathBuf>;
}

impl<F> SessionLocator for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn locate(&self, session_id: &str) -> Option<PathBuf> {
        self(session_id)
    }
}

/// Looks for `<base_dir>/<session_id>.jsonl`.
#[derive(Debug, Clone)]
pub struct BaseDirLocator {
    base_dir: PathBuf,
}

impl BaseDirLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl SessionLocator for BaseDirLocator {
    fn locate(&self, session_id: &str) -> Option<PathBuf> {
        let candidate = session_log_path(&self.base_dir, session_id);
        candidate.is_file().then_some(candidate)
    }
}

/// Searches every project directory under a projects root
/// (`~/.claude/projects` by default) and returns the first match.
#[derive(Debug, Clone)]
pub struct ProjectsLocator {
    projects_dir: Option<PathBuf>,
}

impl ProjectsLocator {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: Some(projects_dir.into()),
        }
    }

    /// Locator rooted at `~/.claude/projects`; finds nothing without a home directory.
    pub fn from_home(home: Option<PathBuf>) -> Self {
        Self {
            projects_dir: home.map(|h| h.join(".claude").join("projects")),
        }
    }

    pub fn projects_dir(&self) -> Option<&Path> {
        self.projects_dir.as_deref()
    }
}

impl SessionLocator for ProjectsLocator {
    fn locate(&self, session_id: &str) -> Option<PathBuf> {
        let root = self.projects_dir.as_ref()?;
        let mut projects: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        projects.sort();

        let found = projects
            .iter()
            .map(|project| session_log_path(project, session_id))
            .find(|candidate| candidate.is_file());

        debug!(root = %root.display(), session_id, found = found.is_some(), "Searched projects");
        found
    }
}

/// Resolve a command-line session argument.
///
/// An argument naming an existing path is used as-is; anything else is
/// treated as a session id and handed to `locator`.
pub fn resolve_session(arg: &str, locator: &dyn SessionLocator) -> Result<PathBuf> {
    let path = Path::new(arg);
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    locator
        .locate(arg)
        .ok_or_else(|| TallyError::session_not_found(arg))
}

fn session_log_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.jsonl"))
}
