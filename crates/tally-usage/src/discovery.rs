//! Locating the files that make up a session.
//!
//! # Layout
//!
//! ```text
//! <project>/
//!   be18c6d0-46c0-4530-bde9-f535ad152abe.jsonl        main session log
//!   be18c6d0-46c0-4530-bde9-f535ad152abe/subagents/   subagent logs (any *.jsonl)
//!   agent-3f2a.jsonl                                   older layout: sibling subagent log,
//!                                                      linked by its first record's sessionId
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tally_core::{Result, TallyError};
use tracing::{debug, warn};

use crate::accumulator::file_stem;
use crate::reader::read_first_entry;

const LOG_EXTENSION: &str = "jsonl";
const SUBAGENTS_DIR: &str = "subagents";
const AGENT_FILE_PREFIX: &str = "agent-";

/// Find every subagent log belonging to the session at `session_path`.
///
/// Candidates that cannot be read are skipped. A file reachable through both
/// layouts appears once. The result is sorted by path.
pub fn find_subagent_files(session_path: &Path) -> Vec<PathBuf> {
    let session_id = file_stem(session_path);
    let parent = session_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut candidates = list_logs(&parent.join(&session_id).join(SUBAGENTS_DIR), None);

    for agent_file in list_logs(parent, Some(AGENT_FILE_PREFIX)) {
        match read_first_entry(&agent_file) {
            Ok(Some(first)) if first.session_id() == Some(session_id.as_str()) => {
                candidates.push(agent_file);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(file = %agent_file.display(), error = %e, "Skipping unreadable agent log");
            }
        }
    }

    let files = dedup_paths(candidates);
    debug!(session = %session_id, count = files.len(), "Discovered subagent logs");
    files
}

/// Find main session logs (`<uuid>.jsonl`) directly inside `dir`.
pub fn find_session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| TallyError::io("reading session directory", dir, e))?;

    let mut sessions: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_session_file_name)
        })
        .collect();

    sessions.sort();
    debug!(dir = %dir.display(), count = sessions.len(), "Found session logs");
    Ok(sessions)
}

/// True for names of the form `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx.jsonl`
/// with lowercase hex digits.
pub fn is_session_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".jsonl") else {
        return false;
    };

    let groups: Vec<&str> = stem.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| {
                group.len() == len
                    && group
                        .bytes()
                        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            })
}

/// List `*.jsonl` files in `dir`, optionally restricted to a name prefix.
///
/// A missing or unreadable directory yields nothing.
fn list_logs(dir: &Path, prefix: Option<&str>) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to list directory");
            }
            return Vec::new();
        }
    };

    let mut logs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) || !path.is_file() {
            continue;
        }

        let matches_prefix = match prefix {
            Some(prefix) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix)),
            None => true,
        };

        if matches_prefix {
            logs.push(path);
        }
    }

    logs
}

/// Drop paths that resolve to a file already seen, then sort.
fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut unique: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| {
            let key = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            seen.insert(key)
        })
        .collect();

    unique.sort();
    unique
}
