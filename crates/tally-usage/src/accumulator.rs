//! Folding log entries into usage counters.
//!
//! Two accounting rules exist for session logs. A single API request is
//! often logged several times (streamed content blocks, retries), each copy
//! carrying the same usage, so [`DedupPolicy::PerRequest`] counts each
//! `requestId` once. [`DedupPolicy::Unconditional`] folds every usage-bearing
//! entry. Both are built on [`UsageCounters::fold`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::Result;
use tracing::{debug, trace};

use crate::entry::LogEntry;
use crate::models::UsageCounters;
use crate::reader::LogReader;

/// How repeated usage observations within one file are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Fold the first usage seen for each distinct `requestId`; entries without
    /// a request id are ignored.
    #[default]
    PerRequest,
    /// Fold every entry that carries usage.
    Unconditional,
}

impl DedupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerRequest => "per-request",
            Self::Unconditional => "unconditional",
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per-request" | "per_request" | "request" => Ok(Self::PerRequest),
            "unconditional" | "all" | "none" => Ok(Self::Unconditional),
            other => Err(format!(
                "unknown dedup policy '{other}' (expected 'per-request' or 'unconditional')"
            )),
        }
    }
}

/// What happened to one entry offered to an [`Accumulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Usage was folded into the counters
    Folded,
    /// Usage was dropped because its request id was already counted
    Duplicate,
    /// Entry carries nothing countable under the policy
    Skipped,
}

/// Counters plus the bookkeeping a dedup policy needs.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    policy: DedupPolicy,
    counters: UsageCounters,
    seen_requests: HashSet<String>,
    duplicates: u64,
    skipped: u64,
}

impl Accumulator {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Offer one entry to the accumulator.
    pub fn observe(&mut self, entry: &LogEntry) -> Observation {
        let Some(usage) = entry.usage() else {
            self.skipped += 1;
            return Observation::Skipped;
        };

        match self.policy {
            DedupPolicy::Unconditional => {
                self.counters.fold(usage);
                Observation::Folded
            }
            DedupPolicy::PerRequest => {
                let Some(request_id) = entry.request_id() else {
                    self.skipped += 1;
                    return Observation::Skipped;
                };

                if self.seen_requests.contains(request_id) {
                    self.duplicates += 1;
                    trace!(request_id, "Duplicate request id, skipping usage");
                    return Observation::Duplicate;
                }

                self.seen_requests.insert(request_id.to_string());
                self.counters.fold(usage);
                trace!(request_id, "New request id, folded usage");
                Observation::Folded
            }
        }
    }

    pub fn counters(&self) -> &UsageCounters {
        &self.counters
    }

    /// Usage observations dropped as repeats of a counted request.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Entries that carried nothing countable.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_counters(self) -> UsageCounters {
        self.counters
    }
}

/// Result of running one log file through an [`Accumulator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub stats: UsageCounters,

    /// First `agentId` seen in the file
    pub agent_id: Option<String>,

    /// First `slug` seen in the file
    pub slug: Option<String>,

    /// First `message.model` seen in the file
    pub model: Option<String>,

    /// Timestamp of the first folded entry
    pub start_time: Option<DateTime<Utc>>,

    /// Timestamp of the last folded entry
    pub end_time: Option<DateTime<Utc>>,

    /// Entries read (malformed lines excluded)
    pub entries: u64,
    pub duplicates: u64,
    pub malformed_lines: u64,
}

impl FileAnalysis {
    /// File name without extension, used as a fallback identifier.
    pub fn file_stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// Read a log file to completion and fold it under `policy`.
///
/// Only opening the file can fail; bad lines are skipped by the reader.
pub fn analyze_file<P: AsRef<Path>>(path: P, policy: DedupPolicy) -> Result<FileAnalysis> {
    let path = path.as_ref();
    let mut reader = LogReader::open(path)?;
    let mut accumulator = Accumulator::new(policy);
    let mut analysis = FileAnalysis {
        path: path.to_path_buf(),
        ..Default::default()
    };

    for entry in reader.by_ref() {
        analysis.entries += 1;

        if analysis.agent_id.is_none() {
            analysis.agent_id = entry.agent_id().map(str::to_string);
        }
        if analysis.slug.is_none() {
            analysis.slug = entry.slug().map(str::to_string);
        }
        if analysis.model.is_none() {
            analysis.model = entry.model().map(str::to_string);
        }

        if accumulator.observe(&entry) == Observation::Folded
            && let Some(ts) = entry.timestamp()
        {
            analysis.start_time.get_or_insert(ts);
            analysis.end_time = Some(ts);
        }
    }

    analysis.malformed_lines = reader.malformed_lines() as u64;
    analysis.duplicates = accumulator.duplicates();
    analysis.stats = accumulator.into_counters();

    debug!(
        file = %path.display(),
        %policy,
        entries = analysis.entries,
        messages = analysis.stats.message_count,
        duplicates = analysis.duplicates,
        malformed = analysis.malformed_lines,
        "Analyzed log file"
    );

    Ok(analysis)
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
