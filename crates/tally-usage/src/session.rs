//! Composing file-level results into session summaries.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tally_usage::{DedupPolicy, RateTable, SessionAnalyzer, estimate_cost};
//!
//! fn main() -> tally_core::Result<()> {
//!     let analyzer = SessionAnalyzer::new(DedupPolicy::PerRequest);
//!     let session = analyzer.analyze_session(Path::new(
//!         "/home/me/.claude/projects/demo/be18c6d0-46c0-4530-bde9-f535ad152abe.jsonl",
//!     ))?;
//!
//!     let cost = estimate_cost(&session.total_stats(), &RateTable::default());
//!     println!("{}: {} agents, ${:.4}", session.session_id(), session.agent_count(), cost.total_cost);
//!     Ok(())
//! }
//! ```

use std::path::Path;

use tally_core::{Result, TallyError};
use tracing::{debug, info, warn};

use crate::accumulator::{DedupPolicy, FileAnalysis, analyze_file};
use crate::discovery::{find_session_files, find_subagent_files};
use crate::models::{AgentSummary, SessionSummary};

/// Builds [`SessionSummary`] values from a main log and its subagent logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAnalyzer {
    policy: DedupPolicy,
    include_subagents: bool,
}

impl Default for SessionAnalyzer {
    fn default() -> Self {
        Self::new(DedupPolicy::default())
    }
}

impl SessionAnalyzer {
    /// Create an analyzer that includes subagents.
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            include_subagents: true,
        }
    }

    /// Set whether subagent logs are discovered and analyzed.
    pub fn with_subagents(mut self, include: bool) -> Self {
        self.include_subagents = include;
        self
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    pub fn includes_subagents(&self) -> bool {
        self.include_subagents
    }

    /// Analyze one session.
    ///
    /// Fails only when the main log cannot be read; subagent logs that cannot
    /// be read are skipped with a warning.
    pub fn analyze_session(&self, session_path: &Path) -> Result<SessionSummary> {
        if session_path.exists() && !session_path.is_file() {
            return Err(TallyError::NotAFile {
                path: session_path.to_path_buf(),
            });
        }

        let main = analyze_file(session_path, self.policy)?;
        let mut session = SessionSummary::new(main.file_stem()).with_main_stats(main.stats);

        if self.include_subagents {
            for agent_file in find_subagent_files(session_path) {
                match analyze_file(&agent_file, self.policy) {
                    Ok(analysis) => add_agent(&mut session, agent_summary(analysis)),
                    Err(e) => {
                        warn!(
                            file = %agent_file.display(),
                            error = %e,
                            "Skipping unreadable subagent log"
                        );
                    }
                }
            }
        }

        info!(
            session = session.session_id(),
            agents = session.agent_count(),
            messages = session.total_stats().message_count,
            "Analyzed session"
        );

        Ok(session)
    }

    /// Analyze every `<uuid>.jsonl` session directly inside `dir`.
    ///
    /// Sessions that fail are skipped with a warning. Finding none at all is
    /// an error.
    pub fn analyze_directory(&self, dir: &Path) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();

        for path in find_session_files(dir)? {
            match self.analyze_session(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to analyze session"),
            }
        }

        if sessions.is_empty() {
            return Err(TallyError::NoSessionsFound {
                path: dir.to_path_buf(),
            });
        }

        debug!(dir = %dir.display(), count = sessions.len(), "Analyzed session directory");
        Ok(sessions)
    }
}

/// Turn a subagent file analysis into an agent summary.
///
/// Falls back to the file stem when the log never states an `agentId`.
pub fn agent_summary(analysis: FileAnalysis) -> AgentSummary {
    let agent_id = analysis
        .agent_id
        .clone()
        .unwrap_or_else(|| analysis.file_stem());

    AgentSummary {
        agent_id,
        slug: analysis.slug,
        model: analysis.model,
        start_time: analysis.start_time,
        end_time: analysis.end_time,
        stats: analysis.stats,
        source: Some(analysis.path),
    }
}

/// Insert an agent; the later file wins when two resolve to the same id.
fn add_agent(session: &mut SessionSummary, agent: AgentSummary) {
    let agent_id = agent.agent_id.clone();
    let kept = agent.source.clone();

    if let Some(replaced) = session.insert_agent(agent) {
        warn!(
            session = session.session_id(),
            agent_id = %agent_id,
            replaced = ?replaced.source,
            kept = ?kept,
            lost_messages = replaced.stats.message_count,
            "Two subagent logs share an agent id; keeping the later one"
        );
    }
}
