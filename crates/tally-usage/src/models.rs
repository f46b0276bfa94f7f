//! Data models for usage aggregation.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::AddAssign;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::entry::UsageRecord;

/// Running token totals for one file, one agent, or a whole session.
///
/// `total_input` and `total_tokens` are computed from the stored counters on
/// every call and are never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub ephemeral_5m_input_tokens: u64,
    pub ephemeral_1h_input_tokens: u64,
    /// Number of usage records folded in
    pub message_count: u64,
}

impl UsageCounters {
    /// Create empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one usage record and count it as one message.
    ///
    /// Every counter saturates at `u64::MAX`.
    pub fn fold(&mut self, usage: &UsageRecord) {
        self.input_tokens = self.input_tokens.saturating_add(usage.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(usage.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(usage.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(usage.cache_read_input_tokens);
        self.ephemeral_5m_input_tokens = self
            .ephemeral_5m_input_tokens
            .saturating_add(usage.ephemeral_5m_input_tokens);
        self.ephemeral_1h_input_tokens = self
            .ephemeral_1h_input_tokens
            .saturating_add(usage.ephemeral_1h_input_tokens);
        self.message_count = self.message_count.saturating_add(1);
    }

    /// Field-wise addition of another set of counters, `message_count` included.
    pub fn merge(&mut self, other: &UsageCounters) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(other.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(other.cache_read_input_tokens);
        self.ephemeral_5m_input_tokens = self
            .ephemeral_5m_input_tokens
            .saturating_add(other.ephemeral_5m_input_tokens);
        self.ephemeral_1h_input_tokens = self
            .ephemeral_1h_input_tokens
            .saturating_add(other.ephemeral_1h_input_tokens);
        self.message_count = self.message_count.saturating_add(other.message_count);
    }

    /// Input tokens including cache creation and cache reads.
    pub fn total_input(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }

    /// Total tokens (input + output).
    pub fn total_tokens(&self) -> u64 {
        self.total_input().saturating_add(self.output_tokens)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign<&UsageCounters> for UsageCounters {
    fn add_assign(&mut self, other: &UsageCounters) {
        self.merge(other);
    }
}

impl<'a> Sum<&'a UsageCounters> for UsageCounters {
    fn sum<I: Iterator<Item = &'a UsageCounters>>(iter: I) -> Self {
        iter.fold(Self::new(), |mut acc, c| {
            acc.merge(c);
            acc
        })
    }
}

impl Serialize for UsageCounters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UsageCounters", 9)?;
        state.serialize_field("input_tokens", &self.input_tokens)?;
        state.serialize_field("output_tokens", &self.output_tokens)?;
        state.serialize_field("cache_creation_input_tokens", &self.cache_creation_input_tokens)?;
        state.serialize_field("cache_read_input_tokens", &self.cache_read_input_tokens)?;
        state.serialize_field("ephemeral_5m_input_tokens", &self.ephemeral_5m_input_tokens)?;
        state.serialize_field("ephemeral_1h_input_tokens", &self.ephemeral_1h_input_tokens)?;
        state.serialize_field("message_count", &self.message_count)?;
        state.serialize_field("total_input", &self.total_input())?;
        state.serialize_field("total_tokens", &self.total_tokens())?;
        state.end()
    }
}

/// Usage for one subagent log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSummary {
    /// Agent identifier (from `agentId`, or the file stem)
    pub agent_id: String,

    /// Human-readable label
    pub slug: Option<String>,

    /// First model seen in the log
    pub model: Option<String>,

    /// Timestamp of the first contributing record
    pub start_time: Option<DateTime<Utc>>,

    /// Timestamp of the last contributing record
    pub end_time: Option<DateTime<Utc>>,

    pub stats: UsageCounters,

    /// File the summary was built from
    pub source: Option<PathBuf>,
}

impl AgentSummary {
    /// Create an empty summary for an agent.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            slug: None,
            model: None,
            start_time: None,
            end_time: None,
            stats: UsageCounters::new(),
            source: None,
        }
    }

    /// Set usage counters.
    pub fn with_stats(mut self, stats: UsageCounters) -> Self {
        self.stats = stats;
        self
    }

    /// Seconds between the first and last contributing record.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

impl Serialize for AgentSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AgentSummary", 7)?;
        state.serialize_field("agent_id", &self.agent_id)?;
        state.serialize_field("slug", &self.slug)?;
        state.serialize_field("model", &self.model)?;
        state.serialize_field("stats", &self.stats)?;
        state.serialize_field("start_time", &self.start_time)?;
        state.serialize_field("end_time", &self.end_time)?;
        state.serialize_field("duration_seconds", &self.duration_seconds())?;
        state.end()
    }
}

/// Usage for a main session log and all of its subagents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    session_id: String,
    main_stats: UsageCounters,
    agents: BTreeMap<String, AgentSummary>,
}

impl SessionSummary {
    /// Create a summary with empty main counters and no agents.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            main_stats: UsageCounters::new(),
            agents: BTreeMap::new(),
        }
    }

    /// Set the main session counters.
    pub fn with_main_stats(mut self, stats: UsageCounters) -> Self {
        self.main_stats = stats;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn main_stats(&self) -> &UsageCounters {
        &self.main_stats
    }

    /// Agents keyed by agent id, in id order.
    pub fn agents(&self) -> &BTreeMap<String, AgentSummary> {
        &self.agents
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentSummary> {
        self.agents.get(agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Insert an agent, returning the summary it replaced if the id was taken.
    pub fn insert_agent(&mut self, agent: AgentSummary) -> Option<AgentSummary> {
        self.agents.insert(agent.agent_id.clone(), agent)
    }

    /// Main counters merged with every agent's counters.
    ///
    /// Recomputed on each call so agents inserted later are always included.
    pub fn total_stats(&self) -> UsageCounters {
        std::iter::once(&self.main_stats)
            .chain(self.agents.values().map(|a| &a.stats))
            .sum()
    }
}

impl Serialize for SessionSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SessionSummary", 5)?;
        state.serialize_field("session_id", &self.session_id)?;
        state.serialize_field("main_stats", &self.main_stats)?;
        state.serialize_field("agents", &self.agents)?;
        state.serialize_field("total_stats", &self.total_stats())?;
        state.serialize_field("agent_count", &self.agent_count())?;
        state.end()
    }
}
