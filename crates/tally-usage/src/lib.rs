//! # tally-usage
//!
//! Token usage aggregation for AI coding-assistant session logs.
//!
//! Data flows one way:
//!
//! [`LogReader`] → [`LogEntry`] → [`Accumulator`] (per file) →
//! [`SessionAnalyzer`] (per session) → [`estimate_cost`] (on the total)
//!
//! This crate provides:
//! - [`LogReader`] - Lazy JSON lines reader that skips malformed lines
//! - [`LogEntry`] - Typed view of one record with usage and correlation ids
//! - [`Accumulator`] - Folds usage into [`UsageCounters`] under a [`DedupPolicy`]
//! - [`SessionAnalyzer`] - Main log plus subagent logs into a [`SessionSummary`]
//! - [`estimate_cost`] - Cost from counters and a [`RateTable`]
//!
//! ## Example
//!
//! ```no_run
//! use tally_usage::{BaseDirLocator, TallyConfig, resolve_session, report};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = TallyConfig::load(None, dirs::home_dir())?;
//!     let locator = BaseDirLocator::new("/home/me/.claude/projects/demo");
//!     let path = resolve_session("be18c6d0-46c0-4530-bde9-f535ad152abe", &locator)?;
//!
//!     let session = config.analyzer().analyze_session(&path)?;
//!     report::write_session_report(&mut std::io::stdout(), &session, &config.report_pricing(), false)?;
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod config;
pub mod cost;
pub mod discovery;
pub mod entry;
pub mod locator;
pub mod models;
pub mod reader;
pub mod report;
pub mod session;

// Re-export main types
pub use accumulator::{Accumulator, DedupPolicy, FileAnalysis, Observation, analyze_file};
pub use config::TallyConfig;
pub use cost::{CostEstimate, PricingTier, RateTable, estimate_cost};
pub use discovery::{find_session_files, find_subagent_files};
pub use entry::{LogEntry, UsageRecord};
pub use locator::{BaseDirLocator, ProjectsLocator, SessionLocator, resolve_session};
pub use models::{AgentSummary, SessionSummary, UsageCounters};
pub use reader::LogReader;
pub use session::SessionAnalyzer;
