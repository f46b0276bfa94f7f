//! Text and JSON renderings of session summaries.

use std::io::{self, Write};

use tally_core::{Result, TallyError};

use crate::cost::{RateTable, estimate_cost};
use crate::models::{SessionSummary, UsageCounters};

const WIDE_RULE: usize = 60;
const BATCH_RULE: usize = 84;

/// Rates and the label shown next to cost estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    pub rates: RateTable,
    pub label: String,
}

impl Pricing {
    pub fn new(rates: RateTable, label: impl Into<String>) -> Self {
        Self {
            rates,
            label: label.into(),
        }
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self::new(RateTable::default(), "opus")
    }
}

/// Format a count with `,` thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Write the counter block used in every report.
pub fn write_stats<W: Write>(w: &mut W, stats: &UsageCounters, indent: &str) -> io::Result<()> {
    let rows = [
        ("Input Tokens:", stats.input_tokens),
        ("Output Tokens:", stats.output_tokens),
        ("Cache Creation:", stats.cache_creation_input_tokens),
        ("Cache Read:", stats.cache_read_input_tokens),
        ("Ephemeral 5m:", stats.ephemeral_5m_input_tokens),
        ("Ephemeral 1h:", stats.ephemeral_1h_input_tokens),
    ];
    for (label, value) in rows {
        writeln!(w, "{indent}{label:<21}{}", format_number(value))?;
    }
    writeln!(w, "{indent}-----------------------------")?;
    writeln!(w, "{indent}{:<21}{}", "Total Input:", format_number(stats.total_input()))?;
    writeln!(w, "{indent}{:<21}{}", "Total Tokens:", format_number(stats.total_tokens()))?;
    writeln!(w, "{indent}{:<21}{}", "Messages:", format_number(stats.message_count))
}

/// Write the cost breakdown for `stats`.
pub fn write_cost<W: Write>(
    w: &mut W,
    title: &str,
    stats: &UsageCounters,
    pricing: &Pricing,
) -> io::Result<()> {
    let cost = estimate_cost(stats, &pricing.rates);

    writeln!(w, "[{title}] ({} pricing)", pricing.label)?;
    writeln!(w, "Base input:    ${:.4}", cost.base_input_cost)?;
    writeln!(w, "Cache write:   ${:.4}", cost.cache_write_cost)?;
    writeln!(w, "Cache read:    ${:.4}", cost.cache_read_cost)?;
    writeln!(w, "Output:        ${:.4}", cost.output_cost)?;
    writeln!(w, "-----------------------------")?;
    writeln!(w, "TOTAL:         ${:.4}", cost.total_cost)
}

/// Write the report for one session.
///
/// Subagents are listed as a table, or as full blocks when `verbose` is set.
pub fn write_session_report<W: Write>(
    w: &mut W,
    session: &SessionSummary,
    pricing: &Pricing,
    verbose: bool,
) -> io::Result<()> {
    let rule = "=".repeat(WIDE_RULE);

    writeln!(w, "{rule}")?;
    writeln!(w, "SESSION USAGE REPORT: {}", session.session_id())?;
    writeln!(w, "{rule}")?;

    writeln!(w, "\n[MAIN SESSION]")?;
    write_stats(w, session.main_stats(), "")?;

    if session.agent_count() > 0 {
        writeln!(w, "\n[SUBAGENTS] ({} agents)", session.agent_count())?;
        writeln!(w, "{}", "-".repeat(40))?;

        if verbose {
            for (agent_id, agent) in session.agents() {
                writeln!(w, "\n  Agent: {agent_id}")?;
                if let Some(slug) = &agent.slug {
                    writeln!(w, "  Slug: {slug}")?;
                }
                if let Some(model) = &agent.model {
                    writeln!(w, "  Model: {model}")?;
                }
                if let Some(secs) = agent.duration_seconds() {
                    writeln!(w, "  Duration: {secs:.1}s")?;
                }
                write_stats(w, &agent.stats, "    ")?;
            }
        } else {
            writeln!(
                w,
                "{:<20} {:>10} {:>12} {:>12} {:>12}",
                "Agent ID", "Messages", "Input", "Output", "Total"
            )?;
            writeln!(w, "{}", "-".repeat(66))?;
            for (agent_id, agent) in session.agents() {
                writeln!(
                    w,
                    "{:<20} {:>10} {:>12} {:>12} {:>12}",
                    truncate(agent_id, 18),
                    agent.stats.message_count,
                    format_number(agent.stats.total_input()),
                    format_number(agent.stats.output_tokens),
                    format_number(agent.stats.total_tokens()),
                )?;
            }
        }
    }

    let total = session.total_stats();
    writeln!(w, "\n{rule}")?;
    writeln!(w, "[TOTAL USAGE]")?;
    writeln!(w, "{rule}")?;
    write_stats(w, &total, "")?;

    writeln!(w)?;
    write_cost(w, "ESTIMATED COST", &total, pricing)
}

/// Write the summary table for many sessions, largest first.
pub fn write_batch_report<W: Write>(
    w: &mut W,
    sessions: &[SessionSummary],
    pricing: &Pricing,
) -> io::Result<()> {
    let mut ranked: Vec<(&SessionSummary, UsageCounters)> =
        sessions.iter().map(|s| (s, s.total_stats())).collect();
    ranked.sort_by(|a, b| b.1.total_tokens().cmp(&a.1.total_tokens()));

    writeln!(w, "{}", "=".repeat(80))?;
    writeln!(w, "ALL SESSIONS SUMMARY")?;
    writeln!(w, "{}", "=".repeat(80))?;

    writeln!(
        w,
        "\n{:<40} {:>10} {:>14} {:>12} {:>8}",
        "Session ID", "Messages", "Input", "Output", "Agents"
    )?;
    writeln!(w, "{}", "-".repeat(BATCH_RULE))?;

    let mut grand_total = UsageCounters::new();
    let mut total_agents = 0;

    for (session, total) in &ranked {
        grand_total.merge(total);
        total_agents += session.agent_count();

        writeln!(
            w,
            "{:<40} {:>10} {:>14} {:>12} {:>8}",
            truncate(session.session_id(), 36),
            total.message_count,
            format_number(total.total_input()),
            format_number(total.output_tokens),
            session.agent_count(),
        )?;
    }

    writeln!(w, "{}", "-".repeat(BATCH_RULE))?;
    writeln!(
        w,
        "{:<40} {:>10} {:>14} {:>12} {:>8}",
        format!("TOTAL ({} sessions)", sessions.len()),
        grand_total.message_count,
        format_number(grand_total.total_input()),
        format_number(grand_total.output_tokens),
        total_agents,
    )?;

    writeln!(w)?;
    write_cost(w, "ESTIMATED TOTAL COST", &grand_total, pricing)
}

/// Pretty-printed JSON document for one session.
pub fn session_json(session: &SessionSummary) -> Result<String> {
    serde_json::to_string_pretty(session).map_err(|e| TallyError::json_parse("session report", e))
}

/// Pretty-printed JSON array for many sessions.
pub fn batch_json(sessions: &[SessionSummary]) -> Result<String> {
    serde_json::to_string_pretty(sessions).map_err(|e| TallyError::json_parse("batch report", e))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
