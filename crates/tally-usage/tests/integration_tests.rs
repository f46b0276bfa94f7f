//! Integration tests for tally-usage with session trees on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tally_core::logging::init_test_logging;
use tally_usage::{
    DedupPolicy, PricingTier, RateTable, SessionAnalyzer, TallyConfig, analyze_file,
    estimate_cost, report,
};
use tempfile::{TempDir, tempdir};

const SESSION_ID: &str = "be18c6d0-46c0-4530-bde9-f535ad152abe";
const OTHER_SESSION_ID: &str = "0ea17d53-eae1-4987-9283-85df9276b03a";

/// Main session log: two streamed copies of req_01, one req_02, plus noise.
const MAIN_LOG: &str = r#"{"type":"user","sessionId":"be18c6d0-46c0-4530-bde9-f535ad152abe","message":{"role":"user","content":"fix the build"}}
{"type":"assistant","requestId":"req_01","timestamp":"2025-11-20T10:00:00.000Z","message":{"model":"claude-opus-4-5-20251101","usage":{"input_tokens":10,"output_tokens":100,"cache_creation_input_tokens":1000,"cache_read_input_tokens":5000,"cache_creation":{"ephemeral_5m_input_tokens":1000,"ephemeral_1h_input_tokens":0}}}}
{"type":"assistant","requestId":"req_01","timestamp":"2025-11-20T10:00:01.000Z","message":{"model":"claude-opus-4-5-20251101","usage":{"input_tokens":10,"output_tokens":100,"cache_creation_input_tokens":1000,"cache_read_input_tokens":5000,"cache_creation":{"ephemeral_5m_input_tokens":1000,"ephemeral_1h_input_tokens":0}}}}
{"type":"system","subtype":"compact"}
{"type":"assistant","requestId":"req_02","timestamp":"2025-11-20T10:05:00.000Z","message":{"model":"claude-opus-4-5-20251101","usage":{"input_tokens":20,"output_tokens":50,"cache_read_input_tokens":6000}}}
"#;

fn agent_log(agent_id: Option<&str>, session_id: &str, request_ids: &[&str], input: u64) -> String {
    request_ids
        .iter()
        .enumerate()
        .map(|(i, rid)| {
            let agent = agent_id
                .map(|a| format!(r#""agentId":"{a}","#))
                .unwrap_or_default();
            format!(
                r#"{{{agent}"sessionId":"{session_id}","slug":"explore-code","requestId":"{rid}","timestamp":"2025-11-20T10:0{i}:00Z","message":{{"model":"claude-haiku-4-5","usage":{{"input_tokens":{input},"output_tokens":1}}}}}}"#
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Project directory containing one session.
fn project_with_session(main: &str) -> (TempDir, PathBuf) {
    init_test_logging();
    let dir = tempdir().unwrap();
    let session = dir.path().join(format!("{SESSION_ID}.jsonl"));
    fs::write(&session, main).unwrap();
    (dir, session)
}

fn subagents_dir(project: &Path) -> PathBuf {
    let dir = project.join(SESSION_ID).join("subagents");
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn input_log(input: u64) -> String {
    format!(r#"{{"requestId":"r1","message":{{"usage":{{"input_tokens":{input}}}}}}}"#)
}

#[test]
fn test_main_log_dedups_by_request() {
    let (_dir, session) = project_with_session(MAIN_LOG);

    let summary = SessionAnalyzer::new(DedupPolicy::PerRequest)
        .analyze_session(&session)
        .unwrap();

    let main = summary.main_stats();
    assert_eq!(summary.session_id(), SESSION_ID);
    assert_eq!(main.message_count, 2);
    assert_eq!(main.input_tokens, 30);
    assert_eq!(main.output_tokens, 150);
    assert_eq!(main.cache_creation_input_tokens, 1000);
    assert_eq!(main.cache_read_input_tokens, 11000);
    assert_eq!(main.ephemeral_5m_input_tokens, 1000);
    assert_eq!(main.total_input(), 12030);
    assert_eq!(main.total_tokens(), 12180);
}

#[test]
fn test_main_log_unconditional() {
    let (_dir, session) = project_with_session(MAIN_LOG);

    let summary = SessionAnalyzer::new(DedupPolicy::Unconditional)
        .analyze_session(&session)
        .unwrap();

    assert_eq!(summary.main_stats().message_count, 3);
    assert_eq!(summary.main_stats().input_tokens, 40);
    assert_eq!(summary.main_stats().cache_read_input_tokens, 16000);
}

#[test]
fn test_same_request_id_policies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    fs::write(
        &path,
        "{\"requestId\":\"r\",\"message\":{\"usage\":{\"input_tokens\":5}}}\n{\"requestId\":\"r\",\"message\":{\"usage\":{\"input_tokens\":7}}}\n",
    )
    .unwrap();

    let dedup = analyze_file(&path, DedupPolicy::PerRequest).unwrap();
    assert_eq!(dedup.stats.input_tokens, 5);
    assert_eq!(dedup.stats.message_count, 1);
    assert_eq!(dedup.duplicates, 1);

    let all = analyze_file(&path, DedupPolicy::Unconditional).unwrap();
    assert_eq!(all.stats.input_tokens, 12);
    assert_eq!(all.stats.message_count, 2);
}

#[test]
fn test_malformed_line_tolerance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    fs::write(
        &path,
        "{\"message\":{\"usage\":{\"input_tokens\":3}}, \"requestId\":\"a\"}\nnot json\n{\"message\":{\"usage\":{\"input_tokens\":4}}, \"requestId\":\"b\"}\n",
    )
    .unwrap();

    let analysis = analyze_file(&path, DedupPolicy::PerRequest).unwrap();
    assert_eq!(analysis.stats.input_tokens, 7);
    assert_eq!(analysis.stats.message_count, 2);
    assert_eq!(analysis.malformed_lines, 1);
    assert_eq!(analysis.entries, 2);
}

#[test]
fn test_hierarchy_total() {
    let (dir, session) = project_with_session(&input_log(10));
    let subagents = subagents_dir(dir.path());
    fs::write(subagents.join("agent-a.jsonl"), input_log(5)).unwrap();
    fs::write(subagents.join("agent-b.jsonl"), input_log(8)).unwrap();

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    assert_eq!(summary.agent_count(), 2);
    assert_eq!(summary.main_stats().input_tokens, 10);
    assert_eq!(summary.total_stats().input_tokens, 23);
    assert_eq!(summary.total_stats().message_count, 3);

    // Agent ids fall back to file stems
    assert!(summary.agent("agent-a").is_some());
    assert!(summary.agent("agent-b").is_some());
}

#[test]
fn test_agent_metadata_from_log() {
    let (dir, session) = project_with_session(MAIN_LOG);
    let subagents = subagents_dir(dir.path());
    fs::write(
        subagents.join("agent-x.jsonl"),
        agent_log(Some("3f2a9c"), SESSION_ID, &["a1", "a2", "a2"], 40),
    )
    .unwrap();

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();
    let agent = summary.agent("3f2a9c").unwrap();

    assert_eq!(agent.slug.as_deref(), Some("explore-code"));
    assert_eq!(agent.model.as_deref(), Some("claude-haiku-4-5"));
    assert_eq!(agent.stats.message_count, 2);
    assert_eq!(agent.stats.input_tokens, 80);
    assert_eq!(agent.duration_seconds(), Some(60.0));
    assert_eq!(summary.total_stats().input_tokens, 110);
}

#[test]
fn test_sibling_agent_logs_linked_by_session_id() {
    let (dir, session) = project_with_session(MAIN_LOG);
    fs::write(
        dir.path().join("agent-mine.jsonl"),
        agent_log(Some("mine"), SESSION_ID, &["m1"], 7),
    )
    .unwrap();
    fs::write(
        dir.path().join("agent-theirs.jsonl"),
        agent_log(Some("theirs"), OTHER_SESSION_ID, &["t1"], 1000),
    )
    .unwrap();

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    assert_eq!(summary.agent_count(), 1);
    assert_eq!(summary.agent("mine").unwrap().stats.input_tokens, 7);
}

#[cfg(unix)]
#[test]
fn test_agent_reachable_both_ways_counted_once() {
    let (dir, session) = project_with_session(&input_log(10));
    let sibling = dir.path().join("agent-shared.jsonl");
    fs::write(&sibling, agent_log(None, SESSION_ID, &["s1"], 5)).unwrap();
    let linked = subagents_dir(dir.path()).join("agent-shared.jsonl");
    std::os::unix::fs::symlink(&sibling, linked).unwrap();

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    assert_eq!(summary.agent_count(), 1);
    assert_eq!(summary.total_stats().input_tokens, 15);
    assert_eq!(summary.total_stats().message_count, 2);
}

#[test]
fn test_no_subagents_option() {
    let (dir, session) = project_with_session(&input_log(10));
    fs::write(subagents_dir(dir.path()).join("agent-a.jsonl"), input_log(5)).unwrap();

    let summary = SessionAnalyzer::default()
        .with_subagents(false)
        .analyze_session(&session)
        .unwrap();

    assert_eq!(summary.agent_count(), 0);
    assert_eq!(summary.total_stats().input_tokens, 10);
}

#[test]
fn test_colliding_agent_ids_keep_one_summary() {
    let (dir, session) = project_with_session(&input_log(1));
    let subagents = subagents_dir(dir.path());
    let first = agent_log(Some("dup"), SESSION_ID, &["x"], 5);
    let second = agent_log(Some("dup"), SESSION_ID, &["y"], 8);
    fs::write(subagents.join("agent-1.jsonl"), first).unwrap();
    fs::write(subagents.join("agent-2.jsonl"), second).unwrap();

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    // Files are analyzed in path order, so agent-2 wins
    assert_eq!(summary.agent_count(), 1);
    assert_eq!(summary.agent("dup").unwrap().stats.input_tokens, 8);
}

#[test]
fn test_missing_main_log_returns_no_summary() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join(format!("{SESSION_ID}.jsonl"));

    let result = SessionAnalyzer::default().analyze_session(&missing);
    assert!(result.is_err());
    assert!(result.unwrap_err().is_session_error());
}

#[test]
fn test_directory_is_not_a_session() {
    let dir = tempdir().unwrap();
    let err = SessionAnalyzer::default().analyze_session(dir.path()).unwrap_err();
    assert!(matches!(err, tally_core::TallyError::NotAFile { .. }));
}

#[test]
fn test_analyze_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(format!("{SESSION_ID}.jsonl")), input_log(10)).unwrap();
    fs::write(dir.path().join(format!("{OTHER_SESSION_ID}.jsonl")), input_log(20)).unwrap();
    fs::write(dir.path().join("agent-loose.jsonl"), input_log(99)).unwrap();

    let sessions = SessionAnalyzer::default().analyze_directory(dir.path()).unwrap();

    assert_eq!(sessions.len(), 2);
    let total: u64 = sessions.iter().map(|s| s.total_stats().input_tokens).sum();
    assert_eq!(total, 30);
}

#[test]
fn test_analyze_empty_directory_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.jsonl"), input_log(1)).unwrap();

    let err = SessionAnalyzer::default().analyze_directory(dir.path()).unwrap_err();
    assert!(matches!(err, tally_core::TallyError::NoSessionsFound { .. }));
    assert!(err.guidance().is_some());
}

#[test]
fn test_cost_of_session_total() {
    let (_dir, session) = project_with_session(MAIN_LOG);
    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    let cost = estimate_cost(&summary.total_stats(), &RateTable::default());
    let expected = 30.0 / 1e6 * 15.0
        + 1000.0 / 1e6 * 18.75
        + 11000.0 / 1e6 * 1.50
        + 150.0 / 1e6 * 75.0;
    assert!((cost.total_cost - expected).abs() < 1e-12);

    let cheaper = estimate_cost(&summary.total_stats(), &PricingTier::Haiku.rates());
    assert!(cheaper.total_cost < cost.total_cost);
}

#[test]
fn test_config_drives_analysis_and_report() {
    let (dir, session) = project_with_session(MAIN_LOG);
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, "dedup: unconditional\npricing: sonnet\n").unwrap();

    let config = TallyConfig::load(Some(&config_path), None).unwrap();
    let summary = config.analyzer().analyze_session(&session).unwrap();
    assert_eq!(summary.main_stats().message_count, 3);

    let mut out = Vec::new();
    report::write_session_report(&mut out, &summary, &config.report_pricing(), false).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!("SESSION USAGE REPORT: {SESSION_ID}")));
    assert!(text.contains("(sonnet pricing)"));

    let json: serde_json::Value =
        serde_json::from_str(&report::session_json(&summary).unwrap()).unwrap();
    assert_eq!(json["main_stats"]["message_count"], 3);
}

#[test]
fn test_huge_token_counts_saturate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    fs::write(
        &path,
        "{\"message\":{\"usage\":{\"input_tokens\":18446744073709551615,\"cache_read_input_tokens\":5}}}\n{\"message\":{\"usage\":{\"input_tokens\":1}}}\n",
    )
    .unwrap();

    let analysis = analyze_file(&path, DedupPolicy::Unconditional).unwrap();
    assert_eq!(analysis.stats.input_tokens, u64::MAX);
    assert_eq!(analysis.stats.message_count, 2);
    assert_eq!(analysis.stats.total_input(), u64::MAX);
    assert_eq!(analysis.stats.total_tokens(), u64::MAX);
}

#[cfg(unix)]
#[test]
fn test_unreadable_agent_logs_are_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, session) = project_with_session(&input_log(10));
    let subagents = subagents_dir(dir.path());
    fs::write(subagents.join("agent-ok.jsonl"), input_log(5)).unwrap();

    let locked_agent = subagents.join("agent-locked.jsonl");
    fs::write(&locked_agent, input_log(1000)).unwrap();
    let locked_sibling = dir.path().join("agent-sibling.jsonl");
    fs::write(&locked_sibling, agent_log(Some("sib"), SESSION_ID, &["s"], 2000)).unwrap();

    for path in [&locked_agent, &locked_sibling] {
        fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    }

    // Permission bits do not stop root
    if fs::File::open(&locked_agent).is_ok() {
        return;
    }

    let summary = SessionAnalyzer::default().analyze_session(&session).unwrap();

    for path in [&locked_agent, &locked_sibling] {
        fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    assert_eq!(summary.agent_count(), 1);
    assert!(summary.agent("agent-ok").is_some());
    assert!(summary.agent("agent-locked").is_none());
    assert!(summary.agent("sib").is_none());
    assert_eq!(summary.total_stats().input_tokens, 15);
    assert_eq!(summary.total_stats().message_count, 2);
}
