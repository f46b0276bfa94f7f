//! tally - token usage and cost reports for AI coding-assistant sessions
//!
//! ## Usage
//!
//! ```bash
//! # Report on one session by id (searches ~/.claude/projects)
//! tally be18c6d0-46c0-4530-bde9-f535ad152abe
//!
//! # Session file given directly, with per-agent detail
//! tally ~/.claude/projects/my-project/be18c6d0-46c0-4530-bde9-f535ad152abe.jsonl --verbose
//!
//! # Every session in a project directory, as JSON
//! tally ~/.claude/projects/my-project --all --json
//!
//! # Count every usage-bearing line, priced at sonnet rates
//! tally be18c6d0 --base-dir ./logs --dedup unconditional --pricing sonnet
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tally_core::{LogGuard, TallyError, init_logging};
use tally_usage::{
    BaseDirLocator, DedupPolicy, PricingTier, ProjectsLocator, SessionLocator, TallyConfig, report,
    resolve_session,
};
use tracing::{debug, error};

/// Token usage and cost reports for AI coding-assistant session logs
///
/// Sums token usage from a session's main log and all of its subagent logs,
/// then prints a report with an estimated cost.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session id, session file path, or (with --all) a directory
    session: Option<String>,

    /// Directory holding session files
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    /// Analyze every session in the directory
    #[arg(short, long)]
    all: bool,

    /// Skip subagent logs
    #[arg(long)]
    no_subagents: bool,

    /// Show per-agent detail; -vv adds debug logs, -vvv trace logs
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// How repeated usage is counted: per-request or unconditional
    #[arg(long)]
    dedup: Option<DedupPolicy>,

    /// Pricing tier for cost estimates: opus, sonnet, or haiku
    #[arg(long)]
    pricing: Option<PricingTier>,

    /// Config file (defaults to ~/.tally/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for JSON log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    if cli.session.is_none() && !cli.all {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Failed to print help: {}", e);
        }
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("tally failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<TallyError>().and_then(TallyError::guidance) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> tally_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose)
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> tally_core::Result<TallyConfig> {
    let mut config = TallyConfig::load(cli.config.as_deref(), dirs::home_dir())?;

    if let Some(dedup) = cli.dedup {
        config.dedup = dedup;
    }
    if let Some(pricing) = cli.pricing {
        config.pricing = pricing;
        config.rates = None;
    }
    if cli.no_subagents {
        config.include_subagents = false;
    }

    debug!(?config, "Effective configuration");
    Ok(config)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;

    if cli.all {
        let dir = batch_directory(cli)?;
        return run_batch(&config, &dir, cli.json);
    }

    let Some(session) = cli.session.as_deref() else {
        return Ok(());
    };

    let locator: Box<dyn SessionLocator> = match (&cli.base_dir, &config.projects_dir) {
        (Some(base_dir), _) => Box::new(BaseDirLocator::new(base_dir)),
        (None, Some(projects_dir)) => Box::new(ProjectsLocator::new(projects_dir)),
        (None, None) => Box::new(ProjectsLocator::from_home(dirs::home_dir())),
    };

    let path = resolve_session(session, locator.as_ref())?;
    debug!(path = %path.display(), "Resolved session");

    let summary = config.analyzer().analyze_session(&path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        writeln!(out, "{}", report::session_json(&summary)?)?;
    } else {
        report::write_session_report(&mut out, &summary, &config.report_pricing(), cli.verbose > 0)
            .context("Failed to write report")?;
    }
    Ok(())
}

/// Directory for `--all`: the positional argument if it is a directory,
/// otherwise `--base-dir`.
fn batch_directory(cli: &Cli) -> tally_core::Result<PathBuf> {
    if let Some(arg) = &cli.session {
        let path = Path::new(arg);
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
    }
    cli.base_dir.clone().ok_or(TallyError::BatchDirectoryMissing)
}

fn run_batch(config: &TallyConfig, dir: &Path, json: bool) -> anyhow::Result<()> {
    let sessions = config.analyzer().analyze_directory(dir)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        writeln!(out, "{}", report::batch_json(&sessions)?)?;
    } else {
        report::write_batch_report(&mut out, &sessions, &config.report_pricing())
            .context("Failed to write report")?;
    }
    Ok(())
}
