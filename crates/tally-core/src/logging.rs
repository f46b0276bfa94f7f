//! Logging infrastructure for tally.
//!
//! Structured logging uses the `tracing` ecosystem. Reports go to stdout, so
//! every log line goes to stderr (human-readable) and, when a log directory is
//! given, to a daily-rolled JSON lines file as well.
//!
//! ## Example
//!
//! ```no_run
//! use tally_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, 0).expect("logging init");
//!
//! tracing::warn!(line = 3, "skipping malformed line");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{Result, TallyError};

/// Crates whose events are shown by the default filter.
const LOG_TARGETS: &[&str] = &["tally", "tally_core", "tally_usage"];

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the tally logging system.
///
/// This sets up:
/// - Console logging to stderr (human-readable format)
/// - File logging to `<log_dir>/tally.log` (JSON lines) when `log_dir` is given
///
/// `verbosity` is the number of `-v` flags: 0 and 1 show warnings, 2 debug, 3+ trace.
/// `RUST_LOG` overrides the computed filter.
pub fn init_logging(log_dir: Option<PathBuf>, verbosity: u8) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir).map_err(|e| TallyError::DirectoryCreation {
                path: dir.clone(),
                source: e,
            })?;

            let file_appender = tracing_appender::rolling::daily(&dir, "tally.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_span_list(true);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let verbose = verbosity > 1;
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| TallyError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(verbosity, "logging initialized");

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Build the default filter directives for a verbosity level.
pub fn default_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 | 1 => "warn",
        2 => "debug",
        _ => "trace",
    };

    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
