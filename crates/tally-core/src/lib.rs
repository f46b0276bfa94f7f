//! # tally-core
//!
//! Core errors and logging for the tally usage analyzer.
//!
//! This crate provides:
//! - [`TallyError`] - Error type shared by all tally crates
//! - [`logging`] - Tracing setup
//!
//! ## Example
//!
//! ```no_run
//! use tally_core::{TallyError, logging};
//!
//! fn main() -> tally_core::Result<()> {
//!     let _guard = logging::init_logging(None, 0)?;
//!
//!     let session = std::path::Path::new("be18c6d0.jsonl");
//!     if !session.exists() {
//!         return Err(TallyError::FileNotFound { path: session.into() });
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, TallyError};
pub use logging::{LogGuard, init_logging};
