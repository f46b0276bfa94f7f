//! Configuration loaded from `~/.tally/config.yaml`.
//!
//! ```yaml
//! dedup: per-request        # or: unconditional
//! include_subagents: true
//! pricing: opus             # opus | sonnet | haiku
//! rates:                    # optional, overrides `pricing`
//!   base_input: 15.0
//!   cache_write: 18.75
//!   cache_read: 1.5
//!   output: 75.0
//! projects_dir: /home/me/.claude/projects
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_core::{Result, TallyError};
use tracing::debug;

use crate::accumulator::DedupPolicy;
use crate::cost::{PricingTier, RateTable};
use crate::report::Pricing;
use crate::session::SessionAnalyzer;

/// Settings for session analysis and cost reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// How repeated usage within a file is counted
    pub dedup: DedupPolicy,

    /// Whether subagent logs are discovered and included
    pub include_subagents: bool,

    /// Pricing tier used when `rates` is not set
    pub pricing: PricingTier,

    /// Explicit rate table
    pub rates: Option<RateTable>,

    /// Root searched when a session is given by id
    pub projects_dir: Option<PathBuf>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::default(),
            include_subagents: true,
            pricing: PricingTier::default(),
            rates: None,
            projects_dir: None,
        }
    }
}

impl TallyConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config path: `~/.tally/config.yaml`.
    pub fn default_path(home: Option<PathBuf>) -> Option<PathBuf> {
        home.map(|h| h.join(".tally").join("config.yaml"))
    }

    /// Load configuration from a YAML file that must exist.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TallyError::config_not_found(path, e))?;
        Self::from_yaml_str(&content, path)
    }

    /// Parse configuration text; `path` is only used in error messages.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content).map_err(|e| TallyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the default file if it exists.
    ///
    /// An explicit path that is missing is an error; a missing default file
    /// means defaults.
    pub fn load(path: Option<&Path>, home: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_yaml(path);
        }

        match Self::default_path(home) {
            Some(default) if default.is_file() => {
                debug!(path = %default.display(), "Loading config");
                Self::from_yaml(&default)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(rates) = &self.rates
            && let Some(name) = rates.invalid_rate()
        {
            return Err(TallyError::ConfigValidation {
                message: format!("rate '{name}' must be a non-negative number"),
            });
        }
        Ok(())
    }

    /// Rates used for cost estimates.
    pub fn rate_table(&self) -> RateTable {
        self.rates.unwrap_or_else(|| self.pricing.rates())
    }

    /// Label describing where the rates came from.
    pub fn pricing_label(&self) -> String {
        match self.rates {
            Some(_) => "custom".to_string(),
            None => self.pricing.to_string(),
        }
    }

    /// Rates and label for reports.
    pub fn report_pricing(&self) -> Pricing {
        Pricing::new(self.rate_table(), self.pricing_label())
    }

    /// Analyzer configured from these settings.
    pub fn analyzer(&self) -> SessionAnalyzer {
        SessionAnalyzer::new(self.dedup).with_subagents(self.include_subagents)
    }
}
