//! Run configuration.
//!
//! Loading files, templating and include-merging happen upstream; this module
//! only gives the already-assembled document a typed shape.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::Check;
use crate::error::{Result, WeirError};
use crate::logging::LogConfig;

/// Options controlling how a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Stop at the first failing check instead of reporting the error and
    /// moving on. Metric store failures always stop the run.
    pub fail_fast: bool,
    /// Maximum number of historical points an anomaly check reads
    pub history_limit: usize,
    /// Anomaly checks with fewer points fail as "not enough history"
    pub min_history_points: usize,
    #[serde(skip)]
    pub log: LogConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            history_limit: 10_000,
            min_history_points: 5,
            log: LogConfig::default(),
        }
    }
}

impl RunOptions {
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_min_history_points(mut self, points: usize) -> Self {
        self.min_history_points = points;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// A suite of checks as declared in configuration.
///
/// # Examples
///
/// ```rust
/// use weir_guard::config::SuiteConfig;
///
/// let suite = SuiteConfig::from_json_str(r#"{
///     "checks": [
///         {"name": "orders_exist", "dataset": "orders", "type": "row_count",
///          "condition": "gt", "threshold": 0}
///     ]
/// }"#).unwrap();
///
/// assert!(suite.validate().is_ok());
/// assert!(suite.options.fail_fast);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub checks: Vec<Check>,
    #[serde(default)]
    pub options: RunOptions,
}

fn default_version() -> u32 {
    1
}

impl SuiteConfig {
    pub fn new(checks: Vec<Check>) -> Self {
        Self {
            version: default_version(),
            checks,
            options: RunOptions::default(),
        }
    }

    /// Parses a suite from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| WeirError::Parse(format!("invalid suite configuration: {e}")))
    }

    /// Checks that names are unique and that every check is well-formed.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for check in &self.checks {
            if !names.insert(check.name.as_str()) {
                return Err(WeirError::Configuration(format!(
                    "Duplicate check name: {}",
                    check.name
                )));
            }
            check.validate()?;
        }
        Ok(())
    }

    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }
}
