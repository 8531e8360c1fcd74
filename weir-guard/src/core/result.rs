//! Check results and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check::{generate_check_id, Check, CheckKind, TimeDimension};
use super::condition::{Condition, Threshold};
use super::value::Value;
use crate::error::WeirError;

/// One evaluation outcome of a check against a (datasource, dataset) pair.
///
/// Grouped checks produce one result per group; the group values are kept in
/// `group_values` (select order) and appended to `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub datasource: String,
    pub dataset: String,
    pub measure: Option<String>,
    pub condition: Option<Condition>,
    pub threshold: Option<Threshold>,
    pub dimensions: Vec<String>,
    pub time_dimension: Option<TimeDimension>,
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_values: Vec<Value>,
    pub actual_value: Value,
    pub success: bool,
    pub fail: bool,
    pub run_id: String,
    pub run_time: DateTime<Utc>,
}

impl CheckResult {
    /// Shapes a result record for `check`, computing its check id from the
    /// datasource, the (possibly suffixed) result name and the dataset.
    pub fn new(
        check: &Check,
        datasource: &str,
        dataset: &str,
        name: String,
        actual_value: Value,
        success: bool,
        run_id: &str,
    ) -> Self {
        Self {
            check_id: generate_check_id(datasource, &name, dataset),
            name,
            description: check.description.clone(),
            kind: check.kind,
            datasource: datasource.to_string(),
            dataset: dataset.to_string(),
            measure: check.measure.clone(),
            condition: check.condition,
            threshold: check.threshold.clone(),
            dimensions: check.dimensions.clone(),
            time_dimension: check.time_dimension.clone(),
            filter: check.filter.clone(),
            group_values: Vec::new(),
            actual_value,
            success,
            fail: !success,
            run_id: run_id.to_string(),
            run_time: Utc::now(),
        }
    }

    pub fn with_group_values(mut self, values: Vec<Value>) -> Self {
        self.group_values = values;
        self
    }

    pub fn with_run_time(mut self, run_time: DateTime<Utc>) -> Self {
        self.run_time = run_time;
        self
    }
}

/// The outcome of one configured check within a run.
#[derive(Debug)]
pub struct CheckReport {
    pub check_name: String,
    pub results: Vec<CheckResult>,
    /// Set when the check aborted and the run continued past it
    pub error: Option<WeirError>,
}

impl CheckReport {
    pub fn new(check_name: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            results: Vec::new(),
            error: None,
        }
    }

    /// True when the check ran to completion and every result passed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.results.iter().all(|r| r.success)
    }
}

/// All check reports of one run, in declaration order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub reports: Vec<CheckReport>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            reports: Vec::new(),
        }
    }

    /// Iterates over every recorded result, in recording order.
    pub fn results(&self) -> impl Iterator<Item = &CheckResult> {
        self.reports.iter().flat_map(|r| r.results.iter())
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &CheckResult> {
        self.results().filter(|r| r.fail)
    }

    /// Iterates over `(check name, error)` for checks that aborted.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &WeirError)> {
        self.reports
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.check_name.as_str(), e)))
    }

    pub fn is_success(&self) -> bool {
        self.reports.iter().all(CheckReport::is_success)
    }

    /// Returns the report for the named check, if it was part of the run.
    pub fn report(&self, check_name: &str) -> Option<&CheckReport> {
        self.reports.iter().find(|r| r.check_name == check_name)
    }
}
