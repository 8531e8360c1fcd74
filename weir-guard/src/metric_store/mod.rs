//! Persistence of check results.
//!
//! Every recorded [`CheckResult`] is handed to a [`MetricStore`] as soon as it
//! is produced. The store is also the source of history for anomaly checks,
//! which query it like any other dataset.

use async_trait::async_trait;

use crate::core::{Check, CheckResult, Row};
use crate::error::Result;
use crate::sql::{Dialect, Query};

mod in_memory;

pub use in_memory::{InMemoryMetricStore, DEFAULT_METRICS_TABLE};

/// Append-only storage for check results.
///
/// The results table exposes the columns `check_id, name, type, datasource,
/// dataset, measure, condition, threshold, threshold_list, dimensions,
/// filter, actual_value, success, fail, run_id, run_time`. Scalar thresholds
/// are stored in `threshold`; `[low, high]` pairs go to `threshold_list`.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// The dialect history queries are rendered in.
    fn dialect(&self) -> Dialect;

    /// Name of the results table.
    fn table_name(&self) -> &str;

    /// Persists one result record.
    async fn insert_results(&self, result: &CheckResult) -> Result<()>;

    /// Executes a query over the stored results.
    ///
    /// With `validate_results`, an empty result set is a
    /// [`WeirError::UnexpectedResult`](crate::error::WeirError::UnexpectedResult)
    /// exactly as for drivers.
    async fn execute_query(
        &self,
        query: &Query,
        check: &Check,
        validate_results: bool,
    ) -> Result<Vec<Row>>;
}
