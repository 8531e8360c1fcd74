//! Anomaly checks: robust z-score over a check's own history.
//!
//! The history of the monitored check is read from the metric store, ordered
//! by run time. The most recent value is scored against the window with
//!
//! ```text
//! m = 0.6745 * (last - median) / MAD
//! ```
//!
//! where MAD is the median absolute deviation. Median and MAD are not
//! dragged around by the outliers being looked for, unlike mean and standard
//! deviation. A constant history (MAD = 0) scores 0. The score only decides
//! pass/fail: the recorded value is the last observed measurement.

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use super::{grouped_result_name, CheckExecution};
use crate::core::{evaluate, Check, CheckResult, Value};
use crate::error::{Result, WeirError};
use crate::perf_debug;
use crate::runner::ResultRecorder;
use crate::sql::{parse_dataset, Query, SqlExpr};

/// 75th percentile of the standard normal distribution; scales MAD to be
/// comparable with a standard deviation.
pub const ROBUST_Z_SCALE: f64 = 0.6745;

/// One historical measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub value: f64,
    pub run_time: Option<DateTime<Utc>>,
}

/// The ordered history of one monitored series, optionally restricted to one
/// value of the partitioning dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalWindow {
    pub partition: Option<Value>,
    points: Vec<HistoryPoint>,
}

impl HistoricalWindow {
    pub fn new(partition: Option<Value>) -> Self {
        Self {
            partition,
            points: Vec::new(),
        }
    }

    /// Builds an unpartitioned window from values in run-time order.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            partition: None,
            points: values
                .into_iter()
                .map(|value| HistoryPoint {
                    value,
                    run_time: None,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// The most recent value.
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    pub fn median(&self) -> Option<f64> {
        median(&self.values())
    }

    pub fn mad(&self) -> Option<f64> {
        median_absolute_deviation(&self.values())
    }

    /// Robust z-score of the most recent value; `None` for an empty window.
    pub fn robust_z_score(&self) -> Option<f64> {
        let values = self.values();
        let last = *values.last()?;
        let median = median(&values)?;
        let mad = median_absolute_deviation(&values)?;
        Some(robust_z_score(last, median, mad))
    }
}

/// Median of `values`, averaging the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of the absolute deviations from the median.
pub fn median_absolute_deviation(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// `0.6745 * (value - median) / mad`, or 0 when `mad` is 0.
pub fn robust_z_score(value: f64, median: f64, mad: f64) -> f64 {
    if mad == 0.0 {
        0.0
    } else {
        ROBUST_Z_SCALE * (value - median) / mad
    }
}

/// Builds the history query of an anomaly check over one metric-store dataset.
///
/// Selects `actual_value`, `run_time` and, when the check has dimensions,
/// the first dimension, for every result whose `check_id` starts with the
/// monitored id. The most recent `limit` rows are read; the window is put
/// back in ascending run-time order when it is assembled.
pub fn history_query(check: &Check, dataset: &str, limit: usize) -> Result<Query> {
    let monitored = check.check_id.as_deref().ok_or_else(|| {
        WeirError::Configuration(format!(
            "Check '{}': anomaly check requires the check_id of the monitored check",
            check.name
        ))
    })?;

    let mut builder = Query::builder(parse_dataset(dataset))
        .select_raw("actual_value")
        .select_raw("run_time");
    if let Some(dimension) = check.dimensions.first() {
        builder = builder.select_raw(dimension);
    }

    builder = builder.filter(format!(
        "check_id LIKE '{}%'",
        monitored.replace('\'', "''")
    ));
    if let Some(filter) = &check.filter {
        builder = builder.filter(filter);
    }

    builder
        .order_by(SqlExpr::raw("run_time"), false)
        .limit(limit)
        .build()
}

/// Splits history rows into windows, one per value of the partitioning
/// column when `partitioned`. Partitions keep their first-seen order; rows
/// with a NULL value are skipped.
pub fn windows_from_rows(rows: Vec<Vec<Value>>, partitioned: bool) -> Vec<HistoricalWindow> {
    let mut windows: Vec<HistoricalWindow> = Vec::new();
    for row in rows {
        let mut cells = row.into_iter();
        let value = cells.next().and_then(|v| v.as_f64());
        let run_time = match cells.next() {
            Some(Value::Timestamp(ts)) => Some(ts),
            _ => None,
        };
        let partition = if partitioned {
            Some(cells.next().unwrap_or_default())
        } else {
            None
        };

        let Some(value) = value else {
            continue;
        };
        let point = HistoryPoint { value, run_time };
        match windows.iter_mut().find(|w| w.partition == partition) {
            Some(window) => window.push(point),
            None => {
                let mut window = HistoricalWindow::new(partition);
                window.push(point);
                windows.push(window);
            }
        }
    }
    windows
}

/// Runs an anomaly check: one result per dataset, or per partition when the
/// check has dimensions.
#[instrument(skip(execution, recorder, results), fields(check.name = %execution.check.name))]
pub(crate) async fn run(
    execution: &CheckExecution<'_>,
    recorder: &ResultRecorder<'_>,
    results: &mut Vec<CheckResult>,
) -> Result<()> {
    let check = execution.check;
    let condition = check.condition()?;
    let threshold = check.threshold()?;
    let partition_column = check.dimensions.first();
    let min_points = execution.options.min_history_points;

    for dataset in &check.dataset {
        let query = history_query(check, dataset, execution.options.history_limit)?;
        let mut rows = execution
            .metric_store
            .execute_query(&query, check, false)
            .await
            .map_err(|e| {
                WeirError::unexpected_result(
                    &check.name,
                    format!("failed to fetch history from '{dataset}': {e}"),
                )
            })?;
        // Read newest first so the limit keeps the most recent points
        rows.reverse();

        let mut windows = windows_from_rows(rows, partition_column.is_some());
        if windows.is_empty() {
            windows.push(HistoricalWindow::new(None));
        }

        for window in windows {
            let last_value = Value::from(window.last_value());
            let success = if window.len() < min_points {
                warn!(
                    points = window.len(),
                    required = min_points,
                    dataset = %dataset,
                    "Not enough history for anomaly check"
                );
                false
            } else {
                let score = window.robust_z_score().unwrap_or_default();
                perf_debug!(
                    execution.options.log,
                    score,
                    median = window.median().unwrap_or_default(),
                    mad = window.mad().unwrap_or_default(),
                    "Robust z-score"
                );
                evaluate(&Value::Float(score), threshold, condition)?
            };

            let (name, group_values) = match (partition_column, &window.partition) {
                (Some(column), Some(value)) => {
                    let columns = std::slice::from_ref(column);
                    let values = std::slice::from_ref(value);
                    (
                        grouped_result_name(&check.name, columns, values),
                        vec![value.clone()],
                    )
                }
                _ => (check.name.clone(), Vec::new()),
            };

            let result = CheckResult::new(
                check,
                execution.datasource,
                dataset,
                name,
                last_value,
                success,
                execution.run_id,
            )
            .with_group_values(group_values);
            recorder.record(result, results).await?;
        }
    }
    Ok(())
}
