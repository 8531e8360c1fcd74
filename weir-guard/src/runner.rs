//! Orchestration of a check run.
//!
//! The runner resolves every check's datasources, then executes checks in
//! declaration order, datasource by datasource. Each result is persisted
//! through the [`ResultRecorder`] before it is added to the run report, so a
//! run that aborts midway leaves exactly the results it reported in the store.

use chrono::{Duration, NaiveTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::checks::{compile_queries, measures, CheckExecution};
use crate::config::RunOptions;
use crate::core::{
    evaluate, Check, CheckKind, CheckReport, CheckResult, Condition, RunReport, Threshold, Value,
};
use crate::drivers::{Connections, Driver};
use crate::error::{Result, WeirError};
use crate::log_result;
use crate::logging::LogConfig;
use crate::metric_store::MetricStore;
use crate::sql::Dialect;

/// Number of daily points seeded by [`CheckRunner::generate_sample_data`].
const SAMPLE_DAYS: i64 = 30;

/// Persists results as they are produced.
pub struct ResultRecorder<'a> {
    store: &'a dyn MetricStore,
    log: &'a LogConfig,
}

impl<'a> ResultRecorder<'a> {
    pub fn new(store: &'a dyn MetricStore, log: &'a LogConfig) -> Self {
        Self { store, log }
    }

    /// Inserts `result` into the metric store, then appends it to `results`.
    ///
    /// Any insert failure is a metric store error and aborts the run.
    pub async fn record(&self, result: CheckResult, results: &mut Vec<CheckResult>) -> Result<()> {
        self.store.insert_results(&result).await.map_err(|e| match e {
            WeirError::MetricStore { .. } => e,
            other => WeirError::metric_store_with_source(
                "insert_results",
                format!("Failed to persist result '{}'", result.name),
                Box::new(other),
            ),
        })?;

        log_result!(
            self.log,
            check.name = %result.name,
            check_id = %result.check_id,
            dataset = %result.dataset,
            actual_value = %result.actual_value,
            success = result.success,
            "Recorded check result"
        );
        results.push(result);
        Ok(())
    }
}

/// SQL a check would execute, without executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCheck {
    pub check_name: String,
    pub datasource: String,
    pub dataset: String,
    pub result_name: String,
    pub dialect: Dialect,
    pub sql: String,
}

/// Runs checks against their datasources and records the results.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use datafusion::prelude::SessionContext;
/// use weir_guard::prelude::*;
///
/// # async fn example() -> weir_guard::error::Result<()> {
/// let check = Check::builder("orders_exist")
///     .kind(CheckKind::RowCount)
///     .datasource("warehouse")
///     .dataset("orders")
///     .condition(Condition::Gt)
///     .threshold(0.0)
///     .build();
///
/// let mut connections = Connections::new();
/// connections.insert(
///     "warehouse".to_string(),
///     Arc::new(DataFusionDriver::new("warehouse", SessionContext::new())) as Arc<dyn Driver>,
/// );
/// let store = InMemoryMetricStore::new();
///
/// let report = CheckRunner::default()
///     .run_all("run-1", &[check], &connections, &store)
///     .await?;
/// println!("passed: {}", report.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CheckRunner {
    options: RunOptions,
}

impl CheckRunner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Runs every check, in order, against every datasource it names.
    ///
    /// All datasource names are resolved before anything executes; an
    /// unknown name fails the whole run. A failing check stops the run when
    /// `fail_fast` is set, otherwise its error is kept in its
    /// [`CheckReport`] and the run moves on. Metric store failures always
    /// stop the run.
    #[instrument(skip(self, run_id, checks, connections, metric_store), fields(
        run_id = %run_id,
        checks = checks.len(),
        fail_fast = self.options.fail_fast
    ))]
    pub async fn run_all(
        &self,
        run_id: &str,
        checks: &[Check],
        connections: &Connections,
        metric_store: &dyn MetricStore,
    ) -> Result<RunReport> {
        let resolved = resolve_datasources(checks, connections)?;
        info!(run_id = %run_id, checks = checks.len(), "Starting check run");

        let mut report = RunReport::new(run_id);
        for (check, drivers) in checks.iter().zip(resolved) {
            let mut check_report = CheckReport::new(&check.name);

            for (datasource, driver) in drivers {
                let execution = CheckExecution {
                    run_id,
                    check,
                    datasource,
                    driver: driver.as_ref(),
                    metric_store,
                    options: &self.options,
                };

                if let Err(e) = execution.run(&mut check_report.results).await {
                    if e.aborts_run() || self.options.fail_fast {
                        error!(
                            check.name = %check.name,
                            datasource = %datasource,
                            error = %e,
                            "Check failed, aborting run"
                        );
                        return Err(e);
                    }
                    warn!(
                        check.name = %check.name,
                        datasource = %datasource,
                        error = %e,
                        "Check failed, continuing"
                    );
                    check_report.error = Some(e);
                    break;
                }
            }
            report.reports.push(check_report);
        }

        info!(
            run_id = %run_id,
            results = report.results().count(),
            failed = report.failed_results().count(),
            errors = report.errors().count(),
            "Check run completed"
        );
        Ok(report)
    }

    /// Renders the SQL of every (check, datasource, dataset) combination
    /// without executing anything. `dialects` maps datasource names to the
    /// dialect of their driver. Anomaly checks query the metric store, so
    /// their history queries are rendered in `metric_store_dialect`.
    pub fn compile(
        &self,
        checks: &[Check],
        dialects: &HashMap<String, Dialect>,
        metric_store_dialect: Dialect,
    ) -> Result<Vec<CompiledCheck>> {
        let mut compiled = Vec::new();
        for check in checks {
            check.validate()?;
            for datasource in &check.datasource {
                let datasource_dialect = *dialects
                    .get(datasource)
                    .ok_or_else(|| unconfigured_datasource(check, datasource))?;
                let dialect = if check.kind == CheckKind::Anomaly {
                    metric_store_dialect
                } else {
                    datasource_dialect
                };
                for query in compile_queries(check, &self.options)? {
                    compiled.push(CompiledCheck {
                        check_name: check.name.clone(),
                        datasource: datasource.clone(),
                        dataset: query.dataset,
                        result_name: query.result_name,
                        dialect,
                        sql: query.query.to_sql(dialect),
                    });
                }
            }
        }
        Ok(compiled)
    }

    /// Seeds the metric store with one passing result per day for the last
    /// 30 days and today, per datasource and dataset of the named check.
    ///
    /// Values are drawn so that they satisfy the check's condition. Returns
    /// an empty list when no check has that name.
    #[instrument(skip(self, checks, connections, metric_store))]
    pub async fn generate_sample_data(
        &self,
        check_name: &str,
        checks: &[Check],
        connections: &Connections,
        metric_store: &dyn MetricStore,
    ) -> Result<Vec<CheckResult>> {
        let Some(check) = checks.iter().find(|c| c.name == check_name) else {
            warn!(check.name = %check_name, "No check with that name, nothing generated");
            return Ok(Vec::new());
        };
        check.validate()?;
        let condition = check.condition()?;
        let threshold = check.threshold()?;
        let result_names: Vec<String> = if check.kind == CheckKind::Anomaly {
            vec![check.name.clone()]
        } else {
            measures(check)?.into_iter().map(|m| m.result_name).collect()
        };

        let resolved = resolve_datasources(std::slice::from_ref(check), connections)?;
        let recorder = ResultRecorder::new(metric_store, &self.options.log);
        let run_id = format!("sample-{}", Utc::now().timestamp_millis());
        let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let mut rng = rand::rng();
        let mut results = Vec::new();

        for (datasource, _) in resolved.into_iter().flatten() {
            for dataset in &check.dataset {
                for name in &result_names {
                    for days_ago in (0..=SAMPLE_DAYS).rev() {
                        let value = sample_value(&mut rng, threshold, condition);
                        let success = evaluate(&Value::Float(value), threshold, condition)?;
                        let result = CheckResult::new(
                            check,
                            datasource,
                            dataset,
                            name.clone(),
                            Value::Float(value),
                            success,
                            &run_id,
                        )
                        .with_run_time(today - Duration::days(days_ago));
                        recorder.record(result, &mut results).await?;
                    }
                }
            }
        }

        info!(check.name = %check_name, results = results.len(), "Generated sample data");
        Ok(results)
    }
}

fn unconfigured_datasource(check: &Check, datasource: &str) -> WeirError {
    WeirError::Configuration(format!(
        "Check <{}>: Datasource {datasource} is not configured.",
        check.name
    ))
}

type ResolvedDrivers<'a> = Vec<Vec<(&'a str, &'a Arc<dyn Driver>)>>;

fn resolve_datasources<'a>(
    checks: &'a [Check],
    connections: &'a Connections,
) -> Result<ResolvedDrivers<'a>> {
    checks
        .iter()
        .map(|check| {
            check
                .datasource
                .iter()
                .map(|name| {
                    connections
                        .get(name)
                        .map(|driver| (name.as_str(), driver))
                        .ok_or_else(|| unconfigured_datasource(check, name))
                })
                .collect()
        })
        .collect()
}

/// Draws a value that satisfies `condition` against `threshold`.
fn sample_value(rng: &mut impl Rng, threshold: &Threshold, condition: Condition) -> f64 {
    if let Some((low, high)) = threshold.as_pair() {
        return if low < high {
            rng.random_range(low..=high)
        } else {
            low
        };
    }
    let target = threshold.as_scalar().unwrap_or_default();
    let spread = target.abs().max(10.0);
    match condition {
        Condition::Gt => target + rng.random_range(0.01..=spread),
        Condition::Ge => target + rng.random_range(0.0..=spread),
        Condition::Lt => target - rng.random_range(0.01..=spread),
        Condition::Le => target - rng.random_range(0.0..=spread),
        Condition::Neq => target + rng.random_range(1.0..=spread),
        Condition::Eq | Condition::Between => target,
    }
}
