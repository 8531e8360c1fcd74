//! Check execution.
//!
//! Check kinds differ only in the measure expressions they select:
//!
//! | Kind | Measure |
//! |---|---|
//! | `row_count` | `COUNT(*)` |
//! | `numeric` | the measure, verbatim |
//! | `sum` / `min` / `max` | `SUM(m)` / `MIN(m)` / `MAX(m)` |
//! | `measure` | `MEASURE(m)` |
//! | `not_empty` | per dimension, the NULL count |
//! | `not_empty_pct` | per dimension, the NULL ratio |
//!
//! `anomaly` checks read their history from the metric store instead, see
//! [`anomaly`].

use tracing::instrument;

use crate::config::RunOptions;
use crate::core::{evaluate, Check, CheckKind, CheckResult, Value};
use crate::drivers::Driver;
use crate::error::{Result, WeirError};
use crate::{log_query, perf_debug};
use crate::logging::truncate_field;
use crate::metric_store::MetricStore;
use crate::runner::ResultRecorder;
use crate::sql::{
    build_query, group_columns, parse_dataset, trim_fragment, Query, SelectItem, SqlExpr,
};

pub mod anomaly;

/// One aggregate a check evaluates, and the name its results are recorded
/// under (before any group suffix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub expr: String,
    pub result_name: String,
}

/// Returns the measures a check evaluates against every dataset.
///
/// Anomaly checks have no measure of their own.
pub fn measures(check: &Check) -> Result<Vec<Measure>> {
    let single = |expr: String| -> Result<Vec<Measure>> {
        Ok(vec![Measure {
            expr,
            result_name: check.name.clone(),
        }])
    };

    let measure = || check.measure().map(trim_fragment);

    match check.kind {
        CheckKind::RowCount => single("COUNT(*)".to_string()),
        CheckKind::Numeric => single(measure()?),
        CheckKind::Sum => single(format!("SUM({})", measure()?)),
        CheckKind::Min => single(format!("MIN({})", measure()?)),
        CheckKind::Max => single(format!("MAX({})", measure()?)),
        CheckKind::Measure => single(format!("MEASURE({})", measure()?)),
        CheckKind::NotEmpty | CheckKind::NotEmptyPct => {
            if check.dimensions.is_empty() {
                return Err(WeirError::Configuration(format!(
                    "Check '{}': {} check requires at least one dimension",
                    check.name, check.kind
                )));
            }
            Ok(check
                .dimensions
                .iter()
                .map(|dimension| Measure {
                    expr: null_measure(check.kind, dimension),
                    result_name: format!("{}_{}_{}", check.name, dimension, check.kind),
                })
                .collect())
        }
        CheckKind::Anomaly => Err(WeirError::Internal(format!(
            "Check '{}': anomaly checks have no measure expression",
            check.name
        ))),
    }
}

fn null_measure(kind: CheckKind, dimension: &str) -> String {
    let null_count = format!("SUM(CASE WHEN {dimension} IS NULL THEN 1 ELSE 0 END)");
    if kind == CheckKind::NotEmptyPct {
        format!("CAST({null_count} AS FLOAT) / CAST(COUNT(*) AS FLOAT)")
    } else {
        null_count
    }
}

/// A query compiled for one dataset of a check.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub dataset: String,
    pub result_name: String,
    pub query: Query,
}

/// Compiles every query a check would execute, in execution order.
pub fn compile_queries(check: &Check, options: &RunOptions) -> Result<Vec<CompiledQuery>> {
    if check.kind == CheckKind::Anomaly {
        return check
            .dataset
            .iter()
            .map(|dataset| {
                Ok(CompiledQuery {
                    dataset: dataset.clone(),
                    result_name: check.name.clone(),
                    query: anomaly::history_query(check, dataset, options.history_limit)?,
                })
            })
            .collect();
    }

    let measures = measures(check)?;
    let grouping = !check.kind.is_null_check();
    let mut compiled = Vec::with_capacity(check.dataset.len() * measures.len());
    for dataset in &check.dataset {
        let from = parse_dataset(dataset);
        for measure in &measures {
            let select = vec![SelectItem::new(SqlExpr::raw(&measure.expr))];
            compiled.push(CompiledQuery {
                dataset: dataset.clone(),
                result_name: measure.result_name.clone(),
                query: build_query(select, from.clone(), check, grouping)?,
            });
        }
    }
    Ok(compiled)
}

/// Name of a grouped result: `<name>_<column>_<value>` for every grouping
/// column, in select order.
pub fn grouped_result_name(name: &str, columns: &[String], values: &[Value]) -> String {
    let suffix: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(column, value)| format!("{column}_{value}"))
        .collect();
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{name}_{}", suffix.join("_"))
    }
}

/// Executes one check against one datasource.
pub struct CheckExecution<'a> {
    pub run_id: &'a str,
    pub check: &'a Check,
    pub datasource: &'a str,
    pub driver: &'a dyn Driver,
    pub metric_store: &'a dyn MetricStore,
    pub options: &'a RunOptions,
}

impl<'a> CheckExecution<'a> {
    /// Runs the check over all of its datasets, recording every result and
    /// appending it to `results`.
    ///
    /// The check is validated before any query executes. Results recorded
    /// before an error stay in `results`.
    #[instrument(skip(self, results), fields(
        check.name = %self.check.name,
        check.kind = %self.check.kind,
        datasource = %self.datasource
    ))]
    pub async fn run(&self, results: &mut Vec<CheckResult>) -> Result<()> {
        self.check.validate()?;
        let recorder = ResultRecorder::new(self.metric_store, &self.options.log);

        if self.check.kind == CheckKind::Anomaly {
            return anomaly::run(self, &recorder, results).await;
        }

        let condition = self.check.condition()?;
        let threshold = self.check.threshold()?;
        let grouped = self.check.is_grouped() && !self.check.kind.is_null_check();
        let columns = group_columns(self.check);

        for compiled in compile_queries(self.check, self.options)? {
            let sql = compiled.query.to_sql(self.driver.dialect());
            log_query!(
                self.options.log,
                check.name = %self.check.name,
                dataset = %compiled.dataset,
                query.sql = %truncate_field(&sql, self.options.log.max_field_length),
                "Executing check query"
            );

            let rows = self.driver.execute_query(&compiled.query, self.check).await?;
            perf_debug!(
                self.options.log,
                rows = rows.len(),
                dataset = %compiled.dataset,
                "Query returned"
            );

            if grouped {
                for row in rows {
                    let Some((value, group_values)) = row.split_last() else {
                        return Err(WeirError::unexpected_result(
                            &self.check.name,
                            "query returned a row without columns",
                        ));
                    };
                    let success = evaluate(value, threshold, condition)?;
                    let name = grouped_result_name(&compiled.result_name, &columns, group_values);
                    let result = CheckResult::new(
                        self.check,
                        self.datasource,
                        &compiled.dataset,
                        name,
                        value.clone(),
                        success,
                        self.run_id,
                    )
                    .with_group_values(group_values.to_vec());
                    recorder.record(result, results).await?;
                }
            } else {
                let value = rows
                    .first()
                    .and_then(|row| row.first())
                    .cloned()
                    .ok_or_else(|| {
                        WeirError::unexpected_result(&self.check.name, "query returned no rows")
                    })?;
                let success = evaluate(&value, threshold, condition)?;
                let result = CheckResult::new(
                    self.check,
                    self.datasource,
                    &compiled.dataset,
                    compiled.result_name,
                    value,
                    success,
                    self.run_id,
                );
                recorder.record(result, results).await?;
            }
        }
        Ok(())
    }
}
