//! In-memory implementation of [`MetricStore`], queryable through DataFusion.

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::execution::context::SessionConfig;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::MetricStore;
use crate::core::{rows_from_batches, Check, CheckResult, Row, Threshold};
use crate::drivers::ensure_rows;
use crate::error::{Result, WeirError};
use crate::sql::{Dialect, Query};

/// Default name of the results table.
pub const DEFAULT_METRICS_TABLE: &str = "metrics";

/// Stores results in memory and answers queries by materialising them into an
/// Arrow table registered in a fresh DataFusion session.
///
/// Clones share the same storage.
///
/// # Example
///
/// ```rust,no_run
/// use weir_guard::metric_store::{InMemoryMetricStore, MetricStore};
///
/// # async fn example(result: weir_guard::core::CheckResult) -> weir_guard::error::Result<()> {
/// let store = InMemoryMetricStore::new();
/// store.insert_results(&result).await?;
/// assert_eq!(store.len().await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryMetricStore {
    records: Arc<RwLock<Vec<CheckResult>>>,
    table_name: String,
}

impl InMemoryMetricStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::with_table_name(DEFAULT_METRICS_TABLE)
    }

    /// Creates a new empty store whose results table has the given name.
    pub fn with_table_name(table_name: impl Into<String>) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            table_name: table_name.into(),
        }
    }

    /// Returns the number of stored results.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Returns a snapshot of the stored results, in insertion order.
    pub async fn results(&self) -> Vec<CheckResult> {
        self.records.read().await.clone()
    }

    /// Removes every stored result.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    fn create_context() -> SessionContext {
        let config = SessionConfig::new()
            .with_target_partitions(num_cpus::get())
            .with_batch_size(8192);
        SessionContext::new_with_config(config)
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("check_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("type", DataType::Utf8, false),
            Field::new("datasource", DataType::Utf8, false),
            Field::new("dataset", DataType::Utf8, false),
            Field::new("measure", DataType::Utf8, true),
            Field::new("condition", DataType::Utf8, true),
            Field::new("threshold", DataType::Float64, true),
            Field::new("threshold_list", DataType::Utf8, true),
            Field::new("dimensions", DataType::Utf8, true),
            Field::new("filter", DataType::Utf8, true),
            Field::new("actual_value", DataType::Float64, true),
            Field::new("success", DataType::Boolean, false),
            Field::new("fail", DataType::Boolean, false),
            Field::new("run_id", DataType::Utf8, false),
            Field::new(
                "run_time",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
        ]))
    }

    /// Converts stored results into a single Arrow record batch.
    fn create_record_batch(records: &[CheckResult]) -> Result<RecordBatch> {
        fn text<'a>(records: &'a [CheckResult], f: impl Fn(&'a CheckResult) -> &'a str) -> ArrayRef {
            Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
        }
        fn optional_text(
            records: &[CheckResult],
            f: impl Fn(&CheckResult) -> Option<String>,
        ) -> ArrayRef {
            Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
        }

        let threshold: Float64Array = records
            .iter()
            .map(|r| r.threshold.as_ref().and_then(Threshold::as_scalar))
            .collect();
        let threshold_list = records
            .iter()
            .map(|r| match &r.threshold {
                Some(Threshold::List(values)) => serde_json::to_string(values).map(Some),
                _ => Ok(None),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let dimensions = records
            .iter()
            .map(|r| serde_json::to_string(&r.dimensions).map(Some))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let actual_value: Float64Array = records.iter().map(|r| r.actual_value.as_f64()).collect();
        let run_time = TimestampMicrosecondArray::from(
            records
                .iter()
                .map(|r| r.run_time.timestamp_micros())
                .collect::<Vec<_>>(),
        )
        .with_timezone("UTC");

        let columns: Vec<ArrayRef> = vec![
            text(records, |r| &r.check_id),
            text(records, |r| &r.name),
            text(records, |r| r.kind.as_str()),
            text(records, |r| &r.datasource),
            text(records, |r| &r.dataset),
            optional_text(records, |r| r.measure.clone()),
            optional_text(records, |r| r.condition.map(|c| c.to_string())),
            Arc::new(threshold),
            Arc::new(StringArray::from(threshold_list)),
            Arc::new(StringArray::from(dimensions)),
            optional_text(records, |r| r.filter.clone()),
            Arc::new(actual_value),
            Arc::new(BooleanArray::from(records.iter().map(|r| r.success).collect::<Vec<_>>())),
            Arc::new(BooleanArray::from(records.iter().map(|r| r.fail).collect::<Vec<_>>())),
            text(records, |r| &r.run_id),
            Arc::new(run_time),
        ];

        RecordBatch::try_new(Self::schema(), columns).map_err(|e| {
            WeirError::metric_store_with_source(
                "execute_query",
                format!("Failed to create Arrow RecordBatch for {} results", records.len()),
                Box::new(e),
            )
        })
    }
}

impl Default for InMemoryMetricStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    fn dialect(&self) -> Dialect {
        Dialect::DataFusion
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }

    #[instrument(skip(self, result), fields(check_id = %result.check_id, store_type = "in_memory"))]
    async fn insert_results(&self, result: &CheckResult) -> Result<()> {
        self.records.write().await.push(result.clone());
        Ok(())
    }

    #[instrument(skip(self, query, check), fields(check.name = %check.name, store_type = "in_memory"))]
    async fn execute_query(
        &self,
        query: &Query,
        check: &Check,
        validate_results: bool,
    ) -> Result<Vec<Row>> {
        let batch = {
            let records = self.records.read().await;
            Self::create_record_batch(&records)?
        };

        // A fresh context per query keeps registered tables from colliding
        let ctx = Self::create_context();
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]]).map_err(|e| {
            WeirError::metric_store_with_source(
                "execute_query",
                "Failed to create DataFusion table from Arrow data",
                Box::new(e),
            )
        })?;
        ctx.register_table(self.table_name.as_str(), Arc::new(table))
            .map_err(|e| {
                WeirError::metric_store_with_source(
                    "execute_query",
                    "Failed to register results table with DataFusion context",
                    Box::new(e),
                )
            })?;

        let sql = query.to_sql(self.dialect());
        debug!(query.sql = %sql, "Querying metric store");

        let df = ctx.sql(&sql).await.map_err(|e| {
            WeirError::metric_store_with_source(
                "execute_query",
                format!("Failed to plan query: {sql}"),
                Box::new(e),
            )
        })?;
        let batches = df.collect().await.map_err(|e| {
            WeirError::metric_store_with_source(
                "execute_query",
                "Failed to execute query",
                Box::new(e),
            )
        })?;

        let rows = rows_from_batches(&batches)?;
        if validate_results {
            ensure_rows(check, rows)
        } else {
            Ok(rows)
        }
    }
}
