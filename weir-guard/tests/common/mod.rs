//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use weir_guard::core::{Check, CheckResult, Row, Value};
use weir_guard::drivers::{ensure_rows, Connections, DataFusionDriver, Driver};
use weir_guard::error::{Result, WeirError};
use weir_guard::metric_store::MetricStore;
use weir_guard::sql::{Dialect, Query};

/// A driver returning canned rows and recording every rendered query.
pub struct MockDriver {
    dialect: Dialect,
    responses: Mutex<VecDeque<Vec<Row>>>,
    fallback: Vec<Row>,
    queries: Mutex<Vec<String>>,
}

impl MockDriver {
    /// Answers every query with `rows`.
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            dialect: Dialect::Postgres,
            responses: Mutex::new(VecDeque::new()),
            fallback: rows,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Answers queries with `responses` in order, then with no rows.
    pub fn with_responses(responses: Vec<Vec<Row>>) -> Self {
        Self {
            dialect: Dialect::Postgres,
            responses: Mutex::new(responses.into()),
            fallback: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::returning(vec![vec![value.into()]])
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute_query(&self, query: &Query, check: &Check) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(query.to_sql(self.dialect));
        let rows = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        ensure_rows(check, rows)
    }
}

/// A metric store whose inserts always fail.
#[derive(Default)]
pub struct FailingMetricStore {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl MetricStore for FailingMetricStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table_name(&self) -> &str {
        "metrics"
    }

    async fn insert_results(&self, _result: &CheckResult) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(WeirError::metric_store("insert_results", "connection refused"))
    }

    async fn execute_query(&self, _: &Query, _: &Check, _: bool) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

pub fn connections(drivers: Vec<(&str, Arc<dyn Driver>)>) -> Connections {
    drivers
        .into_iter()
        .map(|(name, driver)| (name.to_string(), driver))
        .collect()
}

/// A DataFusion datasource with `orders` and `customers` tables.
pub async fn warehouse() -> DataFusionDriver {
    let ctx = SessionContext::new();
    for sql in [
        "CREATE TABLE orders AS SELECT \
            column1 AS id, column2 AS country, column3 AS amount, \
            CAST(column4 AS TIMESTAMP) AS created_at \
         FROM (VALUES \
            (1, 'US', 10.0, '2024-01-01 09:00:00'), \
            (2, 'US', 20.0, '2024-01-01 17:30:00'), \
            (3, 'DE', 5.0, '2024-01-01 12:00:00'), \
            (4, 'US', 40.0, '2024-01-02 08:15:00'), \
            (5, 'DE', 15.0, '2024-01-02 22:45:00'))",
        "CREATE TABLE customers AS SELECT \
            column1 AS id, column2 AS email, column3 AS phone \
         FROM (VALUES \
            (1, 'a@example.com', '555-0100'), \
            (2, NULL, '555-0101'), \
            (3, 'c@example.com', NULL), \
            (4, 'd@example.com', '555-0103'))",
    ] {
        ctx.sql(sql).await.unwrap().collect().await.unwrap();
    }
    DataFusionDriver::new("warehouse", ctx)
}
