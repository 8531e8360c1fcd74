//! # weir-guard - Data Quality Checks for SQL Datasets
//!
//! weir-guard runs declarative data-quality checks (row counts, aggregates,
//! null rates, anomaly detection) against tables living in heterogeneous SQL
//! backends. Each check is compiled into dialect-correct SQL, executed by a
//! datasource driver, evaluated against a threshold, and persisted to a
//! metric store so that later runs can look at its history.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use datafusion::prelude::SessionContext;
//! use weir_guard::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> weir_guard::error::Result<()> {
//! // A datasource: here a DataFusion session with an `orders` table
//! let ctx = SessionContext::new();
//! ctx.sql("CREATE TABLE orders AS SELECT column1 AS id, column2 AS amount \
//!          FROM (VALUES (1, 10.0), (2, 25.0), (3, 7.5))")
//!     .await?
//!     .collect()
//!     .await?;
//!
//! let mut connections = Connections::new();
//! connections.insert(
//!     "warehouse".to_string(),
//!     Arc::new(DataFusionDriver::new("warehouse", ctx)) as Arc<dyn Driver>,
//! );
//!
//! let checks = vec![
//!     Check::builder("orders_exist")
//!         .kind(CheckKind::RowCount)
//!         .datasource("warehouse")
//!         .dataset("orders")
//!         .condition(Condition::Gt)
//!         .threshold(0.0)
//!         .build(),
//!     Check::builder("order_volume")
//!         .kind(CheckKind::Sum)
//!         .datasource("warehouse")
//!         .dataset("orders")
//!         .measure("amount")
//!         .condition(Condition::Between)
//!         .threshold((10.0, 100.0))
//!         .build(),
//! ];
//!
//! let store = InMemoryMetricStore::new();
//! let report = CheckRunner::default()
//!     .run_all("run-1", &checks, &connections, &store)
//!     .await?;
//!
//! assert!(report.is_success());
//! assert_eq!(store.len().await, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Check kinds
//!
//! | Kind | Measures |
//! |---|---|
//! | `row_count` | `COUNT(*)` |
//! | `numeric` | a raw SQL expression, e.g. `avg(amount)` |
//! | `sum`, `min`, `max` | the aggregate of the measure |
//! | `measure` | `MEASURE(<measure>)` for semantic-layer sources |
//! | `not_empty`, `not_empty_pct` | NULL count / ratio, per dimension |
//! | `anomaly` | robust z-score of a check's history in the metric store |
//!
//! Checks with `dimensions` or a `time_dimension` produce one result per
//! group. Filters, measures and inline dataset queries are user-written SQL
//! and are passed through verbatim.
//!
//! ## Architecture
//!
//! ```text
//! CheckRunner
//!     ├── checks        kind → measures → sql::build_query → Query
//!     ├── drivers       Query → dialect SQL → rows
//!     ├── core          evaluate(value, threshold, condition)
//!     └── ResultRecorder → MetricStore (history for anomaly checks)
//! ```
//!
//! ## Logging
//!
//! weir-guard logs through `tracing`. Install a subscriber with
//! [`logging::setup::init_logging`] and use [`logging::LogConfig`] in the
//! [`config::RunOptions`] to log rendered SQL and recorded results.

pub mod checks;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod logging;
pub mod metric_store;
pub mod prelude;
pub mod runner;
pub mod sql;
