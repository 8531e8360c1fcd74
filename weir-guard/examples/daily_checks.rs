//! Runs a small suite of checks against an in-process DataFusion warehouse,
//! seeds a month of history and watches it with an anomaly check.
//!
//! ```text
//! cargo run --example daily_checks
//! ```

use datafusion::prelude::*;
use std::sync::Arc;
use weir_guard::core::generate_check_id;
use weir_guard::logging::setup::{init_logging, LoggingConfig};
use weir_guard::prelude::*;

const SUITE: &str = r#"{
    "version": 1,
    "checks": [
        {"name": "orders_exist", "datasource": "warehouse", "dataset": "orders",
         "type": "row_count", "condition": "gt", "threshold": 0},
        {"name": "revenue_by_region", "datasource": "warehouse", "dataset": "orders",
         "type": "sum", "measure": "amount", "dimensions": ["region"],
         "condition": "between", "threshold": [10, 1000]},
        {"name": "contact_nulls", "datasource": "warehouse", "dataset": "orders",
         "type": "not_empty_pct", "dimensions": ["email"],
         "condition": "le", "threshold": 0.25}
    ],
    "options": {"fail_fast": false}
}"#;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default())?;

    let ctx = SessionContext::new();
    ctx.sql(
        "CREATE TABLE orders AS SELECT \
            column1 AS id, column2 AS region, column3 AS amount, column4 AS email \
         FROM (VALUES \
            (1, 'US', 120.0, 'a@example.com'), \
            (2, 'US', 80.5, NULL), \
            (3, 'EU', 42.0, 'c@example.com'), \
            (4, 'EU', 7.25, 'd@example.com'), \
            (5, 'APAC', 5.0, 'e@example.com'))",
    )
    .await?
    .collect()
    .await?;

    let mut connections = Connections::new();
    connections.insert(
        "warehouse".to_string(),
        Arc::new(DataFusionDriver::new("warehouse", ctx)) as Arc<dyn Driver>,
    );
    let store = InMemoryMetricStore::new();

    let suite = SuiteConfig::from_json_str(SUITE)?;
    suite.validate()?;
    let runner = CheckRunner::new(suite.options.clone());

    let report = runner
        .run_all("daily-1", &suite.checks, &connections, &store)
        .await?;
    for result in report.results() {
        let status = if result.success { "PASS" } else { "FAIL" };
        println!("[{status}] {} = {}", result.name, result.actual_value);
    }

    // A month of passing history for the row count, then an anomaly check over it
    runner
        .generate_sample_data("orders_exist", &suite.checks, &connections, &store)
        .await?;

    let anomaly = Check::builder("orders_exist_anomaly")
        .kind(CheckKind::Anomaly)
        .datasource("warehouse")
        .dataset(store.table_name())
        .check_id(generate_check_id("warehouse", "orders_exist", "orders"))
        .condition(Condition::Between)
        .threshold(Threshold::range(-3.5, 3.5))
        .build();

    let report = runner
        .run_all("daily-2", &[anomaly], &connections, &store)
        .await?;
    for result in report.results() {
        println!(
            "anomaly check {}: latest value {}, passed: {}",
            result.name, result.actual_value, result.success
        );
    }

    println!("{} results stored", store.len().await);
    Ok(())
}
