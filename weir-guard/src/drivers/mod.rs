//! Datasource drivers.
//!
//! A [`Driver`] renders a [`Query`] in its own dialect, executes it against
//! one datasource and returns every row. Connection management, retries and
//! timeouts belong to the driver; the engine only awaits the call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Check, Row};
use crate::error::{Result, WeirError};
use crate::sql::{Dialect, Query};

mod datafusion;

pub use self::datafusion::DataFusionDriver;

/// Datasource connections of a run, keyed by datasource name.
pub type Connections = HashMap<String, Arc<dyn Driver>>;

/// Executes check queries against one datasource.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The dialect queries are rendered in.
    fn dialect(&self) -> Dialect;

    /// Executes `query` on behalf of `check` and returns all rows.
    ///
    /// Implementations must return [`WeirError::UnexpectedResult`] when the
    /// query yields no rows. A row holding a NULL is a valid result.
    async fn execute_query(&self, query: &Query, check: &Check) -> Result<Vec<Row>>;
}

/// Rejects empty result sets as required by the [`Driver`] contract.
pub fn ensure_rows(check: &Check, rows: Vec<Row>) -> Result<Vec<Row>> {
    if rows.is_empty() {
        return Err(WeirError::unexpected_result(
            &check.name,
            "query returned no rows",
        ));
    }
    if rows.iter().any(|row| row.is_empty()) {
        return Err(WeirError::unexpected_result(
            &check.name,
            "query returned a row without columns",
        ));
    }
    Ok(rows)
}
