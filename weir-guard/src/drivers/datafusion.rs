//! A [`Driver`] backed by a DataFusion [`SessionContext`].

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use tracing::{debug, instrument};

use super::{ensure_rows, Driver};
use crate::core::{rows_from_batches, Check, Row};
use crate::error::{Result, WeirError};
use crate::sql::{Dialect, Query};

/// Runs check queries on the tables registered in a DataFusion session.
///
/// # Examples
///
/// ```rust,no_run
/// use datafusion::prelude::SessionContext;
/// use weir_guard::drivers::DataFusionDriver;
///
/// # async fn example() -> weir_guard::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.sql("CREATE TABLE orders AS SELECT column1 AS id FROM (VALUES (1), (2))")
///     .await?
///     .collect()
///     .await?;
/// let driver = DataFusionDriver::new("warehouse", ctx);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionDriver {
    datasource: String,
    ctx: SessionContext,
}

impl DataFusionDriver {
    pub fn new(datasource: impl Into<String>, ctx: SessionContext) -> Self {
        Self {
            datasource: datasource.into(),
            ctx,
        }
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    /// The session the driver executes in, e.g. to register more tables.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

#[async_trait]
impl Driver for DataFusionDriver {
    fn dialect(&self) -> Dialect {
        Dialect::DataFusion
    }

    #[instrument(skip(self, query, check), fields(datasource = %self.datasource, check.name = %check.name))]
    async fn execute_query(&self, query: &Query, check: &Check) -> Result<Vec<Row>> {
        let sql = query.to_sql(self.dialect());
        debug!(query.sql = %sql, "Executing check query");

        let df = self.ctx.sql(&sql).await.map_err(|e| {
            WeirError::driver_with_source(
                &self.datasource,
                format!("Failed to plan query: {sql}"),
                Box::new(e),
            )
        })?;
        let batches = df.collect().await.map_err(|e| {
            WeirError::driver_with_source(
                &self.datasource,
                "Failed to execute query",
                Box::new(e),
            )
        })?;

        ensure_rows(check, rows_from_batches(&batches)?)
    }
}
