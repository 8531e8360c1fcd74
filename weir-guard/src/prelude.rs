//! Prelude for commonly used types and traits in weir-guard.

pub use crate::config::{RunOptions, SuiteConfig};
pub use crate::core::{
    Check, CheckKind, CheckReport, CheckResult, Condition, Granularity, RunReport, Threshold, Value,
};
pub use crate::drivers::{Connections, DataFusionDriver, Driver};
pub use crate::error::{Result, WeirError};
pub use crate::logging::LogConfig;
pub use crate::metric_store::{InMemoryMetricStore, MetricStore};
pub use crate::runner::CheckRunner;
pub use crate::sql::Dialect;
