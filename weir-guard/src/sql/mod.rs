//! SQL generation for checks.
//!
//! Checks are compiled into a dialect-neutral [`Query`] and only rendered to
//! SQL text for a concrete [`Dialect`] when a driver executes them. Measures,
//! filters and inline dataset queries are user-written SQL and are emitted
//! verbatim: they are trusted input and are not sanitized.

mod builder;
mod dataset;
mod dialect;
mod query;

pub use builder::{build_query, group_columns, snake_case, time_dimension_alias};
pub use dataset::{parse_dataset, trim_fragment, DatasetRef, DATASET_ALIAS};
pub use dialect::{Dialect, LimitStyle};
pub use query::{OrderBy, Query, QueryBuilder, SelectItem, SqlExpr};
