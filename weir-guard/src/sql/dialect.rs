//! SQL dialects and the rendering differences between them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::Granularity;
use crate::error::{Result, WeirError};

/// A SQL dialect a [`Query`](super::Query) can be rendered to.
///
/// Only the constructs the check engine generates differ between dialects:
/// time truncation and row limiting. User-supplied fragments (measures,
/// filters, dataset queries) are emitted verbatim in every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    DataFusion,
    Postgres,
    MySql,
    Snowflake,
    BigQuery,
    Databricks,
    DuckDb,
    MsSql,
}

/// How a dialect restricts the number of returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `... LIMIT n`
    Limit,
    /// `SELECT TOP n ...`
    Top,
}

impl Dialect {
    pub const ALL: [Dialect; 9] = [
        Dialect::Generic,
        Dialect::DataFusion,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Snowflake,
        Dialect::BigQuery,
        Dialect::Databricks,
        Dialect::DuckDb,
        Dialect::MsSql,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "generic",
            Dialect::DataFusion => "datafusion",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Snowflake => "snowflake",
            Dialect::BigQuery => "bigquery",
            Dialect::Databricks => "databricks",
            Dialect::DuckDb => "duckdb",
            Dialect::MsSql => "mssql",
        }
    }

    pub fn limit_style(&self) -> LimitStyle {
        match self {
            Dialect::MsSql => LimitStyle::Top,
            _ => LimitStyle::Limit,
        }
    }

    /// Renders the truncation of `column` to `granularity`.
    pub fn date_trunc(&self, granularity: Granularity, column: &str) -> String {
        match self {
            Dialect::BigQuery => format!(
                "TIMESTAMP_TRUNC({column}, {})",
                granularity.as_str().to_uppercase()
            ),
            Dialect::MsSql => format!("DATETRUNC({granularity}, {column})"),
            Dialect::MySql => mysql_date_trunc(granularity, column),
            _ => format!("DATE_TRUNC('{granularity}', {column})"),
        }
    }
}

// MySQL has no DATE_TRUNC; buckets are rebuilt from formatted parts.
fn mysql_date_trunc(granularity: Granularity, column: &str) -> String {
    let format = match granularity {
        Granularity::Second => "%Y-%m-%d %H:%i:%s",
        Granularity::Minute => "%Y-%m-%d %H:%i:00",
        Granularity::Hour => "%Y-%m-%d %H:00:00",
        Granularity::Day => "%Y-%m-%d",
        Granularity::Month => "%Y-%m-01",
        Granularity::Year => "%Y-01-01",
        Granularity::Week => {
            return format!("DATE_SUB(DATE({column}), INTERVAL WEEKDAY({column}) DAY)")
        }
        Granularity::Quarter => {
            return format!(
                "MAKEDATE(YEAR({column}), 1) + INTERVAL QUARTER({column}) - 1 QUARTER"
            )
        }
    };
    format!("DATE_FORMAT({column}, '{format}')")
}

impl FromStr for Dialect {
    type Err = WeirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Dialect::Generic),
            "datafusion" => Ok(Dialect::DataFusion),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "snowflake" => Ok(Dialect::Snowflake),
            "bigquery" => Ok(Dialect::BigQuery),
            "databricks" => Ok(Dialect::Databricks),
            "duckdb" => Ok(Dialect::DuckDb),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            other => Err(WeirError::NotSupported(format!(
                "Dialect {other} not implemented yet"
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_trunc_per_dialect() {
        assert_eq!(
            Dialect::Postgres.date_trunc(Granularity::Day, "created_at"),
            "DATE_TRUNC('day', created_at)"
        );
        assert_eq!(
            Dialect::BigQuery.date_trunc(Granularity::Month, "created_at"),
            "TIMESTAMP_TRUNC(created_at, MONTH)"
        );
        assert_eq!(
            Dialect::MsSql.date_trunc(Granularity::Hour, "created_at"),
            "DATETRUNC(hour, created_at)"
        );
        assert_eq!(
            Dialect::MySql.date_trunc(Granularity::Day, "created_at"),
            "DATE_FORMAT(created_at, '%Y-%m-%d')"
        );
        assert!(Dialect::MySql
            .date_trunc(Granularity::Week, "ts")
            .starts_with("DATE_SUB(DATE(ts)"));
    }

    #[test]
    fn test_limit_style() {
        assert_eq!(Dialect::MsSql.limit_style(), LimitStyle::Top);
        assert_eq!(Dialect::Snowflake.limit_style(), LimitStyle::Limit);
    }

    #[test]
    fn test_parse_dialect() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(WeirError::NotSupported(_))
        ));
    }
}
