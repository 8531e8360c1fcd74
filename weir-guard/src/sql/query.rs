//! The dialect-neutral query representation.

use std::fmt;

use super::dataset::{trim_fragment, DatasetRef};
use super::dialect::{Dialect, LimitStyle};
use crate::core::Granularity;
use crate::error::{Result, WeirError};

/// A SQL expression. Raw fragments are emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlExpr {
    Raw(String),
    /// Truncation of a timestamp column, rendered per dialect
    DateTrunc {
        granularity: Granularity,
        column: String,
    },
}

impl SqlExpr {
    pub fn raw(sql: impl Into<String>) -> Self {
        SqlExpr::Raw(sql.into())
    }

    pub fn date_trunc(granularity: Granularity, column: impl Into<String>) -> Self {
        SqlExpr::DateTrunc {
            granularity,
            column: column.into(),
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            SqlExpr::Raw(sql) => sql.clone(),
            SqlExpr::DateTrunc {
                granularity,
                column,
            } => dialect.date_trunc(*granularity, column),
        }
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: SqlExpr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: SqlExpr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    fn to_sql(&self, dialect: Dialect) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {alias}", self.expr.to_sql(dialect)),
            None => self.expr.to_sql(dialect),
        }
    }
}

/// Sort key of an ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub expr: SqlExpr,
    pub ascending: bool,
}

/// An immutable SELECT query.
///
/// Built once per (check, dataset) pair and rendered to SQL text for a
/// concrete [`Dialect`] only when it is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    select: Vec<SelectItem>,
    from: DatasetRef,
    predicates: Vec<String>,
    group_by: Vec<SqlExpr>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    pub fn builder(from: DatasetRef) -> QueryBuilder {
        QueryBuilder::new(from)
    }

    pub fn select(&self) -> &[SelectItem] {
        &self.select
    }

    pub fn from(&self) -> &DatasetRef {
        &self.from
    }

    /// Returns the WHERE predicates, combined with AND when rendered.
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn group_by(&self) -> &[SqlExpr] {
        &self.group_by
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Renders the query as SQL text for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = String::from("SELECT ");
        let limit_style = dialect.limit_style();

        if let (Some(limit), LimitStyle::Top) = (self.limit, limit_style) {
            sql.push_str(&format!("TOP {limit} "));
        }

        let select: Vec<String> = self.select.iter().map(|s| s.to_sql(dialect)).collect();
        sql.push_str(&select.join(", "));
        sql.push_str(&format!(" FROM {}", self.from));

        match self.predicates.as_slice() {
            [] => {}
            [single] => sql.push_str(&format!(" WHERE {single}")),
            many => {
                let parts: Vec<String> = many.iter().map(|p| format!("({p})")).collect();
                sql.push_str(&format!(" WHERE {}", parts.join(" AND ")));
            }
        }

        if !self.group_by.is_empty() {
            let keys: Vec<String> = self.group_by.iter().map(|g| g.to_sql(dialect)).collect();
            sql.push_str(&format!(" GROUP BY {}", keys.join(", ")));
        }

        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let direction = if o.ascending { "ASC" } else { "DESC" };
                    format!("{} {direction}", o.expr.to_sql(dialect))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }

        if let (Some(limit), LimitStyle::Limit) = (self.limit, limit_style) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(Dialect::Generic))
    }
}

/// Builder for [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    fn new(from: DatasetRef) -> Self {
        Self {
            query: Query {
                select: Vec::new(),
                from,
                predicates: Vec::new(),
                group_by: Vec::new(),
                order_by: Vec::new(),
                limit: None,
            },
        }
    }

    pub fn select(mut self, item: SelectItem) -> Self {
        self.query.select.push(item);
        self
    }

    /// Adds a raw, unaliased select expression.
    pub fn select_raw(self, sql: impl Into<String>) -> Self {
        self.select(SelectItem::new(SqlExpr::raw(sql)))
    }

    /// Adds a WHERE predicate. Multiple predicates are combined with AND.
    ///
    /// Trailing comments and semicolons are stripped so the predicate cannot
    /// swallow the clauses rendered after it.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.query.predicates.push(trim_fragment(&predicate.into()));
        self
    }

    pub fn group_by(mut self, expr: SqlExpr) -> Self {
        self.query.group_by.push(expr);
        self
    }

    pub fn order_by(mut self, expr: SqlExpr, ascending: bool) -> Self {
        self.query.order_by.push(OrderBy { expr, ascending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds the query. A query must select at least one expression.
    pub fn build(self) -> Result<Query> {
        if self.query.select.is_empty() {
            return Err(WeirError::Internal(format!(
                "query over {} has an empty select list",
                self.query.from
            )));
        }
        Ok(self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_query_rendering() {
        let query = Query::builder(DatasetRef::table("orders"))
            .select_raw("COUNT(*)")
            .filter("status = 'paid'")
            .limit(1)
            .build()
            .unwrap();

        assert_eq!(
            query.to_sql(Dialect::Postgres),
            "SELECT COUNT(*) FROM orders WHERE status = 'paid' LIMIT 1"
        );
        assert_eq!(
            query.to_sql(Dialect::MsSql),
            "SELECT TOP 1 COUNT(*) FROM orders WHERE status = 'paid'"
        );
    }

    #[test]
    fn test_grouped_query_rendering() {
        let trunc = SqlExpr::date_trunc(Granularity::Day, "created_at");
        let query = Query::builder(DatasetRef::table("orders"))
            .select_raw("country")
            .select(SelectItem::aliased(trunc.clone(), "created_at_day"))
            .select_raw("SUM(amount)")
            .group_by(SqlExpr::raw("country"))
            .group_by(trunc)
            .build()
            .unwrap();

        assert_eq!(
            query.to_sql(Dialect::Snowflake),
            "SELECT country, DATE_TRUNC('day', created_at) AS created_at_day, SUM(amount) \
             FROM orders GROUP BY country, DATE_TRUNC('day', created_at)"
        );
        assert_eq!(query.limit(), None);
    }

    #[test]
    fn test_multiple_predicates_and_order() {
        let query = Query::builder(DatasetRef::table("metrics"))
            .select_raw("actual_value")
            .filter("check_id LIKE 'abc%'")
            .filter("dataset = 'orders' OR dataset = 'refunds'")
            .order_by(SqlExpr::raw("run_time"), true)
            .limit(10)
            .build()
            .unwrap();

        assert_eq!(
            query.to_string(),
            "SELECT actual_value FROM metrics WHERE (check_id LIKE 'abc%') AND \
             (dataset = 'orders' OR dataset = 'refunds') ORDER BY run_time ASC LIMIT 10"
        );
    }

    #[test]
    fn test_commented_predicates_keep_later_clauses() {
        let query = Query::builder(DatasetRef::table("orders"))
            .select_raw("COUNT(*)")
            .filter("country = 'US' -- US only")
            .filter("amount > 0;")
            .limit(1)
            .build()
            .unwrap();

        assert_eq!(
            query.to_sql(Dialect::Postgres),
            "SELECT COUNT(*) FROM orders WHERE (country = 'US') AND (amount > 0) LIMIT 1"
        );
    }

    #[test]
    fn test_empty_select_is_rejected() {
        assert!(Query::builder(DatasetRef::table("orders")).build().is_err());
    }
}
