//! Turns a check and its measure expressions into a [`Query`].

use once_cell::sync::Lazy;
use regex::Regex;

use super::dataset::DatasetRef;
use super::query::{Query, SelectItem, SqlExpr};
use crate::core::Check;
use crate::error::Result;

static UPPER_RUN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([A-Z]+)").expect("Hard-coded regex pattern should be valid")
});

static CAPITALIZED_WORD: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([A-Z][a-z]+)").expect("Hard-coded regex pattern should be valid")
});

/// Lower-snake-cases a string: `"created_at day"` becomes `created_at_day`,
/// `"CamelCase"` becomes `camel_case`.
pub fn snake_case(value: &str) -> String {
    let spaced = value.replace('-', " ");
    let spaced = UPPER_RUN.replace_all(&spaced, " ${1}");
    let spaced = CAPITALIZED_WORD.replace_all(&spaced, " ${1}");
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Alias of the time-bucket column of a check, if it has a time dimension.
pub fn time_dimension_alias(check: &Check) -> Option<String> {
    check
        .time_dimension
        .as_ref()
        .map(|td| snake_case(&format!("{} {}", td.name, td.granularity)))
}

/// Names of the grouping columns a grouped check returns before its value:
/// the dimensions, then the time-bucket alias.
pub fn group_columns(check: &Check) -> Vec<String> {
    let mut columns = check.dimensions.clone();
    columns.extend(time_dimension_alias(check));
    columns
}

/// Builds the query of one check over one dataset.
///
/// The select list is the dimensions, then the aliased time bucket, then
/// `measures`. Grouped queries carry a GROUP BY in the same order and no
/// limit; scalar queries read one row. With `grouping` off the check's
/// dimensions and time bucket are ignored and the query is a single
/// aggregate. The filter is applied verbatim.
pub fn build_query(
    measures: Vec<SelectItem>,
    from: DatasetRef,
    check: &Check,
    grouping: bool,
) -> Result<Query> {
    let mut builder = Query::builder(from);
    let mut grouped = false;

    if grouping {
        for dimension in &check.dimensions {
            builder = builder
                .select(SelectItem::new(SqlExpr::raw(dimension)))
                .group_by(SqlExpr::raw(dimension));
            grouped = true;
        }

        if let (Some(td), Some(alias)) = (&check.time_dimension, time_dimension_alias(check)) {
            let trunc = SqlExpr::date_trunc(td.granularity, &td.name);
            builder = builder
                .select(SelectItem::aliased(trunc.clone(), alias))
                .group_by(trunc);
            grouped = true;
        }
    }

    for measure in measures {
        builder = builder.select(measure);
    }

    if let Some(filter) = &check.filter {
        builder = builder.filter(filter);
    }

    if !grouped {
        builder = builder.limit(1);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CheckKind, Condition, Granularity};
    use crate::sql::Dialect;

    fn measure(sql: &str) -> Vec<SelectItem> {
        vec![SelectItem::new(SqlExpr::raw(sql))]
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("created_at day"), "created_at_day");
        assert_eq!(snake_case("CamelCase"), "camel_case");
        assert_eq!(snake_case("UPPER CASE"), "upper_case");
        assert_eq!(snake_case("order-date month"), "order_date_month");
    }

    #[test]
    fn test_scalar_check_gets_limit() {
        let check = Check::builder("c")
            .kind(CheckKind::RowCount)
            .dataset("orders")
            .condition(Condition::Gt)
            .threshold(0.0)
            .filter("amount > 0")
            .build();
        let query = build_query(measure("COUNT(*)"), DatasetRef::table("orders"), &check, true)
            .unwrap();

        assert_eq!(query.limit(), Some(1));
        assert!(query.group_by().is_empty());
        assert_eq!(
            query.to_sql(Dialect::Generic),
            "SELECT COUNT(*) FROM orders WHERE amount > 0 LIMIT 1"
        );
    }

    #[test]
    fn test_dimensions_and_time_bucket() {
        let check = Check::builder("c")
            .kind(CheckKind::Sum)
            .dataset("orders")
            .measure("amount")
            .dimension("country")
            .dimension("status")
            .time_dimension("created_at", Granularity::Day)
            .condition(Condition::Gt)
            .threshold(0.0)
            .build();
        let query = build_query(measure("SUM(amount)"), DatasetRef::table("orders"), &check, true)
            .unwrap();

        assert_eq!(query.limit(), None);
        assert_eq!(
            query.to_sql(Dialect::Postgres),
            "SELECT country, status, DATE_TRUNC('day', created_at) AS created_at_day, SUM(amount) \
             FROM orders GROUP BY country, status, DATE_TRUNC('day', created_at)"
        );
        assert_eq!(
            group_columns(&check),
            vec!["country".to_string(), "status".to_string(), "created_at_day".to_string()]
        );
    }

    #[test]
    fn test_grouping_disabled() {
        let check = Check::builder("c")
            .kind(CheckKind::NotEmpty)
            .dataset("orders")
            .dimension("email")
            .time_dimension("created_at", Granularity::Month)
            .condition(Condition::Le)
            .build();
        let query = build_query(
            measure("SUM(CASE WHEN email IS NULL THEN 1 ELSE 0 END)"),
            DatasetRef::table("orders"),
            &check,
            false,
        )
        .unwrap();

        assert!(query.group_by().is_empty());
        assert_eq!(query.limit(), Some(1));
    }
}
