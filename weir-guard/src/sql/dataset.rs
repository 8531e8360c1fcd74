//! Dataset references: plain table names or inline SQL queries.

use datafusion::sql::sqlparser::ast::visit_relations;
use datafusion::sql::sqlparser::dialect::{
    BigQueryDialect, DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect,
    PostgreSqlDialect, SnowflakeDialect,
};
use datafusion::sql::sqlparser::parser::Parser;
use datafusion::sql::sqlparser::tokenizer::{Location, Token, Tokenizer};
use std::fmt;
use std::ops::ControlFlow;

type SqlParserDialect = dyn datafusion::sql::sqlparser::dialect::Dialect;

/// Alias given to inline dataset queries.
pub const DATASET_ALIAS: &str = "dataset_";

/// Parser dialects tried in turn when classifying a dataset string.
const PARSER_DIALECTS: [&SqlParserDialect; 7] = [
    &GenericDialect {},
    &MsSqlDialect {},
    &BigQueryDialect {},
    &SnowflakeDialect {},
    &MySqlDialect {},
    &PostgreSqlDialect {},
    &DuckDbDialect {},
];

/// The FROM target of a check query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetRef {
    /// A table (or view) name, emitted as written
    Table(String),
    /// An inline query, emitted as an aliased derived table
    Subquery { sql: String, alias: String },
}

impl DatasetRef {
    pub fn table(name: impl Into<String>) -> Self {
        DatasetRef::Table(name.into())
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, DatasetRef::Subquery { .. })
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetRef::Table(name) => f.write_str(name),
            DatasetRef::Subquery { sql, alias } => write!(f, "({sql}) AS {alias}"),
        }
    }
}

/// Classifies a dataset string.
///
/// A string that parses as SQL in any supported vendor dialect and references
/// at least one table is an inline query and becomes `(<sql>) AS dataset_`,
/// without its trailing semicolons and comments. Anything else, including
/// strings that do not parse at all such as `analytics.orders`, is a table
/// name.
///
/// # Examples
///
/// ```rust
/// use weir_guard::sql::{parse_dataset, DatasetRef};
///
/// assert_eq!(parse_dataset("orders"), DatasetRef::table("orders"));
/// assert_eq!(
///     parse_dataset("SELECT * FROM orders WHERE amount > 0; -- positive only").to_string(),
///     "(SELECT * FROM orders WHERE amount > 0) AS dataset_"
/// );
/// ```
pub fn parse_dataset(dataset: &str) -> DatasetRef {
    match query_dialect(dataset) {
        Some(dialect) => DatasetRef::Subquery {
            sql: trim_with(dataset, dialect),
            alias: DATASET_ALIAS.to_string(),
        },
        None => DatasetRef::Table(dataset.to_string()),
    }
}

/// Returns the first parser dialect in which `sql` is a statement reading
/// from at least one table.
fn query_dialect(sql: &str) -> Option<&'static SqlParserDialect> {
    PARSER_DIALECTS.iter().copied().find(|dialect| {
        Parser::parse_sql(*dialect, sql).is_ok_and(|statements| {
            statements.iter().any(|statement| {
                visit_relations(statement, |_| ControlFlow::Break(())).is_break()
            })
        })
    })
}

/// Strips trailing whitespace, comments and semicolons from a user-written
/// SQL fragment, so that whatever is rendered after it stays live SQL.
///
/// ```rust
/// use weir_guard::sql::trim_fragment;
///
/// assert_eq!(trim_fragment("country = 'US' -- US only"), "country = 'US'");
/// assert_eq!(trim_fragment("note = '--x';"), "note = '--x'");
/// ```
pub fn trim_fragment(sql: &str) -> String {
    trim_with(sql, &GenericDialect {})
}

fn trim_with(sql: &str, dialect: &SqlParserDialect) -> String {
    let Ok(tokens) = Tokenizer::new(dialect, sql).tokenize_with_location() else {
        return sql.trim().trim_end_matches(';').trim_end().to_string();
    };
    let end = tokens
        .iter()
        .rev()
        .find(|t| !matches!(t.token, Token::Whitespace(_) | Token::SemiColon | Token::EOF))
        .map(|t| byte_offset(sql, t.span.end));

    match end {
        Some(end) => sql[..end].trim().to_string(),
        None => String::new(),
    }
}

// Tokenizer locations are 1-based lines and character columns.
fn byte_offset(sql: &str, location: Location) -> usize {
    let (mut line, mut column) = (1, 1);
    for (idx, ch) in sql.char_indices() {
        if line == location.line && column == location.column {
            return idx;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    sql.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_table_names() {
        assert_eq!(parse_dataset("orders"), DatasetRef::table("orders"));
        assert_eq!(
            parse_dataset("analytics.orders"),
            DatasetRef::table("analytics.orders")
        );
        assert!(!parse_dataset("customers").is_subquery());
    }

    #[test]
    fn test_inline_queries() {
        let dataset = parse_dataset("SELECT id, amount FROM orders o JOIN customers c ON o.cid = c.id;");
        assert!(dataset.is_subquery());
        assert_eq!(
            dataset.to_string(),
            "(SELECT id, amount FROM orders o JOIN customers c ON o.cid = c.id) AS dataset_"
        );
    }

    #[test]
    fn test_query_without_table_is_not_a_subquery() {
        assert_eq!(parse_dataset("SELECT 1"), DatasetRef::table("SELECT 1"));
    }

    #[test]
    fn test_trailing_comments_are_dropped() {
        assert_eq!(
            parse_dataset("SELECT * FROM orders\nWHERE country = 'US' -- US only").to_string(),
            "(SELECT * FROM orders\nWHERE country = 'US') AS dataset_"
        );
        assert_eq!(
            parse_dataset("SELECT * FROM orders; -- trailing").to_string(),
            "(SELECT * FROM orders) AS dataset_"
        );
        assert_eq!(
            parse_dataset("SELECT * FROM orders /* all */ ;\n").to_string(),
            "(SELECT * FROM orders) AS dataset_"
        );
    }

    #[test]
    fn test_inner_comments_are_kept() {
        let sql = "SELECT * -- every column\nFROM orders";
        assert_eq!(
            parse_dataset(sql).to_string(),
            format!("({sql}) AS dataset_")
        );
    }

    #[test]
    fn test_vendor_syntax_is_an_inline_query() {
        assert_eq!(
            parse_dataset("SELECT * FROM [dbo].[orders]").to_string(),
            "(SELECT * FROM [dbo].[orders]) AS dataset_"
        );
        assert!(parse_dataset("SELECT * FROM `proj.ds.orders`").is_subquery());
    }

    #[test]
    fn test_trim_fragment() {
        assert_eq!(trim_fragment("amount > 0"), "amount > 0");
        assert_eq!(trim_fragment("  amount > 0 ;  "), "amount > 0");
        assert_eq!(trim_fragment("a = 1 -- first\nAND b = 2 -- second"), "a = 1 -- first\nAND b = 2");
        assert_eq!(trim_fragment("name = 'é' -- accent"), "name = 'é'");
    }
}
