//! The declarative check model.

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::condition::{Condition, Threshold};
use crate::error::{Result, WeirError};

/// The kind of measurement a check performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum CheckKind {
    RowCount,
    /// A raw user-supplied measure expression, e.g. `avg(amount)`
    #[default]
    Numeric,
    Sum,
    Min,
    Max,
    /// Semantic-layer aggregation: `MEASURE(<measure>)`
    Measure,
    Anomaly,
    /// NULL count per dimension
    NotEmpty,
    /// NULL ratio per dimension
    NotEmptyPct,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::RowCount => "row_count",
            CheckKind::Numeric => "numeric",
            CheckKind::Sum => "sum",
            CheckKind::Min => "min",
            CheckKind::Max => "max",
            CheckKind::Measure => "measure",
            CheckKind::Anomaly => "anomaly",
            CheckKind::NotEmpty => "not_empty",
            CheckKind::NotEmptyPct => "not_empty_pct",
        }
    }

    /// Whether this kind wraps a user-supplied measure expression.
    pub fn requires_measure(&self) -> bool {
        matches!(
            self,
            CheckKind::Numeric | CheckKind::Sum | CheckKind::Min | CheckKind::Max | CheckKind::Measure
        )
    }

    /// Whether this kind checks NULLs per dimension.
    pub fn is_null_check(&self) -> bool {
        matches!(self, CheckKind::NotEmpty | CheckKind::NotEmptyPct)
    }
}

impl FromStr for CheckKind {
    type Err = WeirError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "row_count" => Ok(CheckKind::RowCount),
            "numeric" => Ok(CheckKind::Numeric),
            "sum" => Ok(CheckKind::Sum),
            "min" => Ok(CheckKind::Min),
            "max" => Ok(CheckKind::Max),
            "measure" => Ok(CheckKind::Measure),
            "anomaly" => Ok(CheckKind::Anomaly),
            "not_empty" => Ok(CheckKind::NotEmpty),
            "not_empty_pct" => Ok(CheckKind::NotEmptyPct),
            other => Err(WeirError::NotSupported(format!(
                "Check type {other} not implemented yet"
            ))),
        }
    }
}

impl TryFrom<String> for CheckKind {
    type Error = WeirError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CheckKind> for String {
    fn from(kind: CheckKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granularity a time dimension is truncated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamp column bucketed to a granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDimension {
    /// Column (or SQL expression) holding the timestamp
    #[serde(alias = "sql")]
    pub name: String,
    pub granularity: Granularity,
}

impl TimeDimension {
    pub fn new(name: impl Into<String>, granularity: Granularity) -> Self {
        Self {
            name: name.into(),
            granularity,
        }
    }
}

/// A named, declarative data-quality assertion.
///
/// Checks are built once from configuration and never mutated afterwards.
/// Defaults that depend on the kind (the `not_empty` thresholds) are resolved
/// when the check is constructed, whether through [`Check::builder`] or
/// through deserialization.
///
/// # Examples
///
/// ```rust
/// use weir_guard::core::{Check, CheckKind, Condition};
///
/// let check = Check::builder("orders_exist")
///     .kind(CheckKind::RowCount)
///     .datasource("warehouse")
///     .dataset("orders")
///     .condition(Condition::Gt)
///     .threshold(0.0)
///     .build();
///
/// assert!(check.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckDefinition")]
pub struct Check {
    pub name: String,
    pub description: Option<String>,
    /// Datasource names, resolved against the run's connections
    pub datasource: Vec<String>,
    /// Table names or inline SQL queries
    pub dataset: Vec<String>,
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub measure: Option<String>,
    pub condition: Option<Condition>,
    pub threshold: Option<Threshold>,
    pub dimensions: Vec<String>,
    pub time_dimension: Option<TimeDimension>,
    /// Raw SQL boolean expression, applied verbatim
    pub filter: Option<String>,
    /// For anomaly checks: the id (or id prefix) of the monitored check
    pub check_id: Option<String>,
}

/// The configuration shape of a [`Check`], before defaults are resolved.
#[derive(Deserialize)]
struct CheckDefinition {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_datasource", deserialize_with = "one_or_many")]
    datasource: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    dataset: Vec<String>,
    #[serde(rename = "type", default)]
    kind: CheckKind,
    #[serde(default, alias = "sql")]
    measure: Option<String>,
    #[serde(default)]
    condition: Option<Condition>,
    #[serde(default)]
    threshold: Option<Threshold>,
    #[serde(default, alias = "group_by")]
    dimensions: Vec<String>,
    #[serde(default, alias = "time_grain")]
    time_dimension: Option<TimeDimension>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    check_id: Option<String>,
}

impl From<CheckDefinition> for Check {
    fn from(def: CheckDefinition) -> Self {
        Check {
            name: def.name,
            description: def.description,
            datasource: def.datasource,
            dataset: def.dataset,
            kind: def.kind,
            measure: def.measure,
            condition: def.condition,
            threshold: def.threshold,
            dimensions: def.dimensions,
            time_dimension: def.time_dimension,
            filter: def.filter,
            check_id: def.check_id,
        }
        .with_resolved_defaults()
    }
}

fn default_datasource() -> Vec<String> {
    vec!["default".to_string()]
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl Check {
    /// Creates a new builder for a check with the given name.
    pub fn builder(name: impl Into<String>) -> CheckBuilder {
        CheckBuilder::new(name)
    }

    fn with_resolved_defaults(mut self) -> Self {
        if self.threshold.is_none() && self.kind.is_null_check() {
            self.threshold = Some(Threshold::Scalar(0.0));
        }
        self
    }

    /// Whether the check produces one result per group (dimension values
    /// and/or time bucket) rather than a single scalar.
    pub fn is_grouped(&self) -> bool {
        !self.dimensions.is_empty() || self.time_dimension.is_some()
    }

    /// Returns the condition, or a configuration error when it is unset.
    pub fn condition(&self) -> Result<Condition> {
        self.condition.ok_or_else(|| {
            WeirError::Configuration(format!("Check '{}' has no condition", self.name))
        })
    }

    /// Returns the threshold, or a configuration error when it is unset.
    pub fn threshold(&self) -> Result<&Threshold> {
        self.threshold.as_ref().ok_or_else(|| {
            WeirError::Configuration(format!("Check '{}' has no threshold", self.name))
        })
    }

    /// Returns the measure expression, or a configuration error when it is unset.
    pub fn measure(&self) -> Result<&str> {
        self.measure.as_deref().ok_or_else(|| {
            WeirError::Configuration(format!(
                "Check '{}' of type {} requires a measure",
                self.name, self.kind
            ))
        })
    }

    /// Validates the invariants of the check without touching any datasource.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WeirError::Configuration(
                "Check name cannot be empty".to_string(),
            ));
        }
        if self.dataset.is_empty() {
            return Err(WeirError::Configuration(format!(
                "Check '{}' has no dataset",
                self.name
            )));
        }
        if self.datasource.is_empty() {
            return Err(WeirError::Configuration(format!(
                "Check '{}' has no datasource",
                self.name
            )));
        }
        if self.kind.requires_measure() {
            self.measure()?;
        }
        if self.kind.is_null_check() && self.dimensions.is_empty() {
            return Err(WeirError::Configuration(format!(
                "Check '{}': {} check requires at least one dimension",
                self.name, self.kind
            )));
        }
        if self.kind == CheckKind::Anomaly && self.check_id.is_none() {
            return Err(WeirError::Configuration(format!(
                "Check '{}': anomaly check requires the check_id of the monitored check",
                self.name
            )));
        }
        let condition = self.condition()?;
        self.threshold()?.validate_for(condition)
    }
}

/// Computes the stable identifier of a check result series.
///
/// The id is the SHA-256 of datasource, check name and dataset, so the same
/// check correlates across runs while every (datasource, check, dataset)
/// combination gets its own series.
pub fn generate_check_id(datasource: &str, check_name: &str, dataset: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(datasource.as_bytes());
    hasher.update(check_name.as_bytes());
    hasher.update(dataset.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builder for [`Check`].
#[derive(Debug, Clone)]
pub struct CheckBuilder {
    check: Check,
}

impl CheckBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            check: Check {
                name: name.into(),
                description: None,
                datasource: Vec::new(),
                dataset: Vec::new(),
                kind: CheckKind::default(),
                measure: None,
                condition: None,
                threshold: None,
                dimensions: Vec::new(),
                time_dimension: None,
                filter: None,
                check_id: None,
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.check.description = Some(description.into());
        self
    }

    /// Adds a datasource the check runs against.
    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.check.datasource.push(datasource.into());
        self
    }

    /// Adds a dataset (table name or inline SQL query).
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.check.dataset.push(dataset.into());
        self
    }

    pub fn kind(mut self, kind: CheckKind) -> Self {
        self.check.kind = kind;
        self
    }

    pub fn measure(mut self, measure: impl Into<String>) -> Self {
        self.check.measure = Some(measure.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.check.condition = Some(condition);
        self
    }

    pub fn threshold(mut self, threshold: impl Into<Threshold>) -> Self {
        self.check.threshold = Some(threshold.into());
        self
    }

    /// Adds a grouping dimension. Order is preserved.
    pub fn dimension(mut self, dimension: impl Into<String>) -> Self {
        self.check.dimensions.push(dimension.into());
        self
    }

    pub fn time_dimension(mut self, name: impl Into<String>, granularity: Granularity) -> Self {
        self.check.time_dimension = Some(TimeDimension::new(name, granularity));
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.check.filter = Some(filter.into());
        self
    }

    pub fn check_id(mut self, check_id: impl Into<String>) -> Self {
        self.check.check_id = Some(check_id.into());
        self
    }

    /// Builds the check, resolving kind-dependent defaults.
    ///
    /// Invariants are checked separately by [`Check::validate`], which the
    /// runner calls before any query of the check executes.
    pub fn build(self) -> Check {
        let mut check = self.check;
        if check.datasource.is_empty() {
            check.datasource = default_datasource();
        }
        check.with_resolved_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_id_is_deterministic() {
        let a = generate_check_id("test_db", "test_row_count", "orders");
        let b = generate_check_id("test_db", "test_row_count", "orders");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_check_id_changes_with_each_input() {
        let base = generate_check_id("test_db", "test_row_count", "orders");
        assert_ne!(base, generate_check_id("other_db", "test_row_count", "orders"));
        assert_ne!(base, generate_check_id("test_db", "other_check", "orders"));
        assert_ne!(base, generate_check_id("test_db", "test_row_count", "customers"));
    }

    #[test]
    fn test_not_empty_threshold_defaults() {
        let check = Check::builder("nulls")
            .kind(CheckKind::NotEmpty)
            .dataset("orders")
            .dimension("customer_id")
            .condition(Condition::Le)
            .build();
        assert_eq!(check.threshold, Some(Threshold::Scalar(0.0)));

        let check = Check::builder("counted")
            .kind(CheckKind::RowCount)
            .dataset("orders")
            .condition(Condition::Gt)
            .build();
        assert_eq!(check.threshold, None);
    }

    #[test]
    fn test_builder_defaults_datasource() {
        let check = Check::builder("c").dataset("orders").build();
        assert_eq!(check.datasource, vec!["default".to_string()]);
        assert_eq!(check.kind, CheckKind::Numeric);
    }

    #[test]
    fn test_validate_not_empty_requires_dimension() {
        let check = Check::builder("nulls")
            .kind(CheckKind::NotEmpty)
            .dataset("orders")
            .condition(Condition::Le)
            .build();
        let err = check.validate().unwrap_err();
        assert!(matches!(err, WeirError::Configuration(_)));
        assert!(err.to_string().contains("at least one dimension"));
    }

    #[test]
    fn test_validate_measure_required() {
        let check = Check::builder("total")
            .kind(CheckKind::Sum)
            .dataset("orders")
            .condition(Condition::Gt)
            .threshold(0.0)
            .build();
        assert!(check.validate().unwrap_err().to_string().contains("requires a measure"));
    }

    #[test]
    fn test_validate_threshold_shape() {
        let check = Check::builder("bounded")
            .kind(CheckKind::RowCount)
            .dataset("orders")
            .condition(Condition::Between)
            .threshold(5.0)
            .build();
        assert!(matches!(
            check.validate(),
            Err(WeirError::Configuration(_))
        ));

        let check = Check::builder("bounded")
            .kind(CheckKind::RowCount)
            .dataset("orders")
            .condition(Condition::Between)
            .threshold((1.0, 10.0))
            .build();
        assert!(check.validate().is_ok());
    }

    #[test]
    fn test_deserialize_declarative_form() {
        let check: Check = serde_json::from_str(
            r#"{
                "name": "orders_by_status",
                "datasource": "warehouse",
                "dataset": ["orders", "archived_orders"],
                "type": "sum",
                "sql": "amount",
                "condition": "ge",
                "threshold": 10,
                "group_by": ["status"],
                "time_grain": {"sql": "created_at", "granularity": "day"},
                "filter": "amount > 0"
            }"#,
        )
        .unwrap();

        assert_eq!(check.datasource, vec!["warehouse".to_string()]);
        assert_eq!(check.dataset.len(), 2);
        assert_eq!(check.kind, CheckKind::Sum);
        assert_eq!(check.measure.as_deref(), Some("amount"));
        assert_eq!(check.dimensions, vec!["status".to_string()]);
        assert_eq!(
            check.time_dimension,
            Some(TimeDimension::new("created_at", Granularity::Day))
        );
        assert!(check.validate().is_ok());
    }

    #[test]
    fn test_deserialize_resolves_defaults() {
        let check: Check = serde_json::from_str(
            r#"{"name": "n", "dataset": "orders", "type": "not_empty_pct",
                "dimensions": ["email"], "condition": "le"}"#,
        )
        .unwrap();
        assert_eq!(check.datasource, vec!["default".to_string()]);
        assert_eq!(check.threshold, Some(Threshold::Scalar(0.0)));
    }

    #[test]
    fn test_unknown_check_type() {
        let err = "histogram".parse::<CheckKind>().unwrap_err();
        assert!(matches!(err, WeirError::NotSupported(_)));

        let parsed: std::result::Result<Check, _> =
            serde_json::from_str(r#"{"name": "n", "dataset": "t", "type": "histogram"}"#);
        assert!(parsed.is_err());
    }
}
