//! Conditions and thresholds used to decide whether a check passes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::value::Value;
use crate::error::{Result, WeirError};

/// Tolerance for `eq` / `neq` comparisons on floating point measurements.
const EPSILON: f64 = 1e-10;

/// The comparison a check applies between its measured value and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Neq,
    Between,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Gt => "gt",
            Condition::Ge => "ge",
            Condition::Lt => "lt",
            Condition::Le => "le",
            Condition::Eq => "eq",
            Condition::Neq => "neq",
            Condition::Between => "between",
        }
    }
}

impl FromStr for Condition {
    type Err = WeirError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gt" => Ok(Condition::Gt),
            "ge" => Ok(Condition::Ge),
            "lt" => Ok(Condition::Lt),
            "le" => Ok(Condition::Le),
            "eq" => Ok(Condition::Eq),
            "neq" => Ok(Condition::Neq),
            "between" => Ok(Condition::Between),
            other => Err(WeirError::NotSupported(format!(
                "Condition not implemented yet: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = WeirError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.as_str().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check threshold as written in configuration.
///
/// Configuration may carry any list here; whether the shape fits the
/// condition is only decided when the threshold is used, so a malformed
/// `between` surfaces as a [`WeirError::Configuration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Scalar(f64),
    List(Vec<f64>),
}

impl Threshold {
    /// Creates a `[low, high]` threshold for `between` conditions.
    pub fn range(low: f64, high: f64) -> Self {
        Threshold::List(vec![low, high])
    }

    /// Returns the scalar value, if this is a scalar threshold.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Threshold::Scalar(v) => Some(*v),
            Threshold::List(_) => None,
        }
    }

    /// Returns the list, if this is a list threshold.
    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            Threshold::Scalar(_) => None,
            Threshold::List(values) => Some(values),
        }
    }

    /// Returns `(low, high)` if this is a two-element list.
    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            Threshold::List(values) if values.len() == 2 => Some((values[0], values[1])),
            _ => None,
        }
    }

    /// Checks that the threshold has the shape the condition requires.
    ///
    /// A `between` threshold must be an ordered `[low, high]` pair.
    pub fn validate_for(&self, condition: Condition) -> Result<()> {
        match (condition, self) {
            (Condition::Between, t) => match t.as_pair() {
                Some((low, high)) if low <= high => Ok(()),
                Some((low, high)) => Err(WeirError::Configuration(format!(
                    "between requires low <= high, got [{low}, {high}]"
                ))),
                None => Err(WeirError::Configuration(
                    "between requires a two-element threshold".to_string(),
                )),
            },
            (_, Threshold::Scalar(_)) => Ok(()),
            (other, Threshold::List(_)) => Err(WeirError::Configuration(format!(
                "{other} requires a scalar threshold"
            ))),
        }
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Scalar(value)
    }
}

impl From<(f64, f64)> for Threshold {
    fn from((low, high): (f64, f64)) -> Self {
        Threshold::range(low, high)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Scalar(v) => write!(f, "{v}"),
            Threshold::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Evaluates `value <condition> threshold`.
///
/// A null value always fails: a measurement that could not be taken is a
/// failed check, not an error. Non-numeric values are not coerced and
/// surface as [`WeirError::TypeMismatch`].
///
/// # Examples
///
/// ```rust
/// use weir_guard::core::{evaluate, Condition, Threshold, Value};
///
/// assert!(evaluate(&Value::Integer(150), &Threshold::Scalar(0.0), Condition::Gt).unwrap());
/// assert!(!evaluate(&Value::Null, &Threshold::Scalar(0.0), Condition::Gt).unwrap());
/// assert!(evaluate(&Value::Float(1.5), &Threshold::range(-2.0, 2.0), Condition::Between).unwrap());
/// ```
pub fn evaluate(value: &Value, threshold: &Threshold, condition: Condition) -> Result<bool> {
    if value.is_null() {
        return Ok(false);
    }
    threshold.validate_for(condition)?;

    let value = value.as_f64().ok_or_else(|| WeirError::TypeMismatch {
        expected: "number".to_string(),
        found: value.type_name().to_string(),
    })?;

    if let Some((low, high)) = threshold.as_pair() {
        return Ok(low <= value && value <= high);
    }
    let threshold = threshold
        .as_scalar()
        .ok_or_else(|| WeirError::Internal("scalar threshold expected".to_string()))?;

    let passed = match condition {
        Condition::Gt => value > threshold,
        Condition::Ge => value >= threshold,
        Condition::Lt => value < threshold,
        Condition::Le => value <= threshold,
        Condition::Eq => (value - threshold).abs() < EPSILON,
        Condition::Neq => (value - threshold).abs() >= EPSILON,
        Condition::Between => {
            return Err(WeirError::Configuration(
                "between requires a two-element threshold".to_string(),
            ))
        }
    };
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: f64) -> Threshold {
        Threshold::Scalar(v)
    }

    #[test]
    fn test_ordering_conditions() {
        let ten = Value::Integer(10);
        assert!(evaluate(&ten, &scalar(0.0), Condition::Gt).unwrap());
        assert!(!evaluate(&Value::Integer(0), &scalar(0.0), Condition::Gt).unwrap());
        assert!(evaluate(&Value::Integer(0), &scalar(0.0), Condition::Ge).unwrap());
        assert!(evaluate(&ten, &scalar(10.0), Condition::Le).unwrap());
        assert!(!evaluate(&ten, &scalar(10.0), Condition::Lt).unwrap());
        assert!(evaluate(&Value::Float(9.5), &scalar(10.0), Condition::Lt).unwrap());
    }

    #[test]
    fn test_equality_conditions() {
        assert!(evaluate(&Value::Float(0.1), &scalar(0.1), Condition::Eq).unwrap());
        assert!(!evaluate(&Value::Float(0.2), &scalar(0.1), Condition::Eq).unwrap());
        assert!(evaluate(&Value::Integer(3), &scalar(4.0), Condition::Neq).unwrap());
        assert!(!evaluate(&Value::Integer(4), &scalar(4.0), Condition::Neq).unwrap());
    }

    #[test]
    fn test_between_is_inclusive() {
        let range = Threshold::range(-2.0, 2.0);
        assert!(evaluate(&Value::Float(-2.0), &range, Condition::Between).unwrap());
        assert!(evaluate(&Value::Float(2.0), &range, Condition::Between).unwrap());
        assert!(evaluate(&Value::Float(1.0), &range, Condition::Between).unwrap());
        assert!(!evaluate(&Value::Float(3.0), &range, Condition::Between).unwrap());
        assert!(!evaluate(&Value::Float(-3.0), &range, Condition::Between).unwrap());
    }

    #[test]
    fn test_null_always_fails() {
        for condition in [Condition::Gt, Condition::Le, Condition::Neq] {
            assert!(!evaluate(&Value::Null, &scalar(0.0), condition).unwrap());
        }
        assert!(!evaluate(&Value::Null, &Threshold::range(0.0, 1.0), Condition::Between).unwrap());
    }

    #[test]
    fn test_between_requires_pair() {
        let err = evaluate(&Value::Integer(1), &scalar(1.0), Condition::Between).unwrap_err();
        assert!(matches!(err, WeirError::Configuration(_)));

        let err = evaluate(
            &Value::Integer(1),
            &Threshold::List(vec![1.0, 2.0, 3.0]),
            Condition::Between,
        )
        .unwrap_err();
        assert!(err.to_string().contains("two-element threshold"));
    }

    #[test]
    fn test_between_requires_ordered_pair() {
        let reversed = Threshold::range(5.0, 1.0);
        let err = evaluate(&Value::Integer(3), &reversed, Condition::Between).unwrap_err();
        assert!(matches!(err, WeirError::Configuration(_)));
        assert!(err.to_string().contains("low <= high"));

        assert!(Threshold::range(2.0, 2.0).validate_for(Condition::Between).is_ok());
    }

    #[test]
    fn test_list_threshold_rejected_for_scalar_conditions() {
        let err = evaluate(&Value::Integer(1), &Threshold::range(0.0, 2.0), Condition::Gt)
            .unwrap_err();
        assert!(matches!(err, WeirError::Configuration(_)));
    }

    #[test]
    fn test_text_value_is_not_coerced() {
        let err = evaluate(&Value::from("12"), &scalar(1.0), Condition::Gt).unwrap_err();
        assert!(matches!(err, WeirError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_condition() {
        let err = "approx".parse::<Condition>().unwrap_err();
        assert!(matches!(err, WeirError::NotSupported(_)));
        assert!(err.to_string().contains("approx"));
    }

    #[test]
    fn test_serde_shapes() {
        let condition: Condition = serde_json::from_str("\"between\"").unwrap();
        assert_eq!(condition, Condition::Between);
        assert!(serde_json::from_str::<Condition>("\"within\"").is_err());

        let threshold: Threshold = serde_json::from_str("[-2.0, 2.0]").unwrap();
        assert_eq!(threshold.as_pair(), Some((-2.0, 2.0)));
        let threshold: Threshold = serde_json::from_str("5").unwrap();
        assert_eq!(threshold.as_scalar(), Some(5.0));
    }
}
