//! Scalar cell values returned by drivers and the metric store.

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// A single row returned by a query, in select order.
pub type Row = Vec<Value>;

/// A dialect-independent scalar value.
///
/// Drivers map whatever their database returns onto this type so the check
/// logic never has to know about vendor types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL, or a measurement that could not be taken
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// A short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::Float).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

fn timestamp_value(
    value: Option<i64>,
    convert: impl Fn(i64) -> Option<DateTime<Utc>>,
) -> Value {
    value
        .and_then(convert)
        .map(Value::Timestamp)
        .unwrap_or(Value::Null)
}

impl From<ScalarValue> for Value {
    fn from(scalar: ScalarValue) -> Self {
        if scalar.is_null() {
            return Value::Null;
        }
        match scalar {
            ScalarValue::Boolean(Some(v)) => Value::Boolean(v),
            ScalarValue::Int8(Some(v)) => Value::Integer(v.into()),
            ScalarValue::Int16(Some(v)) => Value::Integer(v.into()),
            ScalarValue::Int32(Some(v)) => Value::Integer(v.into()),
            ScalarValue::Int64(Some(v)) => Value::Integer(v),
            ScalarValue::UInt8(Some(v)) => Value::Integer(v.into()),
            ScalarValue::UInt16(Some(v)) => Value::Integer(v.into()),
            ScalarValue::UInt32(Some(v)) => Value::Integer(v.into()),
            ScalarValue::UInt64(Some(v)) => match i64::try_from(v) {
                Ok(v) => Value::Integer(v),
                Err(_) => Value::Float(v as f64),
            },
            ScalarValue::Float32(Some(v)) => Value::Float(v.into()),
            ScalarValue::Float64(Some(v)) => Value::Float(v),
            ScalarValue::Decimal128(Some(v), _, scale) => {
                Value::Float(v as f64 / 10f64.powi(scale.into()))
            }
            ScalarValue::Utf8(Some(v))
            | ScalarValue::LargeUtf8(Some(v))
            | ScalarValue::Utf8View(Some(v)) => Value::Text(v),
            ScalarValue::TimestampSecond(v, _) => {
                timestamp_value(v, |s| DateTime::from_timestamp(s, 0))
            }
            ScalarValue::TimestampMillisecond(v, _) => {
                timestamp_value(v, DateTime::from_timestamp_millis)
            }
            ScalarValue::TimestampMicrosecond(v, _) => {
                timestamp_value(v, DateTime::from_timestamp_micros)
            }
            ScalarValue::TimestampNanosecond(v, _) => {
                timestamp_value(v, |ns| Some(DateTime::from_timestamp_nanos(ns)))
            }
            ScalarValue::Date32(Some(days)) => NaiveDate::from_num_days_from_ce_opt(
                days + UNIX_EPOCH_DAYS_FROM_CE,
            )
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Value::Timestamp(dt.and_utc()))
            .unwrap_or(Value::Null),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Converts Arrow record batches into rows of [`Value`]s.
pub fn rows_from_batches(batches: &[RecordBatch]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut row = Vec::with_capacity(batch.num_columns());
            for column in batch.columns() {
                let scalar = ScalarValue::try_from_array(column, row_idx)?;
                row.push(Value::from(scalar));
            }
            rows.push(row);
        }
    }
    Ok(rows)
}
