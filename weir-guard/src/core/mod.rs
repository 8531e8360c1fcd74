//! Core types of the check engine.
//!
//! This module holds the declarative check model and everything needed to
//! decide whether a measurement passes:
//!
//! - **[`Check`]**: a named assertion against one or more datasets
//! - **[`Condition`]** and **[`Threshold`]**: the comparison a check applies
//! - **[`evaluate`]**: the pure pass/fail decision
//! - **[`Value`]**: the dialect-independent scalar returned by drivers
//! - **[`CheckResult`]**: one recorded outcome, grouped into [`CheckReport`]s
//!   and a [`RunReport`]
//!
//! ## Example
//!
//! ```rust
//! use weir_guard::core::{evaluate, Check, CheckKind, Condition, Value};
//!
//! let check = Check::builder("orders_by_status")
//!     .kind(CheckKind::Sum)
//!     .dataset("orders")
//!     .measure("amount")
//!     .dimension("status")
//!     .condition(Condition::Ge)
//!     .threshold(10.0)
//!     .build();
//!
//! assert!(check.is_grouped());
//! let threshold = check.threshold().unwrap();
//! assert!(evaluate(&Value::Float(12.5), threshold, Condition::Ge).unwrap());
//! ```

mod check;
mod condition;
mod result;
mod value;

pub use check::{generate_check_id, Check, CheckBuilder, CheckKind, Granularity, TimeDimension};
pub use condition::{evaluate, Condition, Threshold};
pub use result::{CheckReport, CheckResult, RunReport};
pub use value::{rows_from_batches, Row, Value};
