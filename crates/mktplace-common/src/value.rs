//! Tagged row-value abstraction shared by the predicate compiler and the
//! row-anchor computer.
//!
//! A fixed, small set of logical types (int, float, bool, datetime, string,
//! null) covers every column value this data plane ever touches; this is
//! the "polymorphism over row values" design note — an exhaustive match over
//! a closed enum, not duck-typed coercion.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// A single column value, normalized to one of the logical types the
/// predicate DSL and row-anchor computer understand.
#[derive(Clone, Debug, PartialEq)]
pub enum AnchorValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Str(String),
    Null,
}

impl AnchorValue {
    /// Normalize to the canonical string form used by the row-anchor hash.
    ///
    /// int → decimal; float → 10 fractional digits; datetime → ISO-8601 with
    /// microseconds; bool → `TRUE`/`FALSE`; null → `NULL`; string → itself.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:.10}"),
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::DateTime(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            Self::Str(s) => s.clone(),
            Self::Null => "NULL".to_string(),
        }
    }

    /// Best-effort conversion from a decoded JSON scalar (the shape a
    /// Parquet row is converted to before anchor/predicate evaluation).
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| Self::Str(s.clone())),
            other => Self::Str(other.to_string()),
        }
    }

    /// Ordering used by the `>`, `<`, `>=`, `<=` predicate operators.
    ///
    /// Returns `None` when the two values are not order-comparable (e.g.
    /// comparing a string to a number) — the caller treats that as "does not
    /// match" rather than an error.
    #[must_use]
    pub fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::DateTime(a), Self::DateTime(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.partial_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_normalizes_to_decimal() {
        assert_eq!(AnchorValue::Int(42).normalized(), "42");
        assert_eq!(AnchorValue::Int(-7).normalized(), "-7");
    }

    #[test]
    fn float_normalizes_with_ten_fractional_digits() {
        assert_eq!(AnchorValue::Float(1.5).normalized(), "1.5000000000");
    }

    #[test]
    fn bool_normalizes_to_upper_case_literals() {
        assert_eq!(AnchorValue::Bool(true).normalized(), "TRUE");
        assert_eq!(AnchorValue::Bool(false).normalized(), "FALSE");
    }

    #[test]
    fn null_normalizes_to_null_literal() {
        assert_eq!(AnchorValue::Null.normalized(), "NULL");
    }

    #[test]
    fn cross_type_comparison_is_not_ordered() {
        assert_eq!(
            AnchorValue::Str("a".into()).partial_cmp_value(&AnchorValue::Int(1)),
            None
        );
    }

    #[test]
    fn int_and_float_compare_numerically() {
        assert_eq!(
            AnchorValue::Int(2).partial_cmp_value(&AnchorValue::Float(1.5)),
            Some(Ordering::Greater)
        );
    }
}
