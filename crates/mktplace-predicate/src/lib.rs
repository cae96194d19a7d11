//! Restricted predicate DSL: `predicateHints` (string form) and
//! `jsonPredicateHints` (structured form), compiled into a filter that can
//! be evaluated row-by-row during a table scan.
//!
//! Deliberately small grammar — `= != > < >= <=`, `IN (...)`, `IS [NOT] NULL`,
//! conjunction only. No `LIKE`, no `OR`/`NOT`, no arithmetic. Anything wider
//! is rejected rather than partially honored.

use std::collections::HashMap;

use mktplace_common::error::{Error, Result};
use mktplace_common::value::AnchorValue;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Maximum number of predicates accepted in one request.
pub const MAX_PREDICATES: usize = 20;
/// Maximum number of literals in one `IN (...)` list.
pub const MAX_IN_LIST_SIZE: usize = 1000;

/// A single predicate operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    IsNull,
    IsNotNull,
}

impl Op {
    fn from_str_token(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    fn from_json_token(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "IN" => Some(Self::In),
            "IS NULL" => Some(Self::IsNull),
            "IS NOT NULL" => Some(Self::IsNotNull),
            _ => None,
        }
    }
}

/// One parsed predicate: a column, an operator, and its operand(s).
#[derive(Clone, Debug)]
pub struct Predicate {
    pub column: String,
    pub op: Op,
    pub value: Option<AnchorValue>,
    pub values: Vec<AnchorValue>,
}

impl Predicate {
    fn comparison(column: String, op: Op, value: AnchorValue) -> Self {
        Self { column, op, value: Some(value), values: Vec::new() }
    }

    fn in_list(column: String, values: Vec<AnchorValue>) -> Self {
        Self { column, op: Op::In, value: None, values }
    }

    fn null_check(column: String, op: Op) -> Self {
        Self { column, op, value: None, values: Vec::new() }
    }
}

/// Parse the `predicateHints` string form: `"col op value"`.
///
/// Operator search order matches the source grammar exactly: `IS NOT NULL`
/// and `IS NULL` are checked first (they have no right-hand value to
/// tokenize around), then the comparison operators in the order
/// `!= >= <= = > <` (longest-prefix operators must be tried before their
/// shorter substrings), then `IN (...)`.
pub fn parse_predicate_string(raw: &str) -> Result<Predicate> {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();

    if let Some(idx) = upper.find(" IS NOT NULL") {
        let column = trimmed[..idx].trim().to_string();
        return Ok(Predicate::null_check(column, Op::IsNotNull));
    }
    if let Some(idx) = upper.find(" IS NULL") {
        let column = trimmed[..idx].trim().to_string();
        return Ok(Predicate::null_check(column, Op::IsNull));
    }

    for token in ["!=", ">=", "<=", "=", ">", "<"] {
        let needle = format!(" {token} ");
        if let Some(pos) = trimmed.find(&needle) {
            let column = trimmed[..pos].trim().to_string();
            let value_str = trimmed[pos + needle.len()..].trim();
            let op = Op::from_str_token(token).expect("token is one of the matched literals");
            return Ok(Predicate::comparison(column, op, parse_value(value_str)));
        }
    }

    if upper.contains(" IN ") {
        if let Some((column, values_str)) = split_in_clause(trimmed) {
            let values = parse_in_list(values_str)?;
            return Ok(Predicate::in_list(column, values));
        }
    }

    Err(Error::bad_predicate(format!("unsupported predicate format: {raw}")))
}

fn split_in_clause(s: &str) -> Option<(String, &str)> {
    let upper = s.to_uppercase();
    let in_pos = upper.find(" IN ")?;
    let column = s[..in_pos].trim().to_string();
    let rest = s[in_pos + 4..].trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some((column, inner))
}

fn parse_value(raw: &str) -> AnchorValue {
    let s = raw.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return AnchorValue::Str(s[1..s.len() - 1].to_string());
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return AnchorValue::Str(s[1..s.len() - 1].to_string());
    }
    match s.to_uppercase().as_str() {
        "TRUE" => return AnchorValue::Bool(true),
        "FALSE" => return AnchorValue::Bool(false),
        "NULL" => return AnchorValue::Null,
        _ => {}
    }
    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return AnchorValue::Float(f);
        }
    } else if let Ok(i) = s.parse::<i64>() {
        return AnchorValue::Int(i);
    }
    AnchorValue::Str(s.to_string())
}

/// Split an `IN (...)` list body on commas, respecting quoted strings —
/// mirrors a small hand-rolled quote-aware scanner rather than a full CSV
/// parser, since the grammar only needs to know where quotes start/end.
fn parse_in_list(values_str: &str) -> Result<Vec<AnchorValue>> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '\0';

    for ch in values_str.chars() {
        if (ch == '\'' || ch == '"') && (!in_quotes || ch == quote_char) {
            if in_quotes {
                in_quotes = false;
            } else {
                in_quotes = true;
                quote_char = ch;
            }
            current.push(ch);
        } else if ch == ',' && !in_quotes {
            if !current.trim().is_empty() {
                values.push(parse_value(current.trim()));
            }
            current.clear();
        } else {
            current.push(ch);
        }
    }
    if !current.trim().is_empty() {
        values.push(parse_value(current.trim()));
    }

    if values.len() > MAX_IN_LIST_SIZE {
        return Err(Error::bad_predicate(format!(
            "IN list too large (max {MAX_IN_LIST_SIZE})"
        )));
    }
    Ok(values)
}

/// Parse the `predicateHints` string-array form.
pub fn parse_predicate_hints(hints: &[String]) -> Result<Vec<Predicate>> {
    if hints.len() > MAX_PREDICATES {
        return Err(Error::bad_predicate(format!(
            "too many predicates (max {MAX_PREDICATES})"
        )));
    }
    hints.iter().map(|h| parse_predicate_string(h)).collect()
}

/// JSON shape accepted for one entry of `jsonPredicateHints`.
#[derive(Debug, Deserialize)]
struct JsonPredicate {
    #[serde(alias = "col")]
    column: Option<String>,
    #[serde(alias = "operator")]
    op: Option<String>,
    value: Option<JsonValue>,
    values: Option<Vec<JsonValue>>,
}

/// Parse the `jsonPredicateHints` structured form.
pub fn parse_json_predicate_hints(raw: &[JsonValue]) -> Result<Vec<Predicate>> {
    if raw.len() > MAX_PREDICATES {
        return Err(Error::bad_predicate(format!(
            "too many predicates (max {MAX_PREDICATES})"
        )));
    }

    raw.iter()
        .map(|entry| {
            let parsed: JsonPredicate = serde_json::from_value(entry.clone())
                .map_err(|e| Error::bad_predicate(format!("invalid JSON predicate: {e}")))?;

            let column = parsed
                .column
                .filter(|c| !c.is_empty())
                .ok_or_else(|| Error::bad_predicate("missing 'column' in JSON predicate"))?;
            let op_str = parsed
                .op
                .filter(|o| !o.is_empty())
                .ok_or_else(|| Error::bad_predicate("missing 'op' in JSON predicate"))?;
            let op_upper = op_str.to_uppercase();

            if op_upper == "IS NULL" {
                return Ok(Predicate::null_check(column, Op::IsNull));
            }
            if op_upper == "IS NOT NULL" {
                return Ok(Predicate::null_check(column, Op::IsNotNull));
            }
            if op_upper == "IN" {
                let values = parsed
                    .values
                    .ok_or_else(|| Error::bad_predicate("IN operator requires 'values' array"))?;
                if values.len() > MAX_IN_LIST_SIZE {
                    return Err(Error::bad_predicate(format!(
                        "IN list too large (max {MAX_IN_LIST_SIZE})"
                    )));
                }
                let values = values.iter().map(AnchorValue::from_json).collect();
                return Ok(Predicate::in_list(column, values));
            }

            let op = Op::from_json_token(&op_str)
                .ok_or_else(|| Error::bad_predicate(format!("unsupported operator: {op_str}")))?;
            let value = parsed
                .value
                .ok_or_else(|| Error::bad_predicate(format!("operator {op_str} requires 'value'")))?;
            Ok(Predicate::comparison(column, op, AnchorValue::from_json(&value)))
        })
        .collect()
}

/// Reject predicates referencing columns outside the table schema, per
/// §4.2's "missing buyer column → 400" contract.
pub fn validate_predicates(predicates: &[Predicate], schema_columns: &[String]) -> Result<()> {
    for p in predicates {
        if !schema_columns.iter().any(|c| c == &p.column) {
            return Err(Error::bad_predicate(format!(
                "column '{}' not found in table schema",
                p.column
            )));
        }
        if p.op == Op::In && p.values.len() > MAX_IN_LIST_SIZE {
            return Err(Error::bad_predicate(format!(
                "IN list too large (max {MAX_IN_LIST_SIZE})"
            )));
        }
    }
    Ok(())
}

/// A validated, ready-to-evaluate conjunction of predicates.
#[derive(Clone, Debug, Default)]
pub struct CompiledFilter {
    predicates: Vec<Predicate>,
}

impl CompiledFilter {
    /// Validate and compile; returns `None` if there are no predicates to
    /// apply (an empty filter always matches).
    pub fn compile(predicates: Vec<Predicate>, schema_columns: &[String]) -> Result<Self> {
        validate_predicates(&predicates, schema_columns)?;
        Ok(Self { predicates })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Evaluate the conjunction against one row. Predicates are AND-ed
    /// together; an unknown column (should have been caught at compile
    /// time) is treated as non-matching rather than panicking.
    #[must_use]
    pub fn matches(&self, row: &HashMap<String, AnchorValue>) -> bool {
        self.predicates.iter().all(|p| matches_one(p, row))
    }
}

fn matches_one(p: &Predicate, row: &HashMap<String, AnchorValue>) -> bool {
    let Some(actual) = row.get(&p.column) else {
        return false;
    };
    match p.op {
        Op::IsNull => actual.is_null(),
        Op::IsNotNull => !actual.is_null(),
        Op::Eq => actual == p.value.as_ref().expect("Eq predicates always carry a value"),
        Op::Ne => actual != p.value.as_ref().expect("Ne predicates always carry a value"),
        Op::Gt => actual
            .partial_cmp_value(p.value.as_ref().expect("Gt predicates always carry a value"))
            .is_some_and(std::cmp::Ordering::is_gt),
        Op::Lt => actual
            .partial_cmp_value(p.value.as_ref().expect("Lt predicates always carry a value"))
            .is_some_and(std::cmp::Ordering::is_lt),
        Op::Ge => actual
            .partial_cmp_value(p.value.as_ref().expect("Ge predicates always carry a value"))
            .is_some_and(|o| !o.is_lt()),
        Op::Le => actual
            .partial_cmp_value(p.value.as_ref().expect("Le predicates always carry a value"))
            .is_some_and(|o| !o.is_gt()),
        Op::In => p.values.contains(actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, AnchorValue)]) -> HashMap<String, AnchorValue> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn parses_simple_comparison() {
        let p = parse_predicate_string("age >= 21").unwrap();
        assert_eq!(p.column, "age");
        assert_eq!(p.op, Op::Ge);
        assert_eq!(p.value, Some(AnchorValue::Int(21)));
    }

    #[test]
    fn parses_not_equal_before_equal() {
        let p = parse_predicate_string("status != 'closed'").unwrap();
        assert_eq!(p.op, Op::Ne);
        assert_eq!(p.value, Some(AnchorValue::Str("closed".to_string())));
    }

    #[test]
    fn parses_is_not_null_before_is_null() {
        let p = parse_predicate_string("email IS NOT NULL").unwrap();
        assert_eq!(p.op, Op::IsNotNull);
    }

    #[test]
    fn parses_in_list_with_quoted_values() {
        let p = parse_predicate_string("country IN ('US', 'CA', 'MX')").unwrap();
        assert_eq!(p.op, Op::In);
        assert_eq!(p.values.len(), 3);
    }

    #[test]
    fn rejects_too_many_predicates() {
        let hints: Vec<String> = (0..25).map(|i| format!("col{i} = 1")).collect();
        assert!(parse_predicate_hints(&hints).is_err());
    }

    #[test]
    fn rejects_unknown_column_at_compile_time() {
        let predicates = vec![parse_predicate_string("ghost = 1").unwrap()];
        let err = CompiledFilter::compile(predicates, &["age".to_string()]).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn evaluates_conjunction_of_predicates() {
        let predicates = vec![
            parse_predicate_string("age >= 21").unwrap(),
            parse_predicate_string("country = 'US'").unwrap(),
        ];
        let filter =
            CompiledFilter::compile(predicates, &["age".to_string(), "country".to_string()]).unwrap();

        assert!(filter.matches(&row(&[
            ("age", AnchorValue::Int(30)),
            ("country", AnchorValue::Str("US".to_string())),
        ])));
        assert!(!filter.matches(&row(&[
            ("age", AnchorValue::Int(17)),
            ("country", AnchorValue::Str("US".to_string())),
        ])));
    }
}
