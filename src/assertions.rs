//! Checks over a captured response.
//!
//! Every function takes the expected values already scope-resolved and returns
//! `Ok(())` or a `StepError` describing both sides of the mismatch.

use regex::Regex;
use serde_json::Value;

use crate::errors::{Result, StepError};
use crate::jsonpath::{self, JsonPath};
use crate::response::CapturedResponse;

/// Runtime type of a JSON value. Drives how an expected literal is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
    Null,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) if n.is_f64() => ValueKind::Float,
            Value::Number(_) => ValueKind::Integer,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
        }
    }

    /// Read `expected` as a value of this kind.
    pub fn parse_expected(self, expected: &str) -> Result<Value> {
        let fail = || StepError::ExpectedValue {
            expected: expected.to_string(),
            kind: self.name(),
        };
        let trimmed = expected.trim();
        match self {
            ValueKind::Boolean => trimmed.parse::<bool>().map(Value::Bool).map_err(|_| fail()),
            ValueKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .map_err(|_| fail()),
            ValueKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(fail),
            ValueKind::String => Ok(Value::String(expected.to_string())),
            ValueKind::Null if trimmed == "null" => Ok(Value::Null),
            ValueKind::Null => Err(fail()),
            ValueKind::Array | ValueKind::Object => {
                let parsed: Value = serde_json::from_str(expected).map_err(|_| fail())?;
                if ValueKind::of(&parsed) == self {
                    Ok(parsed)
                } else {
                    Err(fail())
                }
            }
        }
    }
}

/// Structural equality where object key order is irrelevant and integer and
/// float encodings of the same number compare equal.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Strings as-is, everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn status_code(response: &CapturedResponse, expected: u16) -> Result<()> {
    if response.status() != expected {
        return Err(StepError::mismatch(format!(
            "expected status code to be {expected}, but actual is {}.\n Response body: {}",
            response.status(),
            response.body()
        )));
    }
    Ok(())
}

pub fn valid_json(response: &CapturedResponse) -> Result<()> {
    response.json().map(|_| ())
}

/// Deep equality between the body and `expected`.
pub fn matches_json(response: &CapturedResponse, expected: &str) -> Result<()> {
    let actual = response.body().trim_matches('\n');
    let actual_value: Value = serde_json::from_str(actual).map_err(StepError::InvalidJson)?;
    let expected_value: Value =
        serde_json::from_str(expected).map_err(StepError::InvalidExpectedJson)?;
    if !json_equal(&actual_value, &expected_value) {
        return Err(StepError::mismatch(format!(
            "expected json {expected}, does not match actual: {actual}"
        )));
    }
    Ok(())
}

pub fn header_equals(response: &CapturedResponse, name: &str, expected: &str) -> Result<()> {
    let actual = response.header(name);
    if actual != expected {
        return Err(StepError::mismatch(format!(
            "expected header {name} to have value {expected}. actual : {actual}"
        )));
    }
    Ok(())
}

pub fn body_contains(response: &CapturedResponse, needle: &str) -> Result<()> {
    let body = response.body().trim_matches('\n');
    if !body.contains(needle) {
        return Err(StepError::mismatch(format!("{body} does not contain {needle}")));
    }
    Ok(())
}

pub fn body_matches(response: &CapturedResponse, pattern: &str) -> Result<()> {
    let re = Regex::new(pattern)?;
    if !re.is_match(response.body()) {
        return Err(StepError::mismatch(format!(
            "{} does not match pattern: {pattern}",
            response.body()
        )));
    }
    Ok(())
}

/// Evaluate `expr` against the body.
pub fn json_path(response: &CapturedResponse, expr: &str) -> Result<Value> {
    evaluate(response, expr).map(|(_, value)| value)
}

fn evaluate(response: &CapturedResponse, expr: &str) -> Result<(JsonPath, Value)> {
    let document = response.json()?;
    let path_err = |source| StepError::JsonPath {
        expr: expr.to_string(),
        source,
    };
    let path = JsonPath::parse(expr).map_err(path_err)?;
    let value = path.select(&document).map_err(path_err)?;
    Ok((path, value))
}

/// The value at `expr` equals `expected`, read as the actual value's type.
pub fn json_path_value(response: &CapturedResponse, expr: &str, expected: &str) -> Result<()> {
    let actual = json_path(response, expr)?;
    let expected_value = ValueKind::of(&actual).parse_expected(expected)?;
    if !json_equal(&actual, &expected_value) {
        return Err(StepError::mismatch(format!(
            "expected json path {expr} to have value {} but it is {}",
            stringify(&expected_value),
            stringify(&actual)
        )));
    }
    Ok(())
}

pub fn json_path_matches(response: &CapturedResponse, expr: &str, pattern: &str) -> Result<()> {
    let actual = stringify(&json_path(response, expr)?);
    let re = Regex::new(pattern)?;
    if !re.is_match(&actual) {
        return Err(StepError::mismatch(format!("{actual} does not match: {pattern}")));
    }
    Ok(())
}

pub fn json_path_count(response: &CapturedResponse, expr: &str, expected: usize) -> Result<()> {
    let value = json_path(response, expr)?;
    match &value {
        Value::Array(items) if items.len() == expected => Ok(()),
        Value::Array(items) => Err(StepError::mismatch(format!(
            "the value {value} doesn't have count {expected} but {}",
            items.len()
        ))),
        other => Err(StepError::mismatch(format!(
            "the json path {expr} is not an array. Found {other} ({})",
            jsonpath::kind_name(other)
        ))),
    }
}

/// The path resolves to something other than null. A path that cannot be
/// evaluated at all fails with the evaluation error instead.
pub fn json_path_present(response: &CapturedResponse, expr: &str) -> Result<()> {
    let (path, value) = evaluate(response, expr)?;
    let absent = match &value {
        Value::Null => true,
        Value::Array(items) => items.is_empty() && !path.is_definite(),
        _ => false,
    };
    if absent {
        return Err(StepError::mismatch(format!(
            "the json path {expr} was not present in the response"
        )));
    }
    Ok(())
}
