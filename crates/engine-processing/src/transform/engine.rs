use crate::transform::{
    issue::{TransformError, TransformOutcome},
    validation::check_target_type,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::{
    core::value::Value,
    mapping::field::{Direction, FieldMapping, TransformFunction},
};

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Converts one raw value with a named function. Pure and deterministic;
/// a failed conversion is reported in the outcome, never raised.
///
/// `Null` and blank strings come out as `Null` for every function.
pub fn transform(direction: Direction, function: TransformFunction, raw: &Value) -> TransformOutcome {
    if raw.is_blank() {
        return TransformOutcome::resolved(Value::Null);
    }

    let result = match direction {
        Direction::RemoteToLocal => inbound(function, raw),
        Direction::LocalToRemote => outbound(function, raw),
    };
    result.into()
}

/// Runs the mapping's function and, for inbound values, checks the result
/// against the mapping's local column type.
pub fn transform_field(direction: Direction, mapping: &FieldMapping, raw: &Value) -> TransformOutcome {
    let outcome = transform(direction, mapping.transform_function, raw);
    if direction != Direction::RemoteToLocal {
        return outcome;
    }
    let mismatch = outcome
        .value
        .as_ref()
        .and_then(|value| check_target_type(mapping.target_type, value));
    match mismatch {
        Some(warning) => outcome.with_warning(warning),
        None => outcome,
    }
}

fn inbound(function: TransformFunction, raw: &Value) -> Result<Value, TransformError> {
    match function {
        TransformFunction::Identity => Ok(raw.clone()),
        TransformFunction::ToNumber => to_number(raw),
        TransformFunction::ToString => Ok(stringify(raw)),
        TransformFunction::ToBoolean => Ok(Value::Boolean(truthy(raw))),
        TransformFunction::ToDate | TransformFunction::ToTimestamp => {
            to_timestamp(function, raw).map(Value::Timestamp)
        }
    }
}

fn outbound(function: TransformFunction, raw: &Value) -> Result<Value, TransformError> {
    match function {
        TransformFunction::Identity => Ok(raw.clone()),
        TransformFunction::ToNumber | TransformFunction::ToString => Ok(stringify(raw)),
        TransformFunction::ToBoolean => {
            let flag = if truthy(raw) { "Y" } else { "N" };
            Ok(Value::String(flag.to_string()))
        }
        TransformFunction::ToDate | TransformFunction::ToTimestamp => {
            let date = match raw {
                Value::Date(date) => *date,
                other => to_timestamp(function, other)?.date_naive(),
            };
            Ok(Value::String(date.format("%Y-%m-%d").to_string()))
        }
    }
}

fn stringify(raw: &Value) -> Value {
    raw.to_text().map_or(Value::Null, Value::String)
}

/// `"Y"`, `"1"`, `"true"`, `true` and `1` are true; everything else is false.
fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Boolean(b) => *b,
        Value::Int(i) => *i == 1,
        Value::Float(f) => *f == 1.0,
        other => other.as_str().is_some_and(|s| {
            let s = s.trim();
            s.eq_ignore_ascii_case("y") || s == "1" || s.eq_ignore_ascii_case("true")
        }),
    }
}

fn to_number(raw: &Value) -> Result<Value, TransformError> {
    match raw {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.is_finite() => Ok(Value::Float(*f)),
        Value::Float(f) => Err(TransformError::NonFinite(f.to_string())),
        other => match other.as_str() {
            Some(s) => parse_number(s),
            None => Err(TransformError::UnsupportedInput {
                function: TransformFunction::ToNumber,
                kind: other.kind(),
            }),
        },
    }
}

fn parse_number(s: &str) -> Result<Value, TransformError> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Float(f)),
        Ok(_) => Err(TransformError::NonFinite(trimmed.to_string())),
        Err(_) => Err(TransformError::NotANumber(trimmed.to_string())),
    }
}

fn to_timestamp(function: TransformFunction, raw: &Value) -> Result<DateTime<Utc>, TransformError> {
    match raw {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(date) => Ok(midnight(*date)),
        other => match other.as_str() {
            Some(s) => parse_iso8601(s),
            None => Err(TransformError::UnsupportedInput {
                function,
                kind: other.kind(),
            }),
        },
    }
}

/// RFC 3339, a naive date-time taken as UTC, or a plain date at midnight UTC.
fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TransformError> {
    let trimmed = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(midnight)
        .map_err(|_| TransformError::InvalidDate(trimmed.to_string()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}
