use crate::transform::issue::TransformWarning;
use model::{core::value::Value, mapping::field::TargetType};

/// Checks a converted value against the local column type. `Null` fits
/// every column.
pub fn check_target_type(target: TargetType, value: &Value) -> Option<TransformWarning> {
    if fits(target, value) {
        None
    } else {
        Some(TransformWarning::TypeMismatch {
            expected: target,
            actual: value.kind(),
        })
    }
}

fn fits(target: TargetType, value: &Value) -> bool {
    match (target, value) {
        (_, Value::Null) => true,
        (TargetType::Integer, Value::Int(_)) => true,
        (TargetType::Integer, Value::Float(f)) => f.is_finite() && f.fract() == 0.0,
        (TargetType::Text, Value::String(_)) => true,
        (TargetType::Boolean, Value::Boolean(_)) => true,
        (TargetType::Date, Value::Date(_) | Value::Timestamp(_)) => true,
        _ => false,
    }
}
