//! Timing metric extraction
//!
//! Backends report their own elapsed time somewhere in the JSON body: at the
//! top level, under a wrapper object, or deeper inside arrays. The search is
//! depth-first in document order. An object's own key is checked before any
//! of its values are descended into, and array elements are visited from
//! index 0. The first occurrence wins, even if its value is not numeric.

use serde_json::Value;

/// Outcome of looking for the timing field in a response body
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<'a> {
    Found(f64),
    Missing,
    /// The first occurrence exists but cannot be read as a number
    NonNumeric(&'a Value),
}

/// Returns the first occurrence of `field` in depth-first order.
pub fn locate<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    let mut stack: Vec<&'a Value> = vec![value];

    while let Some(node) = stack.pop() {
        match node {
            Value::Object(map) => {
                if let Some(found) = map.get(field) {
                    return Some(found);
                }
                stack.extend(map.values().rev());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }

    None
}

/// Reads a located value as milliseconds.
///
/// Numbers and numeric strings are accepted; everything else, including
/// non-finite parses, is rejected.
pub fn as_metric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn inspect<'a>(value: &'a Value, field: &str) -> Extraction<'a> {
    match locate(value, field) {
        None => Extraction::Missing,
        Some(found) => match as_metric(found) {
            Some(ms) => Extraction::Found(ms),
            None => Extraction::NonNumeric(found),
        },
    }
}
