//! Query-string type coercion.
//!
//! Query values arrive as strings. Numeric and boolean literals are turned
//! into JSON numbers and booleans before validation; everything else is left
//! untouched. In particular `"null"` and `"undefined"` stay strings, so a
//! client cannot make a required field look absent.

use serde_json::{Number, Value};

use crate::validation::DataBag;

/// Coerce every string value of a query bag. Non-string values are kept as-is.
pub fn coerce_bag(bag: &DataBag) -> DataBag {
    bag.iter()
        .map(|(key, value)| {
            let coerced = match value {
                Value::String(raw) => coerce_value(raw),
                other => other.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

/// Infer a primitive from one query value.
pub fn coerce_value(raw: &str) -> Value {
    if is_numeric(raw) {
        if let Some(number) = to_number(raw) {
            return Value::Number(number);
        }
    }

    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// `[+-]?digits(.digits)?([eE][+-]?digits)?`
fn is_numeric(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if !eat_digits(bytes, &mut i) {
        return false;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        if !eat_digits(bytes, &mut i) {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if !eat_digits(bytes, &mut i) {
            return false;
        }
    }

    i == bytes.len()
}

fn eat_digits(bytes: &[u8], i: &mut usize) -> bool {
    let start = *i;
    while bytes.get(*i).is_some_and(u8::is_ascii_digit) {
        *i += 1;
    }
    *i > start
}

/// Integral values become JSON integers so `1e3` and `1000` compare equal.
/// Values that overflow to infinity are not numbers.
fn to_number(raw: &str) -> Option<Number> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Number::from(int));
    }

    let float: f64 = raw.parse().ok()?;
    if !float.is_finite() {
        return None;
    }

    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    if float.fract() == 0.0 && float.abs() <= LIMIT {
        return Some(Number::from(float as i64));
    }

    Number::from_f64(float)
}
