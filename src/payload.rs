//! Loose JSON field coercion for request bodies.
//!
//! The frontend sends form values as whatever the input widget produced:
//! numbers, numeric strings, empty strings or `null`. These helpers collapse
//! all of them into the typed values the rest of the crate works with.

use serde_json::Value;

/// Returns the field as text when it carries a non-empty value.
///
/// Numbers are accepted (contact numbers and months often arrive unquoted),
/// but a literal `0` counts as empty.
pub fn value_as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Like [`value_as_text`], recording `name` in `missing` when empty.
pub fn required_text(
    missing: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<&Value>,
) -> Option<String> {
    let text = value_as_text(value);
    if text.is_none() {
        missing.push(name);
    }
    text
}

/// Returns the field as a number, or `None` when it is absent or unparsable.
pub fn value_as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let sanitized = s.trim().replace(',', "").replace('_', "");
            if sanitized.is_empty() {
                return None;
            }
            sanitized.parse::<f64>().ok()
        }
        Value::Bool(true) => Some(1.0),
        _ => None,
    }
}

/// Treats zero and NaN the same as a missing figure.
pub fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}
