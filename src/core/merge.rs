//! SD-002: Merge/replace rules and input coercion for field values.

use super::types::{FieldKind, FieldValue, Mode};
use indexmap::IndexMap;
use serde_json::Value;

/// Combine a mapping update with the existing mapping.
///
/// Merge overrides key-wise and preserves keys absent from `new`.
/// Replace substitutes `new` wholesale.
pub fn integrate_maps(
    before: &IndexMap<String, String>,
    new: IndexMap<String, String>,
    mode: Mode,
) -> IndexMap<String, String> {
    match mode {
        Mode::Merge => {
            let mut merged = before.clone();
            merged.extend(new);
            merged
        }
        Mode::Replace => new,
    }
}

/// Combine a list update with the existing list.
///
/// Merge is an ordered union: existing elements first, then new elements not
/// already present. Replace with an empty list keeps `before`.
pub fn integrate_lists(before: &[String], new: Vec<String>, mode: Mode) -> Vec<String> {
    match mode {
        Mode::Merge => {
            let mut merged = before.to_vec();
            for item in new {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            merged
        }
        Mode::Replace if new.is_empty() => before.to_vec(),
        Mode::Replace => new,
    }
}

/// Apply an already-coerced update to a value of the same kind.
/// A kind mismatch leaves `before` untouched.
pub fn integrate(before: &FieldValue, new: FieldValue, mode: Mode) -> FieldValue {
    match (before, new) {
        (FieldValue::Map(b), FieldValue::Map(n)) => FieldValue::Map(integrate_maps(b, n, mode)),
        (FieldValue::List(b), FieldValue::List(n)) => {
            FieldValue::List(integrate_lists(b, n, mode))
        }
        (b, _) => b.clone(),
    }
}

/// Decode raw input as a value of `kind`.
///
/// Structured input is used directly. String input is decoded as JSON text.
/// Blank input (null, empty or whitespace-only text) is the kind's empty
/// value. Input that carries something else, such as prose, `<<inherit>>`
/// or a list where a mapping belongs, yields `None`.
pub fn decode(kind: FieldKind, input: &Value) -> Option<FieldValue> {
    match input {
        Value::Null => Some(kind.empty()),
        Value::String(text) if text.trim().is_empty() => Some(kind.empty()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(decoded) if !decoded.is_string() => decode(kind, &decoded),
            Ok(_) | Err(_) => None,
        },
        Value::Object(obj) => match kind {
            FieldKind::Text | FieldKind::Map => Some(FieldValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                    .collect(),
            )),
            FieldKind::List => None,
        },
        Value::Array(items) => match kind {
            FieldKind::List => Some(FieldValue::List(
                items.iter().map(scalar_to_string).collect(),
            )),
            FieldKind::Text | FieldKind::Map => None,
        },
        Value::Bool(_) | Value::Number(_) => None,
    }
}

/// Coerce update input into a value of `kind`; undecodable input is empty.
pub fn coerce(kind: FieldKind, input: &Value) -> FieldValue {
    decode(kind, input).unwrap_or_else(|| {
        tracing::debug!(kind = ?kind, "ignoring undecodable field input");
        kind.empty()
    })
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
