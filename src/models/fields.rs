//! Field lookup helpers shared by the entity normalizers.
//!
//! The API is not consistent about field names or value types: the same concept may
//! arrive under several keys, ids may be numbers or strings, counts may be quoted.
//! Each helper takes the candidate keys in priority order and returns the first
//! usable value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

pub(crate) type Object = Map<String, Value>;

/// First non-empty string among `keys`; numbers are rendered as strings
pub(crate) fn pick_str(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Identifier that may be sent as a number or a string
pub(crate) fn pick_id(obj: &Object, keys: &[&str]) -> Option<String> {
    pick_str(obj, keys)
}

/// Non-negative integer, accepting quoted numbers
pub(crate) fn pick_u32(obj: &Object, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Signed integer, accepting quoted numbers
pub(crate) fn pick_i32(obj: &Object, keys: &[&str]) -> Option<i32> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub(crate) fn pick_bool(obj: &Object, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Timestamp given as RFC 3339, a naive date-time, a bare date, or epoch milliseconds
pub(crate) fn pick_datetime(obj: &Object, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Unwrap a list payload that may be bare or enveloped under one of `envelopes`
pub(crate) fn list_items<'a>(value: &'a Value, envelopes: &[&str]) -> &'a [Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(obj) => envelopes
            .iter()
            .find_map(|key| match obj.get(*key) {
                Some(inner @ Value::Array(_)) => Some(list_items(inner, envelopes)),
                Some(inner @ Value::Object(_)) => {
                    Some(list_items(inner, envelopes)).filter(|items| !items.is_empty())
                }
                _ => None,
            })
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Unwrap a single-entity payload that may be enveloped under one of `envelopes`
pub(crate) fn entity<'a>(value: &'a Value, envelopes: &[&str]) -> Option<&'a Object> {
    let obj = value.as_object()?;
    for key in envelopes {
        if let Some(Value::Object(inner)) = obj.get(*key) {
            return Some(inner);
        }
    }
    Some(obj)
}
