//! Reading serialized collections that may be stale, hand-edited or written
//! by older versions of the tool.
//!
//! Only the top-level shape is a hard requirement: anything other than an
//! array is rejected. Individual entries are patched up where a sensible
//! default exists and dropped (with a warning) where none does.
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::ids::generate_id;
use crate::types::{Counter, DEFAULT_NAME};

/// Parses and repairs a serialized collection.
pub fn parse_collection(text: &str) -> Result<Vec<Counter>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(ImportError::NotAnArray {
                found: kind_of(&other),
            });
        }
    };

    let total = entries.len();
    let counters: Vec<Counter> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| repair_entry(index, entry))
        .collect();
    if counters.len() < total {
        warn!(
            kept = counters.len(),
            dropped = total - counters.len(),
            "dropped unreadable counters"
        );
    }
    Ok(counters)
}

fn repair_entry(index: usize, entry: Value) -> Option<Counter> {
    let mut fields = match entry {
        Value::Object(fields) => fields,
        other => {
            warn!(index, found = kind_of(&other), "skipping non-object counter entry");
            return None;
        }
    };

    repair_id(&mut fields);
    repair_name(&mut fields);
    repair_count(&mut fields);
    repair_goal(&mut fields);
    repair_unsigned(&mut fields, "order");
    repair_millis(&mut fields, "createdAt");
    for key in ["color", "icon", "category", "activeSessionId"] {
        if !fields.get(key).is_some_and(Value::is_string) {
            fields.remove(key);
        }
    }
    if !fields.get("isArchived").is_some_and(Value::is_boolean) {
        fields.remove("isArchived");
    }
    let logs = take_array(&mut fields, "logs");
    let sessions = take_array(&mut fields, "sessions");

    let mut counter: Counter = match serde_json::from_value(Value::Object(fields)) {
        Ok(counter) => counter,
        Err(err) => {
            warn!(index, error = %err, "skipping unreadable counter entry");
            return None;
        }
    };
    counter.logs = repair_items(&counter.id, "log", logs, repair_log);
    counter.sessions = repair_items(&counter.id, "session", sessions, repair_session);

    if counter.active_session_id.is_some() && counter.active_session().is_none() {
        debug!(counter = %counter.id, "clearing dangling active session");
        counter.active_session_id = None;
    }
    Some(counter)
}

fn take_array(fields: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match fields.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Repairs each history item on its own and drops the ones that stay
/// unreadable, so one bad item never costs the whole counter.
fn repair_items<T: DeserializeOwned>(
    counter: &str,
    kind: &'static str,
    items: Vec<Value>,
    repair: fn(&mut Map<String, Value>),
) -> Vec<T> {
    let total = items.len();
    let repaired: Vec<T> = items
        .into_iter()
        .filter_map(|item| {
            let Value::Object(mut fields) = item else {
                return None;
            };
            repair_id(&mut fields);
            repair(&mut fields);
            serde_json::from_value(Value::Object(fields)).ok()
        })
        .collect();
    if repaired.len() < total {
        warn!(
            counter,
            kind,
            dropped = total - repaired.len(),
            "dropped unreadable history items"
        );
    }
    repaired
}

fn repair_log(fields: &mut Map<String, Value>) {
    repair_millis(fields, "timestamp");
    repair_unsigned(fields, "newValue");
}

fn repair_session(fields: &mut Map<String, Value>) {
    repair_millis(fields, "startTime");
    repair_millis(fields, "endTime");
    repair_unsigned(fields, "startValue");
    repair_unsigned(fields, "endValue");
    repair_unsigned(fields, "duration");
    if !fields.get("notes").is_some_and(Value::is_string) {
        fields.remove("notes");
    }
}

fn repair_id(fields: &mut Map<String, Value>) {
    let valid = fields
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if !valid {
        let id = generate_id();
        debug!(%id, "assigning missing id");
        fields.insert("id".to_string(), Value::String(id));
    }
}

fn repair_name(fields: &mut Map<String, Value>) {
    let valid = fields
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !valid {
        fields.insert("name".to_string(), Value::String(DEFAULT_NAME.to_string()));
    }
}

fn repair_count(fields: &mut Map<String, Value>) {
    let count = fields.get("count").map(non_negative_integer).unwrap_or(0);
    fields.insert("count".to_string(), Value::from(count));
}

fn repair_goal(fields: &mut Map<String, Value>) {
    let Some(goal) = fields.get("goal") else {
        return;
    };
    match non_negative_integer(goal) {
        0 => {
            fields.remove("goal");
        }
        goal => {
            fields.insert("goal".to_string(), Value::from(goal));
        }
    }
}

/// A null field is removed; any other value becomes a non-negative integer.
fn repair_unsigned(fields: &mut Map<String, Value>, key: &str) {
    match fields.get(key) {
        None => {}
        Some(Value::Null) => {
            fields.remove(key);
        }
        Some(value) => {
            let n = non_negative_integer(value);
            fields.insert(key.to_string(), Value::from(n));
        }
    }
}

fn repair_millis(fields: &mut Map<String, Value>, key: &str) {
    match fields.get(key) {
        None => {}
        Some(Value::Null) => {
            fields.remove(key);
        }
        Some(value) => {
            let millis = whole_millis(value);
            fields.insert(key.to_string(), Value::from(millis));
        }
    }
}

fn whole_millis(value: &Value) -> i64 {
    if let Some(n) = value.as_i64() {
        return n;
    }
    match value.as_f64() {
        Some(n) if n.is_finite() => n.floor() as i64,
        _ => 0,
    }
}

/// Whole part of a non-negative number, or 0 for anything else.
fn non_negative_integer(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    match value.as_f64() {
        Some(n) if n.is_finite() && n > 0.0 => n.floor() as u64,
        _ => 0,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
