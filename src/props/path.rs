//! Dotted-path access into prop trees.

use serde_json::Value;

use crate::page::Props;

/// Read the value at a dotted path, e.g. `"users.data"`.
pub fn get_path<'a>(props: &'a Props, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = props.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects as needed.
///
/// Returns `false` (leaving props untouched from that point on) when an
/// intermediate segment exists but is not an object.
pub fn set_path(props: &mut Props, path: &str, value: Value) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };

    let mut current = props;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Props::new()));
        match slot.as_object_mut() {
            Some(obj) => current = obj,
            None => return false,
        }
    }
    current.insert(last.to_string(), value);
    true
}

/// Prepend `value` to the array at a dotted path.
///
/// An absent target becomes a one-element array. Returns `false` when the
/// target exists but is not an array.
pub fn prepend_path(props: &mut Props, path: &str, value: Value) -> bool {
    match get_path_mut(props, path) {
        Some(Value::Array(items)) => {
            items.insert(0, value);
            true
        }
        Some(_) => false,
        None => set_path(props, path, Value::Array(vec![value])),
    }
}

/// A client-only optimistic edit to the current props.
#[derive(Debug, Clone)]
pub enum PropMutation {
    Replace(Value),
    Prepend(Value),
}

/// Apply a mutation at a dotted path. Returns `false` when the existing
/// structure is incompatible with the edit.
pub fn apply_mutation(props: &mut Props, path: &str, mutation: &PropMutation) -> bool {
    match mutation {
        PropMutation::Replace(value) => set_path(props, path, value.clone()),
        PropMutation::Prepend(value) => prepend_path(props, path, value.clone()),
    }
}

fn get_path_mut<'a>(props: &'a mut Props, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = props.get_mut(first)?;
    for segment in segments {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}
