//! Per-prop merge strategies.
//!
//! The strategy for a prop path is declared by the server response manifest,
//! never guessed from value shape: `replace` (default), `merge` (shallow),
//! `deep merge` (recursive), and identity-keyed array merges via
//! `match_props_on` selectors of the form `path.key`.
//!
//! Merging is a pure function of `(current, incoming, manifest)`: inputs are
//! never mutated, so applying the same response to the same starting props
//! yields identical results every time.

use serde_json::Value;

use crate::page::{Page, Props};

/// Borrowed view of the server's merge declarations for one response.
#[derive(Debug, Clone, Copy)]
pub struct MergeManifest<'a> {
    /// Dotted paths merged shallowly.
    pub merge: &'a [String],
    /// Dotted paths merged recursively.
    pub deep_merge: &'a [String],
    /// `path.key` selectors for identity-keyed array merges.
    pub match_on: &'a [String],
}

impl<'a> MergeManifest<'a> {
    pub fn from_page(page: &'a Page) -> Self {
        Self {
            merge: &page.merge_props,
            deep_merge: &page.deep_merge_props,
            match_on: &page.match_props_on,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.merge.is_empty() && self.deep_merge.is_empty()
    }

    fn is_merge(&self, path: &str) -> bool {
        self.merge.iter().any(|p| p == path)
    }

    fn is_deep(&self, path: &str) -> bool {
        self.deep_merge.iter().any(|p| p == path)
    }

    /// True when some declared path lies strictly below `path`.
    fn has_nested(&self, path: &str) -> bool {
        let prefix = format!("{path}.");
        self.merge
            .iter()
            .chain(self.deep_merge.iter())
            .any(|p| p.starts_with(&prefix))
    }

    /// Identity key for arrays at `path`, from a `path.key` selector.
    fn match_key(&self, path: &str) -> Option<&str> {
        self.match_on.iter().find_map(|selector| {
            let (head, key) = selector.rsplit_once('.')?;
            (head == path).then_some(key)
        })
    }
}

/// Merge an incoming prop set onto the current one.
///
/// Props absent from `incoming` are retained unchanged; that is what makes
/// partial responses additive over the last known state.
pub fn merge_props(current: &Props, incoming: &Props, manifest: &MergeManifest) -> Props {
    let mut out = current.clone();
    for (name, value) in incoming {
        let merged = merge_value(current.get(name), value, name, manifest);
        out.insert(name.clone(), merged);
    }
    out
}

fn merge_value(
    current: Option<&Value>,
    incoming: &Value,
    path: &str,
    manifest: &MergeManifest,
) -> Value {
    if manifest.is_deep(path) {
        return deep_merge(current, incoming, path, manifest);
    }
    if manifest.is_merge(path) {
        return shallow_merge(current, incoming, path, manifest);
    }
    if manifest.has_nested(path) {
        // Replace semantics at this level, but descend so a declared nested
        // path (e.g. `users.data`) still merges inside the replaced object.
        if let (Some(Value::Object(cur)), Value::Object(inc)) = (current, incoming) {
            let mut out = Props::new();
            for (key, value) in inc {
                let child = format!("{path}.{key}");
                out.insert(key.clone(), merge_value(cur.get(key), value, &child, manifest));
            }
            return Value::Object(out);
        }
    }
    incoming.clone()
}

fn deep_merge(
    current: Option<&Value>,
    incoming: &Value,
    path: &str,
    manifest: &MergeManifest,
) -> Value {
    match (current, incoming) {
        (Some(Value::Object(cur)), Value::Object(inc)) => {
            let mut out = cur.clone();
            for (key, value) in inc {
                let child = format!("{path}.{key}");
                out.insert(key.clone(), deep_merge(cur.get(key), value, &child, manifest));
            }
            Value::Object(out)
        }
        (Some(Value::Array(cur)), Value::Array(inc)) => merge_arrays(cur, inc, path, manifest),
        _ => incoming.clone(),
    }
}

fn shallow_merge(
    current: Option<&Value>,
    incoming: &Value,
    path: &str,
    manifest: &MergeManifest,
) -> Value {
    match (current, incoming) {
        (Some(Value::Array(cur)), Value::Array(inc)) => merge_arrays(cur, inc, path, manifest),
        (Some(Value::Object(cur)), Value::Object(inc)) => {
            let mut out = cur.clone();
            for (key, value) in inc {
                out.insert(key.clone(), value.clone());
            }
            Value::Object(out)
        }
        _ => incoming.clone(),
    }
}

fn merge_arrays(
    current: &[Value],
    incoming: &[Value],
    path: &str,
    manifest: &MergeManifest,
) -> Value {
    let mut out = current.to_vec();
    match manifest.match_key(path) {
        Some(key) => {
            for item in incoming {
                match item.get(key) {
                    Some(id) => {
                        // Later items with the same identity replace earlier
                        // ones in place instead of appending.
                        if let Some(existing) =
                            out.iter_mut().find(|candidate| candidate.get(key) == Some(id))
                        {
                            *existing = item.clone();
                        } else {
                            out.push(item.clone());
                        }
                    }
                    None => out.push(item.clone()),
                }
            }
        }
        None => out.extend(incoming.iter().cloned()),
    }
    Value::Array(out)
}
