//! Query-string serialization for visit data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::Props;

/// How array values are keyed in a query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFormat {
    /// `tags[]=a&tags[]=b`
    #[default]
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

/// Append `data` to the URL's query string, preserving existing pairs.
pub fn merge_query(url: &mut reqwest::Url, data: &Props, format: ArrayFormat) {
    let mut flat = Vec::new();
    for (name, value) in data {
        push_pairs(&mut flat, name.clone(), value, format);
    }
    if flat.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in flat {
        pairs.append_pair(&key, &value);
    }
}

fn push_pairs(out: &mut Vec<(String, String)>, key: String, value: &Value, format: ArrayFormat) {
    match value {
        Value::Null => out.push((key, String::new())),
        Value::Bool(b) => out.push((key, b.to_string())),
        Value::Number(n) => out.push((key, n.to_string())),
        Value::String(s) => out.push((key, s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let item_key = match format {
                    ArrayFormat::Brackets => format!("{key}[]"),
                    ArrayFormat::Indices => format!("{key}[{index}]"),
                };
                push_pairs(out, item_key, item, format);
            }
        }
        Value::Object(fields) => {
            for (name, field) in fields {
                push_pairs(out, format!("{key}[{name}]"), field, format);
            }
        }
    }
}
