// ── Document flattening ──
//
// Converts a nested JSON document into a flat map of dotted paths to
// scalar leaves. Object keys become path segments, list positions become
// `i<index>` segments, nulls produce no entry. A scalar document is
// returned as-is under the prefix, which may be empty.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::Scalar;

/// Nesting bound. Deeper documents are rejected as a whole.
pub const MAX_DEPTH: usize = 64;

struct TooDeep;

/// Flatten `value` under `prefix` (empty for no prefix).
///
/// Returns an empty map if the document nests deeper than [`MAX_DEPTH`];
/// a partial map would silently drop signals.
pub fn flatten(value: &Value, prefix: &str) -> BTreeMap<String, Scalar> {
    let mut out = BTreeMap::new();
    if walk(value, prefix, 0, &mut out).is_err() {
        tracing::warn!(prefix, max_depth = MAX_DEPTH, "Document too deep, ignoring");
        return BTreeMap::new();
    }
    out
}

fn walk(
    value: &Value,
    path: &str,
    depth: usize,
    out: &mut BTreeMap<String, Scalar>,
) -> Result<(), TooDeep> {
    if depth > MAX_DEPTH {
        return Err(TooDeep);
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, &join(path, key), depth + 1, out)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, &join(path, &format!("i{index}")), depth + 1, out)?;
            }
        }
        Value::Null => {}
        Value::Bool(b) => leaf(out, path, Scalar::Bool(*b)),
        Value::Number(n) => leaf(out, path, Scalar::from_number(n)),
        Value::String(s) => leaf(out, path, Scalar::Str(s.clone())),
    }
    Ok(())
}

fn leaf(out: &mut BTreeMap<String, Scalar>, path: &str, value: Scalar) {
    out.insert(path.to_owned(), value);
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
