//! Tree flattener and builder.
//!
//! `flatten` turns a nested value into ordered `(path, leaf)` pairs;
//! `build` is its inverse. Empty maps and sequences survive the trip as
//! explicit marker leaves (`{}` / `[]`).

use crate::path::{self, Key, Path};
use cairn_core::error::StoreError;
use serde_json::{Map, Value};

/// Flatten a value into leaves, maps in key order and sequences by index.
///
/// `null` at the root flattens to nothing; a bare scalar root yields one
/// leaf with the empty path.
pub fn flatten(value: &Value) -> Vec<(Path, Value)> {
    let mut out = Vec::new();
    if !value.is_null() {
        walk(value, &mut Vec::new(), &mut out);
    }
    out
}

fn walk(value: &Value, prefix: &mut Path, out: &mut Vec<(Path, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                prefix.push(Key::Name(k.clone()));
                walk(v, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.iter().enumerate() {
                prefix.push(Key::Index(i));
                walk(v, prefix, out);
                prefix.pop();
            }
        }
        leaf => out.push((prefix.clone(), leaf.clone())),
    }
}

/// Rebuild a value from leaves.
///
/// Containers are created on demand, their kind chosen by the key that
/// descends into them. Sequences grow with `null` padding. A marker leaf
/// fixes the kind of its container; leaves that contradict an already built
/// shape fail with [`StoreError::ShapeConflict`].
pub fn build<I>(leaves: I) -> Result<Value, StoreError>
where
    I: IntoIterator<Item = (Path, Value)>,
{
    let mut leaves = leaves.into_iter().peekable();
    let Some((first_path, first_value)) = leaves.next() else {
        return Ok(Value::Null);
    };

    if first_path.is_empty() {
        return match leaves.peek() {
            None => Ok(first_value),
            Some((other, _)) => Err(StoreError::ShapeConflict {
                path: path::encode(other),
            }),
        };
    }

    let mut root = Value::Null;
    insert(&mut root, &first_path, first_value)?;
    for (path, value) in leaves {
        insert(&mut root, &path, value)?;
    }
    Ok(root)
}

fn insert(root: &mut Value, path: &[Key], value: Value) -> Result<(), StoreError> {
    let conflict = || StoreError::ShapeConflict {
        path: path::encode(path),
    };

    if path.is_empty() {
        return Err(conflict());
    }

    let mut node = root;
    for key in path {
        if node.is_null() {
            *node = match key {
                Key::Index(_) => Value::Array(Vec::new()),
                Key::Name(_) => Value::Object(Map::new()),
            };
        }
        node = match (node, key) {
            (Value::Array(items), Key::Index(i)) => {
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                &mut items[*i]
            }
            (Value::Object(map), Key::Name(name)) => map.entry(name.clone()).or_insert(Value::Null),
            _ => return Err(conflict()),
        };
    }

    if node.is_null() {
        *node = value;
        return Ok(());
    }

    // A marker landing on a container of its own kind adds nothing.
    let same_marker = match (&*node, &value) {
        (Value::Array(_), Value::Array(marker)) => marker.is_empty(),
        (Value::Object(_), Value::Object(marker)) => marker.is_empty(),
        _ => false,
    };
    if same_marker { Ok(()) } else { Err(conflict()) }
}
