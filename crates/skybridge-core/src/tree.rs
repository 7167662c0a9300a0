//! Strict path accessors over a generic nested-map tree
//!
//! Every typed value crosses the translation boundary through a [`Tree`]:
//! an ordered mapping from string keys to nested maps, lists, or scalars.
//! Accessors are strict — a missing segment is a distinguishable
//! [`CoreError::NotFound`], an intermediate non-object is a
//! [`CoreError::TypeMismatch`], and writes are create-only so a colliding
//! mapping surfaces as [`CoreError::AlreadySet`] instead of silently
//! overwriting.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// The universal working representation of an object under translation.
pub type Tree = serde_json::Map<String, JsonValue>;

/// Marshal a typed value into a tree.
///
/// Fails with an encoding error when the value does not serialize to an
/// object.
pub fn to_tree<T: Serialize>(value: &T) -> Result<Tree> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(CoreError::Encoding {
            message: format!("expected an object, got {}", json_type(&other)),
        }),
    }
}

/// Unmarshal a tree back into a typed value.
pub fn from_tree<T: DeserializeOwned>(tree: Tree) -> Result<T> {
    Ok(serde_json::from_value(JsonValue::Object(tree))?)
}

/// Get the value at `path`.
///
/// Fails `NotFound` if any segment is absent and `TypeMismatch` if an
/// intermediate segment exists but is not itself a nested map.
pub fn get<'a>(tree: &'a Tree, path: &[impl AsRef<str>]) -> Result<&'a JsonValue> {
    let (last, parents) = path.split_last().ok_or_else(empty_path)?;
    let mut current = tree;
    for (i, segment) in parents.iter().enumerate() {
        let at = join_path(&path[..=i]);
        current = match current.get(segment.as_ref()) {
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                return Err(CoreError::TypeMismatch {
                    path: at,
                    found: json_type(other),
                });
            }
            None => return Err(CoreError::NotFound { path: at }),
        };
    }
    current.get(last.as_ref()).ok_or_else(|| CoreError::NotFound {
        path: join_path(path),
    })
}

/// Get the nested map at `path`.
pub fn get_tree<'a>(tree: &'a Tree, path: &[impl AsRef<str>]) -> Result<&'a Tree> {
    match get(tree, path)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(CoreError::TypeMismatch {
            path: join_path(path),
            found: json_type(other),
        }),
    }
}

/// Get the nested map at `path` for mutation.
pub fn get_tree_mut<'a>(tree: &'a mut Tree, path: &[impl AsRef<str>]) -> Result<&'a mut Tree> {
    let mut current = tree;
    for (i, segment) in path.iter().enumerate() {
        let at = join_path(&path[..=i]);
        current = match current.get_mut(segment.as_ref()) {
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                return Err(CoreError::TypeMismatch {
                    path: at,
                    found: json_type(other),
                });
            }
            None => return Err(CoreError::NotFound { path: at }),
        };
    }
    Ok(current)
}

/// Write `value` at `path`, creating intermediate maps as needed.
///
/// Every write is a create, never an upsert: a populated final segment
/// fails `AlreadySet`.
pub fn set(tree: &mut Tree, value: JsonValue, path: &[impl AsRef<str>]) -> Result<()> {
    let (last, parents) = path.split_last().ok_or_else(empty_path)?;
    let mut current = tree;
    for (i, segment) in parents.iter().enumerate() {
        let at = join_path(&path[..=i]);
        current = match current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| JsonValue::Object(Tree::new()))
        {
            JsonValue::Object(map) => map,
            other => {
                return Err(CoreError::TypeMismatch {
                    path: at,
                    found: json_type(other),
                });
            }
        };
    }
    if current.contains_key(last.as_ref()) {
        return Err(CoreError::AlreadySet {
            path: join_path(path),
        });
    }
    current.insert(last.as_ref().to_string(), value);
    Ok(())
}

/// Get the nested map at `path`, creating empty maps along the way.
pub fn get_or_create_tree<'a>(
    tree: &'a mut Tree,
    path: &[impl AsRef<str>],
) -> Result<&'a mut Tree> {
    let mut current = tree;
    for (i, segment) in path.iter().enumerate() {
        let at = join_path(&path[..=i]);
        current = match current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| JsonValue::Object(Tree::new()))
        {
            JsonValue::Object(map) => map,
            other => {
                return Err(CoreError::TypeMismatch {
                    path: at,
                    found: json_type(other),
                });
            }
        };
    }
    Ok(current)
}

/// Remove and return the value at `path`, if present.
pub fn remove(tree: &mut Tree, path: &[impl AsRef<str>]) -> Option<JsonValue> {
    let (last, parents) = path.split_last()?;
    let mut current = tree;
    for segment in parents {
        current = match current.get_mut(segment.as_ref()) {
            Some(JsonValue::Object(map)) => map,
            _ => return None,
        };
    }
    current.remove(last.as_ref())
}

/// Shallow-copy every field of `source` into `target`, overwriting.
pub fn copy_fields(target: &mut Tree, source: &Tree) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

/// A shallow copy of `source` without the given keys.
pub fn skip_keys(source: &Tree, skips: &[&str]) -> Tree {
    source
        .iter()
        .filter(|(key, _)| !skips.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Split a dotted path into segments, tolerating a leading `$` or `.`.
pub fn parse_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.trim_start_matches('.');
    path.split('.').map(str::to_string).collect()
}

/// The last segment of a path, or the empty string.
pub fn base(path: &[String]) -> &str {
    path.last().map(String::as_str).unwrap_or("")
}

/// Render path segments back into dotted form.
pub fn join_path(path: &[impl AsRef<str>]) -> String {
    path.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

/// The JSON type name of a value, for error messages.
pub fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

fn empty_path() -> CoreError {
    CoreError::NotFound {
        path: String::new(),
    }
}
