//! Validated decoding of backend payloads.
//!
//! Top-level shape problems (missing `nodes`, wrong container type) are
//! errors. Individual malformed items are rejected and reported alongside
//! the items that did decode, so one bad node does not blank the graph.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::types::{GraphEdge, GraphNode, GraphSnapshot};

/// A decoded snapshot plus the items that had to be dropped.
#[derive(Debug)]
pub struct SnapshotDecode {
    pub snapshot: GraphSnapshot,
    pub rejected: Vec<DecodeError>,
}

/// Decode a `{nodes: [...], edges: [...]}` payload.
pub fn decode_snapshot(payload: &Value) -> Result<SnapshotDecode, DecodeError> {
    let obj = payload.as_object().ok_or(DecodeError::NotAnObject)?;
    let raw_nodes = array_field(obj, "nodes")?;
    let raw_edges = array_field(obj, "edges")?;

    let mut rejected = Vec::new();
    let mut seen = HashSet::new();
    let nodes = decode_items::<GraphNode>(raw_nodes, "nodes", &mut rejected)
        .into_iter()
        .filter(|node| {
            if seen.insert(node.id.clone()) {
                true
            } else {
                rejected.push(DecodeError::DuplicateId(node.id.clone()));
                false
            }
        })
        .collect();
    let mut seen_edges = HashSet::new();
    let edges = decode_items::<GraphEdge>(raw_edges, "edges", &mut rejected)
        .into_iter()
        .filter(|edge| {
            let key = edge.key();
            if seen_edges.contains(&key) {
                rejected.push(DecodeError::DuplicateEdge(key));
                false
            } else {
                seen_edges.insert(key);
                true
            }
        })
        .collect();

    Ok(SnapshotDecode {
        snapshot: GraphSnapshot { nodes, edges },
        rejected,
    })
}

/// Decode a list endpoint. The backend returns either a bare array or an
/// object wrapping it under `key`.
pub fn decode_list<T: DeserializeOwned>(
    payload: &Value,
    key: &'static str,
) -> Result<Vec<T>, DecodeError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(obj) => array_field(obj, key)?,
        _ => {
            return Err(DecodeError::WrongType {
                field: key,
                expected: "array or object",
            })
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item.clone()).map_err(|source| DecodeError::InvalidItem {
                field: key,
                index,
                source,
            })
        })
        .collect()
}

/// Parse a list-of-strings field that may arrive as an array, as a
/// JSON-encoded string (`"[\"a\",\"b\"]"`), as a comma separated string,
/// or as null.
pub fn parse_string_list(raw: &Value) -> Result<Vec<String>, DecodeError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Vec::new());
            }
            if trimmed.starts_with('[') {
                let inner: Value = serde_json::from_str(trimmed)
                    .map_err(|e| DecodeError::EmbeddedJson(e.to_string()))?;
                return match inner {
                    Value::Array(_) => parse_string_list(&inner),
                    _ => Err(DecodeError::EmbeddedJson("expected a JSON array".into())),
                };
            }
            Ok(trimmed
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect())
        }
        _ => Err(DecodeError::WrongType {
            field: "list",
            expected: "array, string or null",
        }),
    }
}

fn scalar_to_string(item: &Value) -> Result<String, DecodeError> {
    match item {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(DecodeError::WrongType {
            field: "list item",
            expected: "string",
        }),
    }
}

fn array_field<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Vec<Value>, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(DecodeError::WrongType {
            field,
            expected: "array",
        }),
    }
}

fn decode_items<T: DeserializeOwned>(
    items: &[Value],
    field: &'static str,
    rejected: &mut Vec<DecodeError>,
) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item.clone()) {
            Ok(value) => Some(value),
            Err(source) => {
                rejected.push(DecodeError::InvalidItem {
                    field,
                    index,
                    source,
                });
                None
            }
        })
        .collect()
}
