//! Transformation mapper
//!
//! Bidirectional mapping between the external nested payload shape and the
//! internal flat field-name value map. A `TransformMap` pairs each internal
//! field name with a dotted, bracket-indexed path into the external payload
//! (`borrower.address.city`, `borrowers[0].firstName`).
//!
//! Neither direction errors on missing or extra keys: an unresolvable
//! inbound path yields an absent value, and outbound creates intermediate
//! containers as needed. Paths absent from the map are dropped outbound and
//! ignored inbound.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::condition::ValueMap;

// ---------------------------------------------------------------------------
// TransformMap
// ---------------------------------------------------------------------------

/// Ordered field-name → external-path pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformMap(pub BTreeMap<String, String>);

impl TransformMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TransformMap {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Path grammar
// ---------------------------------------------------------------------------

/// One hop in an external path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parse `a.b[0].c` into segments. Returns `None` on malformed paths
/// (empty segments, unclosed or non-numeric brackets).
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        let key_end = rest.find('[').unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return None;
        }
        segments.push(PathSegment::Key(key.to_string()));
        rest = &rest[key_end..];
        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']')?;
            let index: usize = stripped[..close].parse().ok()?;
            segments.push(PathSegment::Index(index));
            rest = &stripped[close + 1..];
        }
        if !rest.is_empty() {
            return None;
        }
    }
    (!segments.is_empty()).then_some(segments)
}

// ---------------------------------------------------------------------------
// Inbound / outbound
// ---------------------------------------------------------------------------

/// Resolve every mapped path against the external payload. Missing paths
/// yield absent entries, never errors.
pub fn inbound(payload: &Value, map: &TransformMap) -> ValueMap {
    let mut values = ValueMap::new();
    for (field, path) in map.iter() {
        let Some(segments) = parse_path(path) else {
            debug!(%field, %path, "skipping malformed inbound path");
            continue;
        };
        if let Some(found) = get_path(payload, &segments) {
            values.insert(field.clone(), found.clone());
        }
    }
    values
}

/// Write every mapped internal value to its external path, creating
/// intermediate objects and null-padded arrays as needed.
pub fn outbound(values: &ValueMap, map: &TransformMap) -> Value {
    let mut payload = Value::Object(Map::new());
    for (field, path) in map.iter() {
        let Some(value) = values.get(field) else {
            continue;
        };
        let Some(segments) = parse_path(path) else {
            debug!(%field, %path, "skipping malformed outbound path");
            continue;
        };
        set_path(&mut payload, &segments, value.clone());
    }
    payload
}

fn get_path<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(key)?,
            PathSegment::Index(i) => current.as_array()?.get(*i)?,
        };
    }
    Some(current)
}

fn set_path(root: &mut Value, segments: &[PathSegment], value: Value) {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        match segment {
            PathSegment::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let map = current.as_object_mut().expect("coerced to object above");
                if last {
                    map.insert(key.clone(), value);
                    return;
                }
                current = map.entry(key.clone()).or_insert(Value::Null);
            }
            PathSegment::Index(index) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                let items = current.as_array_mut().expect("coerced to array above");
                while items.len() <= *index {
                    items.push(Value::Null);
                }
                if last {
                    items[*index] = value;
                    return;
                }
                current = &mut items[*index];
            }
        }
    }
}
