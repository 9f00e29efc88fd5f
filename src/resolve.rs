//! Same-document `$ref` dereferencing.
//!
//! Walks a JSON tree and replaces every `{"$ref": "#/..."}` marker with the
//! node it points to, resolving the pointee as well. The input is never
//! mutated; a fresh tree is returned.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ReferenceError;

/// Maximum number of `$ref` hops followed along a single branch.
pub const MAX_REF_DEPTH: usize = 100;

/// Resolve every internal `$ref` inside `node` against `document`.
pub fn resolve(node: &Value, document: &Value) -> Result<Value, ReferenceError> {
    resolve_at(node, document, 0)
}

fn resolve_at(node: &Value, document: &Value, hops: usize) -> Result<Value, ReferenceError> {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(pointer)) = map.get("$ref") {
                if hops >= MAX_REF_DEPTH {
                    return Err(ReferenceError::ReferenceCycle {
                        pointer: pointer.clone(),
                        depth: MAX_REF_DEPTH,
                    });
                }
                let target = lookup(pointer, document)?;
                trace!(%pointer, hops, "following $ref");
                return resolve_at(target, document, hops + 1);
            }

            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_at(value, document, hops)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_at(item, document, hops))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Follow `$ref` markers at the top of `node` only, leaving nested references
/// untouched. Recursive schemas below the returned node never get walked.
pub fn follow<'a>(node: &'a Value, document: &'a Value) -> Result<&'a Value, ReferenceError> {
    let mut current = node;
    let mut hops = 0;
    while let Some(pointer) = current.get("$ref").and_then(Value::as_str) {
        if hops >= MAX_REF_DEPTH {
            return Err(ReferenceError::ReferenceCycle {
                pointer: pointer.to_string(),
                depth: MAX_REF_DEPTH,
            });
        }
        current = lookup(pointer, document)?;
        hops += 1;
    }
    Ok(current)
}

/// Look up a `#/a/b/c` JSON pointer in `document` without resolving the result.
pub fn lookup<'a>(pointer: &str, document: &'a Value) -> Result<&'a Value, ReferenceError> {
    let Some(path) = pointer.strip_prefix("#/") else {
        return Err(ReferenceError::UnsupportedReferenceKind {
            pointer: pointer.to_string(),
        });
    };

    let mut current = document;
    for raw in path.split('/') {
        let segment = decode_segment(raw);
        current = current
            .as_object()
            .and_then(|map| map.get(&segment))
            .ok_or_else(|| ReferenceError::BrokenReference {
                pointer: pointer.to_string(),
                segment: segment.clone(),
            })?;
    }
    Ok(current)
}

fn decode_segment(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    decoded.replace("~1", "/").replace("~0", "~")
}
