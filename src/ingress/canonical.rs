//! The one canonical encoding every ingress representation ends up in.
//!
//! Rules, applied to the top-level object:
//! - `_id` becomes `id`; `envId` becomes `environmentId` (explicit names win)
//! - `id` / `environmentId` must be UUID strings, rewritten lowercase hyphenated
//! - `createdAt` / `updatedAt`, when present, must be RFC 3339 strings or Unix
//!   millis, rewritten as RFC 3339 UTC with millisecond precision
//!
//! Then, at every depth and under any field name:
//! - strings in hyphenated UUID form are rewritten lowercase
//! - RFC 3339 strings with at most millisecond precision are rewritten as
//!   RFC 3339 UTC with millisecond precision
//! - object keys are sorted
//!
//! Those are exactly the forms a document record renders its typed UUIDs and
//! date-times in, so a typed value and its transport string agree. The tree is
//! then serialized compactly. The result does not depend on field order or on
//! which representation the record came from.

use chrono::DateTime;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::document::render_millis;
use crate::entity::{Entity, EntityKind};
use crate::error::ValidationError;
use crate::keys::KeyCodec;

const ID: &str = "id";
const ENVIRONMENT_ID: &str = "environmentId";
const UPDATED_AT: &str = "updatedAt";
const CREATED_AT: &str = "createdAt";

const ALIASES: [(&str, &str); 2] = [("_id", ID), ("envId", ENVIRONMENT_ID)];

const HYPHENATED_UUID_LEN: usize = 36;
const NANOS_PER_MILLI: u32 = 1_000_000;

pub(crate) fn finish(mut map: Map<String, Value>, kind: EntityKind) -> Result<Entity, ValidationError> {
    for (alias, name) in ALIASES {
        if let Some(value) = map.remove(alias) {
            if !map.contains_key(name) {
                map.insert(name.to_string(), value);
            }
        }
    }

    let id = take_uuid(&mut map, ID)?;
    let environment_id = take_uuid(&mut map, ENVIRONMENT_ID)?;

    let _ = take_timestamp(&mut map, CREATED_AT)?;
    let updated_at = take_timestamp(&mut map, UPDATED_AT)?;

    let snapshot = serde_json::to_vec(&canonical(Value::Object(map)))
        .map_err(|_| ValidationError::UnsupportedValue { field: "snapshot".into() })?;

    Ok(Entity {
        id,
        environment_id,
        kind,
        snapshot,
        score: KeyCodec::score_from_millis(updated_at),
    })
}

/// Parse a required UUID field and write it back in canonical form.
fn take_uuid(map: &mut Map<String, Value>, field: &'static str) -> Result<Uuid, ValidationError> {
    let raw = match map.get(field) {
        None | Some(Value::Null) => return Err(ValidationError::MissingField { field }),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(ValidationError::InvalidUuid { field, value: other.to_string() })
        }
    };
    let id = Uuid::parse_str(raw)
        .map_err(|_| ValidationError::InvalidUuid { field, value: raw.clone() })?;

    map.insert(field.to_string(), Value::String(KeyCodec::member(id)));
    Ok(id)
}

/// Parse an optional timestamp field, write it back canonically and return
/// its Unix millis.
fn take_timestamp(map: &mut Map<String, Value>, field: &'static str) -> Result<Option<i64>, ValidationError> {
    let invalid = |v: &Value| ValidationError::InvalidTimestamp { field, value: v.to_string() };

    let millis = match map.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidTimestamp { field, value: s.clone() })?
            .timestamp_millis(),
        Some(v @ Value::Number(n)) => n.as_i64().ok_or_else(|| invalid(v))?,
        Some(other) => return Err(invalid(other)),
    };

    let rendered = render_millis(millis).ok_or_else(|| ValidationError::InvalidTimestamp {
        field,
        value: millis.to_string(),
    })?;
    map.insert(field.to_string(), Value::String(rendered));
    Ok(Some(millis))
}

/// Rebuild the tree with object keys in ascending order and typed-looking
/// strings in canonical form. Insertion order is what serde_json emits whether
/// or not `preserve_order` is enabled.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonical(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        Value::String(s) => Value::String(canonical_string(s)),
        other => other,
    }
}

fn canonical_string(s: String) -> String {
    if s.len() == HYPHENATED_UUID_LEN {
        if let Ok(id) = Uuid::parse_str(&s) {
            return KeyCodec::member(id);
        }
    }
    match DateTime::parse_from_rfc3339(&s) {
        // Sub-millisecond instants have no document form; leave them as sent
        Ok(dt) if dt.timestamp_subsec_nanos() % NANOS_PER_MILLI == 0 => {
            render_millis(dt.timestamp_millis()).unwrap_or(s)
        }
        _ => s,
    }
}
