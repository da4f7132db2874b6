//! Three-state field values
//!
//! Every declared entity field is in exactly one of three states:
//! - never fetched or assigned ([`Value::Unset`] / [`Field::Unset`])
//! - fetched and explicitly empty ([`Value::Null`] / [`Field::Null`])
//! - holding a value
//!
//! [`Value`] is the dynamic form stored inside an entity and walked by the
//! construction pipeline, dirty tracker and inverse sync. [`Field`] is the
//! typed view handed out by the generated accessors.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map as JsonMap, Value as JsonValue, json};

use super::entity::EntityRef;

/// Marker for "never fetched". Distinct from null.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Unset;

/// The shared unset marker.
pub const UNSET: Unset = Unset;

impl fmt::Debug for Unset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UNSET")
    }
}

impl fmt::Display for Unset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UNSET")
    }
}

impl From<Unset> for Value {
    fn from(_: Unset) -> Self {
        Value::Unset
    }
}

/// Returns false only for the unset marker. Null counts as set.
pub fn is_set(value: &Value) -> bool {
    !matches!(value, Value::Unset)
}

/// Dynamic field value held by an entity.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Unset,
    Null,
    /// Scalars, scalar lists and plain (non-entity) objects, kept as JSON.
    Json(JsonValue),
    Entity(EntityRef),
    List(Vec<Value>),
    /// Link wrapper carrying an entity plus extra data, e.g. `{group, scene_index}`.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Wrap a decoded JSON value, mapping JSON null to [`Value::Null`].
    pub fn from_json(json: JsonValue) -> Self {
        if json.is_null() {
            Value::Null
        } else {
            Value::Json(json)
        }
    }

    pub fn is_set(&self) -> bool {
        is_set(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unset => "unset",
            Value::Null => "null",
            Value::Json(JsonValue::Array(_)) => "json array",
            Value::Json(JsonValue::Object(_)) => "json object",
            Value::Json(_) => "scalar",
            Value::Entity(_) => "entity",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Elements of a list-shaped value. Single values yield themselves.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::Unset | Value::Null => Vec::new(),
            Value::List(items) => items.clone(),
            Value::Json(JsonValue::Array(items)) => {
                items.iter().cloned().map(Value::from_json).collect()
            }
            other => vec![other.clone()],
        }
    }

    /// Baseline serialization used for dirty comparison.
    ///
    /// `None` stands for unset. Entity references serialize to their key only,
    /// so cyclic graphs never recurse.
    pub fn to_snapshot(&self) -> Option<JsonValue> {
        match self {
            Value::Unset => None,
            Value::Null => Some(JsonValue::Null),
            Value::Json(json) => Some(json.clone()),
            Value::Entity(entity) => Some(json!({
                "__typename": entity.type_name(),
                "id": entity.id(),
            })),
            Value::List(items) => Some(JsonValue::Array(
                items
                    .iter()
                    .map(|item| item.to_snapshot().unwrap_or(JsonValue::Null))
                    .collect(),
            )),
            Value::Object(map) => Some(JsonValue::Object(
                map.iter()
                    .filter_map(|(key, value)| value.to_snapshot().map(|v| (key.clone(), v)))
                    .collect::<JsonMap<String, JsonValue>>(),
            )),
        }
    }

    /// Wire form used when a value is sent as mutation input.
    ///
    /// Entities collapse to their id.
    pub fn to_input(&self) -> Option<JsonValue> {
        match self {
            Value::Unset => None,
            Value::Null => Some(JsonValue::Null),
            Value::Json(json) => Some(json.clone()),
            Value::Entity(entity) => Some(JsonValue::String(entity.id())),
            Value::List(items) => Some(JsonValue::Array(
                items.iter().filter_map(Value::to_input).collect(),
            )),
            Value::Object(map) => Some(JsonValue::Object(
                map.iter()
                    .filter_map(|(key, value)| value.to_input().map(|v| (key.clone(), v)))
                    .collect::<JsonMap<String, JsonValue>>(),
            )),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) | (Value::Null, Value::Null) => true,
            (Value::Entity(a), Value::Entity(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Scalar lists can be held either as JSON arrays or as lists of JSON values
            _ => {
                matches!((self, other), (Value::Json(_), _) | (_, Value::Json(_)))
                    && self.to_snapshot() == other.to_snapshot()
            }
        }
    }
}

/// Typed three-state view of a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        !matches!(self, Field::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// The held value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Unset => Field::Unset,
            Field::Null => Field::Null,
            Field::Value(value) => Field::Value(f(value)),
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}
