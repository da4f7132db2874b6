//! Value types shared by several entities
//!
//! Plain objects (external id mappings, media paths, fingerprints) are stored
//! as JSON. Link wrappers (`SceneGroup`, `GroupDescription`) hold a live
//! entity handle plus link data and carry their own input transforms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::Group;
use crate::graphql::orm::{FieldType, Value, json_field_type};

/// Mapping to an entry on an external stash-box endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashId {
    pub endpoint: String,
    pub stash_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl StashId {
    pub fn new(endpoint: impl Into<String>, stash_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            stash_id: stash_id.into(),
            updated_at: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePaths {
    pub screenshot: Option<String>,
    pub preview: Option<String>,
    pub stream: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePaths {
    pub thumbnail: Option<String>,
    pub preview: Option<String>,
    pub image: Option<String>,
}

/// File hash (`md5`, `oshash`, `phash`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: JsonValue,
}

json_field_type!(StashId, ScenePaths, ImagePaths, Fingerprint);

/// A scene's membership in a group, with its position.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneGroup {
    pub group: Group,
    pub scene_index: Option<i32>,
}

impl SceneGroup {
    pub fn new(group: Group, scene_index: Option<i32>) -> Self {
        Self { group, scene_index }
    }
}

/// A group-to-group link with its description.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupDescription {
    pub group: Group,
    pub description: Option<String>,
}

impl GroupDescription {
    pub fn new(group: Group, description: Option<String>) -> Self {
        Self { group, description }
    }
}

fn wrapper_fields<'a>(
    value: &'a Value,
    what: &str,
) -> Result<&'a BTreeMap<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected {}, found {}", what, other.kind())),
    }
}

fn linked_group(map: &BTreeMap<String, Value>) -> Result<Group, String> {
    match map.get("group") {
        Some(value) if value.is_set() && !value.is_null() => Group::from_value(value),
        _ => Err("link without a group".to_string()),
    }
}

fn optional<T: FieldType>(map: &BTreeMap<String, Value>, key: &str) -> Result<Option<T>, String> {
    match map.get(key) {
        None | Some(Value::Unset) | Some(Value::Null) => Ok(None),
        Some(value) => T::from_value(value).map(Some),
    }
}

fn optional_value<T: FieldType>(value: Option<T>) -> Value {
    value.map(FieldType::into_value).unwrap_or(Value::Null)
}

impl FieldType for SceneGroup {
    fn from_value(value: &Value) -> Result<Self, String> {
        let map = wrapper_fields(value, "a scene group")?;
        Ok(Self {
            group: linked_group(map)?,
            scene_index: optional(map, "scene_index")?,
        })
    }

    fn into_value(self) -> Value {
        Value::Object(BTreeMap::from([
            ("group".to_string(), self.group.into_value()),
            ("scene_index".to_string(), optional_value(self.scene_index)),
        ]))
    }
}

impl FieldType for GroupDescription {
    fn from_value(value: &Value) -> Result<Self, String> {
        let map = wrapper_fields(value, "a group description")?;
        Ok(Self {
            group: linked_group(map)?,
            description: optional(map, "description")?,
        })
    }

    fn into_value(self) -> Value {
        Value::Object(BTreeMap::from([
            ("group".to_string(), self.group.into_value()),
            ("description".to_string(), optional_value(self.description)),
        ]))
    }
}

/// `SceneGroupInput`: `{ group_id, scene_index }`
pub fn scene_group_input(value: &Value) -> Result<JsonValue, String> {
    let link = SceneGroup::from_value(value)?;
    Ok(json!({
        "group_id": link.group.id(),
        "scene_index": link.scene_index,
    }))
}

/// `GroupDescriptionInput`: `{ group_id, description }`
pub fn group_description_input(value: &Value) -> Result<JsonValue, String> {
    let link = GroupDescription::from_value(value)?;
    Ok(json!({
        "group_id": link.group.id(),
        "description": link.description,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::orm::Entity;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scene_group_input_uses_group_id() {
        let group = Group::new();
        let link = SceneGroup::new(group.clone(), Some(3)).into_value();

        let input = scene_group_input(&link).unwrap();
        assert_eq!(input, json!({ "group_id": group.id(), "scene_index": 3 }));
    }

    #[test]
    fn test_group_description_without_description() {
        let group = Group::new();
        let link = GroupDescription::new(group.clone(), None).into_value();

        let input = group_description_input(&link).unwrap();
        assert_eq!(input, json!({ "group_id": group.id(), "description": null }));
    }

    #[test]
    fn test_wrapper_requires_group() {
        let value = Value::Object(BTreeMap::from([(
            "scene_index".to_string(),
            Value::Json(json!(1)),
        )]));
        assert!(SceneGroup::from_value(&value).is_err());
        assert!(scene_group_input(&Value::Json(json!("g1"))).is_err());
    }

    #[test]
    fn test_stash_id_round_trips_through_value() {
        let id = StashId::new("https://stashdb.org/graphql", "abc");
        let value = id.clone().into_value();
        assert_eq!(value.to_input(), Some(json!({ "endpoint": "https://stashdb.org/graphql", "stash_id": "abc" })));
        assert_eq!(StashId::from_value(&value), Ok(id));
        assert_eq!(Group::TYPE_NAME, "Group");
    }
}
