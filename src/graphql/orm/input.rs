//! Mutation input payloads
//!
//! Save payloads carry only changed tracked fields. Relationship fields are
//! written under their input key (`tag_ids`, `studio_id`, ...) as ids, or
//! through the relationship's transform when a link carries more than an id.

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use super::entity::EntityRef;
use super::traits::RelationshipMetadata;
use super::value::Value;
use crate::graphql::errors::{Result, StashError};

/// Build the `input` object for a create or update mutation.
///
/// Updates carry the entity id; creates do not.
pub fn build_input(
    entity: &EntityRef,
    fields: &BTreeMap<&'static str, Value>,
) -> Result<JsonMap<String, JsonValue>> {
    let schema = entity.schema();
    let mut input = JsonMap::new();

    if !entity.is_new() {
        input.insert("id".to_string(), JsonValue::String(entity.id()));
    }

    for (name, value) in fields {
        let (key, wire) = match schema.relationship(name) {
            Some(relationship) => (
                relationship.target_field,
                relationship_input(entity, relationship, value)?,
            ),
            None => (*name, value.to_input()),
        };

        if let Some(wire) = wire {
            input.insert(key.to_string(), wire);
        }
    }

    Ok(input)
}

fn relationship_input(
    entity: &EntityRef,
    relationship: &RelationshipMetadata,
    value: &Value,
) -> Result<Option<JsonValue>> {
    let Some(transform) = relationship.transform else {
        return Ok(value.to_input());
    };

    let apply = |item: &Value| {
        transform(item).map_err(|reason| StashError::Construction {
            type_name: entity.type_name().to_string(),
            field: relationship.field.to_string(),
            reason,
        })
    };

    match value {
        Value::Unset => Ok(None),
        Value::Null => Ok(Some(JsonValue::Null)),
        _ if relationship.list => {
            let items = value
                .elements()
                .iter()
                .map(apply)
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(JsonValue::Array(items)))
        }
        single => apply(single).map(Some),
    }
}
