//! Selective field population
//!
//! Every entity keeps a ledger of the field names it has received from the
//! server. `populate` consults it to fetch only what is missing, in exactly
//! one request, and merges the result back through the construction pipeline
//! so nested objects still resolve through the identity map.
//!
//! Paths use `.` or `__` as separator (`files.path`, `files__path`). A nested
//! path counts as present only if its parent relationship has been received
//! and, for lists, every current element has the rest of the path.
//!
//! The merge is all-or-nothing: a failed or cancelled fetch leaves the
//! entity's values, ledger and baseline untouched.

use std::collections::BTreeSet;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info};

use super::builder::{self, ENTITY_ALIAS, Selection, normalize_path};
use super::construct::merge_payload;
use super::entity::EntityRef;
use super::traits::FetchStrategy;
use super::value::Value;
use crate::graphql::client::StashClient;
use crate::graphql::errors::{Result, StashError};
use crate::graphql::transport::GraphQLRequest;

/// Requested paths not yet present on the entity (normalized to `.` form).
pub fn missing_fields<I, S>(entity: &EntityRef, requested: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    requested
        .into_iter()
        .map(|path| normalize_path(path.as_ref()))
        .filter(|path| !path.is_empty())
        .filter(|path| {
            let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
            !entity_has_path(entity, &segments)
        })
        .collect()
}

/// True if every name was part of a received payload.
pub fn has_fields(entity: &EntityRef, names: &[&str]) -> bool {
    entity.has_fields(names)
}

fn entity_has_path(entity: &EntityRef, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };
    if !entity.received_fields().contains(*first) {
        return false;
    }
    rest.is_empty() || value_has_path(&entity.value(first), rest)
}

fn value_has_path(value: &Value, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return true;
    };

    match value {
        Value::Unset => false,
        // Received as empty: nothing below it to fetch
        Value::Null => true,
        Value::Entity(entity) => entity_has_path(entity, segments),
        Value::List(items) => items.iter().all(|item| value_has_path(item, segments)),
        Value::Object(map) => match map.get(*first) {
            Some(inner) => rest.is_empty() || value_has_path(inner, rest),
            None => false,
        },
        Value::Json(JsonValue::Array(items)) => items
            .iter()
            .all(|item| value_has_path(&Value::from_json(item.clone()), segments)),
        Value::Json(JsonValue::Object(map)) => match map.get(*first) {
            Some(inner) => rest.is_empty() || value_has_path(&Value::from_json(inner.clone()), rest),
            None => false,
        },
        Value::Json(_) => false,
    }
}

/// Fetch the requested paths that are missing and merge them into the entity.
///
/// With `force_refetch` every requested path is fetched. Returns the merged
/// top-level field names; empty when nothing had to be fetched.
pub async fn populate<I, S>(
    entity: &EntityRef,
    requested: I,
    client: &StashClient,
    force_refetch: bool,
) -> Result<Vec<&'static str>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let requested: Vec<String> = requested
        .into_iter()
        .map(|path| normalize_path(path.as_ref()))
        .filter(|path| !path.is_empty())
        .collect();

    let missing: BTreeSet<String> = if force_refetch {
        requested.into_iter().collect()
    } else {
        missing_fields(entity, &requested)
    };

    if missing.is_empty() {
        debug!(entity = %entity.key(), "All requested fields present, skipping fetch");
        return Ok(Vec::new());
    }

    let schema = entity.schema();
    if entity.is_new() {
        return Err(StashError::NotFound {
            type_name: schema.type_name.to_string(),
            id: entity.id(),
        });
    }

    let selection = Selection::from_paths(&missing);
    let document = builder::populate_document(schema, &selection)?;
    let id = entity.id();

    info!(
        entity = %entity.key(),
        fields = ?missing,
        force = force_refetch,
        "Populating entity fields"
    );

    let data = client
        .execute(GraphQLRequest::new(document).variable("id", id.clone()))
        .await?;

    let payload = collect_payload(entity, &selection, data)?;
    let merged = merge_payload(entity, &payload, client.store())?;

    debug!(entity = %entity.key(), merged = ?merged, "Merged populated fields");
    Ok(merged)
}

/// Flatten the aliased root fields of a populate response into one payload.
fn collect_payload(
    entity: &EntityRef,
    selection: &Selection,
    mut data: JsonMap<String, JsonValue>,
) -> Result<JsonMap<String, JsonValue>> {
    let schema = entity.schema();
    let not_found = || StashError::NotFound {
        type_name: schema.type_name.to_string(),
        id: entity.id(),
    };

    let mut payload = match data.remove(ENTITY_ALIAS) {
        Some(JsonValue::Object(map)) => map,
        Some(JsonValue::Null) | None => return Err(not_found()),
        Some(other) => {
            return Err(StashError::Decode(format!(
                "expected an object for {}, found {}",
                schema.type_name, other
            )));
        }
    };

    for field in selection.fields() {
        let Some(relationship) = schema.relationship(field) else {
            continue;
        };
        let FetchStrategy::FilterQuery(query) = relationship.strategy else {
            continue;
        };

        let alias = builder::relation_alias(field);
        let items = data
            .remove(&alias)
            .and_then(|mut result| result.get_mut(query.result_field).map(JsonValue::take))
            .ok_or_else(|| {
                StashError::Decode(format!("response is missing {}.{}", alias, query.result_field))
            })?;

        payload.insert(field.to_string(), items);
    }

    Ok(payload)
}
