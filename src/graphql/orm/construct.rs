//! Entity construction pipeline
//!
//! Turns a decoded GraphQL payload (a nested JSON object graph) into linked
//! entities. Every identified object, at any depth, is resolved against the
//! [`EntityStore`] first:
//!
//! 1. Cache hit: the live instance is substituted. Payload fields it has not
//!    received yet are merged in; fields it already knows are left alone, so
//!    no in-memory edit is discarded. Only the root of a top-level build or
//!    of a populate/save merge takes every payload field.
//! 2. Miss: a new entity is created, cached *before* its nested fields are
//!    resolved (so back-references inside the same payload hit the cache),
//!    filled, and given its first clean baseline.
//!
//! A payload with an `id` but without the type's label field yields a stub:
//! the label gets an empty placeholder and the entity is flagged.
//!
//! Merges into cached entities are staged while the payload is converted and
//! committed together once all of it converted. On error nothing is merged
//! and the entities cached by the failed call are evicted again.
//!
//! The store is passed explicitly through every call; there is no ambient
//! context.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, trace};

use super::entity::EntityRef;
use super::store::{EntityKey, EntityStore};
use super::traits::{EntitySchema, FieldDef, FieldKind};
use super::value::Value;
use crate::graphql::errors::{Result, StashError};

/// How a cache hit absorbs the payload describing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeMode {
    /// Only fields the cached instance has not received yet
    MissingOnly,
    /// Every payload field (last merge wins per field)
    Overwrite,
}

/// A merge into an existing entity, applied on commit.
struct StagedMerge {
    entity: EntityRef,
    values: Vec<(&'static FieldDef, Value)>,
    received: Vec<String>,
    clears_stub: bool,
}

/// Per-call construction state.
struct BuildContext<'a> {
    store: &'a EntityStore,
    /// Keys whose payload is being converted further up the stack
    in_progress: HashSet<EntityKey>,
    /// Entities cached by this call, evicted again on failure
    inserted: Vec<EntityRef>,
    staged: Vec<StagedMerge>,
}

impl<'a> BuildContext<'a> {
    fn new(store: &'a EntityStore) -> Self {
        Self {
            store,
            in_progress: HashSet::new(),
            inserted: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// Received fields of `entity` including merges staged in this call.
    fn known_fields(&self, entity: &EntityRef) -> BTreeSet<String> {
        let mut known = entity.received_fields();
        for merge in self.staged.iter().filter(|m| m.entity.ptr_eq(entity)) {
            known.extend(merge.received.iter().cloned());
        }
        known
    }

    fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                for merge in self.staged {
                    merge.entity.apply_merge(merge.values, merge.received, merge.clears_stub);
                }
                Ok(value)
            }
            Err(err) => {
                for entity in &self.inserted {
                    if self
                        .store
                        .get(entity.type_name(), &entity.id())
                        .is_some_and(|live| live.ptr_eq(entity))
                    {
                        self.store.remove(entity.type_name(), &entity.id());
                    }
                }
                debug!(
                    evicted = self.inserted.len(),
                    discarded = self.staged.len(),
                    error = %err,
                    "Rolled back failed construction"
                );
                Err(err)
            }
        }
    }
}

/// Build an entity from a server payload, resolving through the identity map.
///
/// A top-level cache hit merges the whole payload into the live instance,
/// advancing the baseline only for the merged fields.
pub fn from_server_payload(
    schema: &'static EntitySchema,
    raw: &JsonValue,
    store: &EntityStore,
) -> Result<EntityRef> {
    let JsonValue::Object(map) = raw else {
        return Err(StashError::Construction {
            type_name: schema.type_name.to_string(),
            field: "(root)".to_string(),
            reason: format!("expected an object payload, found {}", json_kind(raw)),
        });
    };

    let mut ctx = BuildContext::new(store);
    let result = resolve(schema, map, &mut ctx, MergeMode::Overwrite);
    ctx.finish(result)
}

/// Merge a payload into an existing entity.
///
/// Every payload field is merged into `entity`; nested objects go through
/// the identity map like any other payload. Returns the names of the merged
/// fields; the baseline advances for exactly those.
pub(crate) fn merge_payload(
    entity: &EntityRef,
    raw: &JsonMap<String, JsonValue>,
    store: &EntityStore,
) -> Result<Vec<&'static str>> {
    let mut ctx = BuildContext::new(store);
    ctx.in_progress.insert(entity.key());
    let result = merge_into(entity, raw, &mut ctx, MergeMode::Overwrite);
    ctx.finish(result)
}

fn resolve(
    schema: &'static EntitySchema,
    map: &JsonMap<String, JsonValue>,
    ctx: &mut BuildContext<'_>,
    hit_mode: MergeMode,
) -> Result<EntityRef> {
    let Some(id) = id_of(map) else {
        // No id: nothing to deduplicate against, build a detached entity
        let entity = EntityRef::detached(schema);
        construct(&entity, map, ctx)?;
        return Ok(entity);
    };

    let key = EntityKey::new(schema.type_name, id.clone());

    if let Some(cached) = ctx.store.get(schema.type_name, &id) {
        // A back-reference to an object still being converted
        if !ctx.in_progress.insert(key.clone()) {
            return Ok(cached);
        }
        trace!(type_name = schema.type_name, id = %id, "Merging payload into cached entity");
        let merged = merge_into(&cached, map, ctx, hit_mode);
        ctx.in_progress.remove(&key);
        merged?;
        return Ok(cached);
    }

    let entity = EntityRef::from_server(schema, id.clone());
    ctx.store.insert(&entity);
    ctx.inserted.push(entity.clone());

    let fresh = ctx.in_progress.insert(key.clone());
    let constructed = construct(&entity, map, ctx);
    if fresh {
        ctx.in_progress.remove(&key);
    }
    constructed?;

    debug!(type_name = schema.type_name, id = %id, stub = entity.is_stub(), "Constructed entity");
    Ok(entity)
}

fn construct(
    entity: &EntityRef,
    map: &JsonMap<String, JsonValue>,
    ctx: &mut BuildContext<'_>,
) -> Result<()> {
    let schema = entity.schema();
    // Ledger of what the server sent, taken before placeholders are added
    let received: BTreeSet<String> = map.keys().cloned().collect();
    let mut values = build_values(schema, map, |_| true, ctx)?;

    let mut is_stub = false;
    if let Some(label) = schema.label_field {
        if map.contains_key("id") && !map.contains_key(label) {
            if let Some(def) = schema.field(label) {
                values.push((def, Value::Json(JsonValue::String(String::new()))));
                is_stub = true;
            }
        }
    }

    // Only reachable through this call until it commits
    entity.apply_initial(values, received, is_stub);
    Ok(())
}

/// Stage a merge of `map` into `entity`. Returns the fields it will merge.
fn merge_into(
    entity: &EntityRef,
    map: &JsonMap<String, JsonValue>,
    ctx: &mut BuildContext<'_>,
    mode: MergeMode,
) -> Result<Vec<&'static str>> {
    let schema = entity.schema();
    let known = ctx.known_fields(entity);
    let include = |name: &str| mode == MergeMode::Overwrite || !known.contains(name);

    let values = build_values(schema, map, include, ctx)?;
    let names: Vec<&'static str> = values.iter().map(|(def, _)| def.name).collect();

    let received: Vec<String> = map.keys().filter(|k| include(k.as_str())).cloned().collect();
    let clears_stub = schema.label_field.is_some_and(|label| {
        values
            .iter()
            .any(|(def, value)| def.name == label && value.is_set())
    });

    if !values.is_empty() || !received.is_empty() {
        ctx.staged.push(StagedMerge {
            entity: entity.clone(),
            values,
            received,
            clears_stub,
        });
    }
    Ok(names)
}

fn build_values(
    schema: &'static EntitySchema,
    map: &JsonMap<String, JsonValue>,
    include: impl Fn(&str) -> bool,
    ctx: &mut BuildContext<'_>,
) -> Result<Vec<(&'static FieldDef, Value)>> {
    let mut values = Vec::new();

    for def in schema.fields {
        let Some(raw) = map.get(def.name) else {
            continue;
        };
        if !include(def.name) {
            continue;
        }

        let value = convert(schema, def, raw, ctx)?;
        (def.check)(&value).map_err(|reason| construction_error(schema, def, reason))?;
        values.push((def, value));
    }

    Ok(values)
}

fn convert(
    schema: &'static EntitySchema,
    def: &'static FieldDef,
    raw: &JsonValue,
    ctx: &mut BuildContext<'_>,
) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match (def.kind, raw) {
        (FieldKind::Scalar, _) => Ok(Value::Json(raw.clone())),

        (FieldKind::Entity { target, list: false }, JsonValue::Object(map)) => {
            resolve(target(), map, ctx, MergeMode::MissingOnly).map(Value::Entity)
        }

        (FieldKind::Entity { target, list: true }, JsonValue::Array(items)) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                let JsonValue::Object(map) = item else {
                    return Err(construction_error(
                        schema,
                        def,
                        format!("expected objects in list, found {}", json_kind(item)),
                    ));
                };
                resolved.push(Value::Entity(resolve(target(), map, ctx, MergeMode::MissingOnly)?));
            }
            Ok(Value::List(resolved))
        }

        (FieldKind::Complex { target, via, list: false }, JsonValue::Object(map)) => {
            convert_wrapper(schema, def, target(), via, map, ctx)
        }

        (FieldKind::Complex { target, via, list: true }, JsonValue::Array(items)) => {
            let mut wrappers = Vec::with_capacity(items.len());
            for item in items {
                let JsonValue::Object(map) = item else {
                    return Err(construction_error(
                        schema,
                        def,
                        format!("expected objects in list, found {}", json_kind(item)),
                    ));
                };
                wrappers.push(convert_wrapper(schema, def, target(), via, map, ctx)?);
            }
            Ok(Value::List(wrappers))
        }

        // Cardinality or shape mismatch: leave it to the caller as a construction error
        (kind, other) => Err(construction_error(
            schema,
            def,
            format!(
                "expected {}, found {}",
                if kind.is_list() { "a list" } else { "an object" },
                json_kind(other)
            ),
        )),
    }
}

fn convert_wrapper(
    schema: &'static EntitySchema,
    def: &'static FieldDef,
    target: &'static EntitySchema,
    via: &'static str,
    map: &JsonMap<String, JsonValue>,
    ctx: &mut BuildContext<'_>,
) -> Result<Value> {
    let mut wrapper = BTreeMap::new();

    for (key, raw) in map {
        let value = if key == via {
            match raw {
                JsonValue::Null => Value::Null,
                JsonValue::Object(inner) => {
                    Value::Entity(resolve(target, inner, ctx, MergeMode::MissingOnly)?)
                }
                other => {
                    return Err(construction_error(
                        schema,
                        def,
                        format!("expected an object under {}, found {}", via, json_kind(other)),
                    ));
                }
            }
        } else {
            Value::from_json(raw.clone())
        };
        wrapper.insert(key.clone(), value);
    }

    Ok(Value::Object(wrapper))
}

fn id_of(map: &JsonMap<String, JsonValue>) -> Option<String> {
    match map.get("id")? {
        JsonValue::String(id) => Some(id.clone()),
        JsonValue::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

fn construction_error(schema: &EntitySchema, def: &FieldDef, reason: String) -> StashError {
    StashError::Construction {
        type_name: schema.type_name.to_string(),
        field: def.name.to_string(),
        reason,
    }
}
