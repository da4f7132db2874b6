//! Shared entity handle with dirty tracking and inverse relationship sync
//!
//! An [`EntityRef`] is a reference-counted handle to one local entity. Cyclic
//! graphs (tag parents/children, scene/gallery lists) are plain shared
//! references; the identity map is the lookup index over them.
//!
//! Those cycles are strong. Entities linked in both directions keep each
//! other alive after the identity map evicts them, until one side of the link
//! is overwritten or cleared. Long-lived sessions that load large graphs
//! should drop relationship values they no longer need.
//!
//! # Dirty tracking
//!
//! A baseline snapshot of every declared field is taken when an entity is
//! loaded. Only fields flagged `tracked` in the schema are compared against
//! it. Merges advance the snapshot for the merged fields only, so a fetch
//! never discards a pending local edit on another field.
//!
//! # Inverse sync
//!
//! Assigning a relationship field with a declared inverse updates the inverse
//! field on every related entity that is resident in the identity map. The
//! inverse side is written through the non-syncing setter, so propagation
//! stops after one hop.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::{trace, warn};
use uuid::Uuid;

use super::store::{EntityKey, EntityStore, WeakStore};
use super::traits::{EntitySchema, FieldDef, FieldType};
use super::value::{Field, Value};
use crate::graphql::errors::{Result, StashError};

/// Baseline serialization: field name to serialized value (`None` = unset).
pub(crate) type Snapshot = BTreeMap<&'static str, Option<JsonValue>>;

struct EntityCell {
    schema: &'static EntitySchema,
    // Kept apart from the state so related ids can be read while an entity is locked
    id: RwLock<String>,
    state: RwLock<EntityState>,
}

struct EntityState {
    values: BTreeMap<&'static str, Value>,
    received_fields: BTreeSet<String>,
    snapshot: Option<Snapshot>,
    is_new: bool,
    is_stub: bool,
    store: Option<WeakStore>,
}

/// Shared handle to one entity.
///
/// Equality and hashing use `(type name, id)` only. Relationship values hold
/// strong handles, so mutually linked entities are not freed by eviction
/// alone (see the module docs).
#[derive(Clone)]
pub struct EntityRef(Arc<EntityCell>);

impl EntityRef {
    /// Create a brand-new client-side entity.
    ///
    /// Gets a 32 hex character placeholder id, is flagged new, and has no
    /// snapshot, so every tracked field reads as dirty.
    pub fn new(schema: &'static EntitySchema) -> Self {
        Self::with_state(schema, Uuid::new_v4().simple().to_string(), true)
    }

    /// Create an entity for a server object that carries no id.
    ///
    /// It gets a placeholder id like a new entity but is not flagged new, so
    /// saving it never issues a create.
    pub(crate) fn detached(schema: &'static EntitySchema) -> Self {
        Self::with_state(schema, Uuid::new_v4().simple().to_string(), false)
    }

    /// Create an empty entity carrying a server-issued id.
    pub(crate) fn from_server(schema: &'static EntitySchema, id: String) -> Self {
        Self::with_state(schema, id, false)
    }

    fn with_state(schema: &'static EntitySchema, id: String, is_new: bool) -> Self {
        let values = schema.fields.iter().map(|f| (f.name, Value::Unset)).collect();

        Self(Arc::new(EntityCell {
            schema,
            id: RwLock::new(id),
            state: RwLock::new(EntityState {
                values,
                received_fields: BTreeSet::new(),
                snapshot: None,
                is_new,
                is_stub: false,
                store: None,
            }),
        }))
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.0.schema
    }

    pub fn type_name(&self) -> &'static str {
        self.0.schema.type_name
    }

    pub fn id(&self) -> String {
        self.0.id.read().clone()
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.type_name(), self.id())
    }

    /// True until the id is confirmed by the server.
    pub fn is_new(&self) -> bool {
        self.0.state.read().is_new
    }

    /// True if built from a reference lacking its label field.
    pub fn is_stub(&self) -> bool {
        self.0.state.read().is_stub
    }

    /// Same underlying instance (not merely the same key).
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Field names present in the payloads this entity was built or merged from.
    pub fn received_fields(&self) -> BTreeSet<String> {
        self.0.state.read().received_fields.clone()
    }

    /// True if every name was part of a received payload.
    pub fn has_fields(&self, names: &[&str]) -> bool {
        let state = self.0.state.read();
        names.iter().all(|name| state.received_fields.contains(*name))
    }

    /// Current value of a field. Undeclared names read as unset.
    pub fn value(&self, name: &str) -> Value {
        self.0
            .state
            .read()
            .values
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Typed read used by the generated accessors.
    pub fn get_typed<T: FieldType>(&self, name: &str) -> Field<T> {
        match self.value(name) {
            Value::Unset => Field::Unset,
            Value::Null => Field::Null,
            value => match T::from_value(&value) {
                Ok(typed) => Field::Value(typed),
                Err(reason) => {
                    warn!(
                        type_name = self.type_name(),
                        field = name,
                        reason = %reason,
                        "Stored value does not match the declared field type"
                    );
                    Field::Unset
                }
            },
        }
    }

    /// Typed write used by the generated accessors.
    pub fn set_typed<T: FieldType>(&self, name: &str, value: Field<T>) {
        let value = match value {
            Field::Unset => Value::Unset,
            Field::Null => Value::Null,
            Field::Value(value) => value.into_value(),
        };

        match self.0.schema.field(name) {
            Some(def) => self.assign(def, value),
            None => warn!(
                type_name = self.type_name(),
                field = name,
                "Ignoring assignment to undeclared field"
            ),
        }
    }

    /// Assign a dynamic value after checking it against the field declaration.
    ///
    /// Triggers dirty tracking and inverse sync like the typed setters.
    pub fn set_value(&self, name: &str, value: Value) -> Result<()> {
        let def = self
            .0
            .schema
            .field(name)
            .ok_or_else(|| StashError::UnknownField {
                type_name: self.type_name().to_string(),
                field: name.to_string(),
            })?;

        (def.check)(&value).map_err(|reason| StashError::Construction {
            type_name: self.type_name().to_string(),
            field: name.to_string(),
            reason,
        })?;

        self.assign(def, value);
        Ok(())
    }

    fn assign(&self, def: &'static FieldDef, value: Value) {
        self.0.state.write().values.insert(def.name, value.clone());
        self.sync_inverse(def, &value);
    }

    /// Write without inverse sync. Used for the inverse side and for merges.
    pub(crate) fn set_raw(&self, def: &'static FieldDef, value: Value) {
        self.0.state.write().values.insert(def.name, value);
    }

    // ========================================================================
    // Inverse sync
    // ========================================================================

    fn sync_inverse(&self, def: &'static FieldDef, value: &Value) {
        if !value.is_set() {
            return;
        }
        let Some(relationship) = self.0.schema.relationship(def.name) else {
            return;
        };
        if !relationship.auto_sync {
            return;
        }
        let Some(inverse) = relationship.inverse else {
            return;
        };

        for item in value.elements() {
            // Raw objects and scalars in a relationship value are not synced
            let Value::Entity(related) = item else {
                continue;
            };
            if related.type_name() != inverse.type_name {
                continue;
            }
            if !related.is_resident() {
                trace!(
                    related = %related.key(),
                    "Skipping inverse sync for detached entity"
                );
                continue;
            }
            let Some(inverse_def) = related.schema().field(inverse.field) else {
                continue;
            };
            related.link_back(inverse_def, self);
        }
    }

    fn link_back(&self, def: &'static FieldDef, owner: &EntityRef) {
        let mut state = self.0.state.write();
        let slot = state.values.entry(def.name).or_default();

        if def.kind.is_list() {
            match slot {
                Value::List(items) => {
                    let present = items
                        .iter()
                        .any(|item| item.as_entity().is_some_and(|e| e == owner));
                    if !present {
                        items.push(Value::Entity(owner.clone()));
                    }
                }
                _ => *slot = Value::List(vec![Value::Entity(owner.clone())]),
            }
        } else {
            *slot = Value::Entity(owner.clone());
        }

        trace!(
            entity = %self.key(),
            field = def.name,
            owner = %owner.key(),
            "Synced inverse relationship"
        );
    }

    // ========================================================================
    // Identity map binding
    // ========================================================================

    pub(crate) fn bind_store(&self, store: WeakStore) {
        self.0.state.write().store = Some(store);
    }

    /// The store this entity was cached in, if it is still alive.
    pub fn store(&self) -> Option<EntityStore> {
        self.0.state.read().store.as_ref().and_then(WeakStore::upgrade)
    }

    /// True if the identity map's live entry for this key is this instance.
    pub fn is_resident(&self) -> bool {
        let Some(store) = self.store() else {
            return false;
        };
        store
            .get(self.type_name(), &self.id())
            .is_some_and(|live| live.ptr_eq(self))
    }

    /// Replace the placeholder id with the server-issued one.
    pub(crate) fn confirm_id(&self, id: String) {
        *self.0.id.write() = id;
        self.0.state.write().is_new = false;
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    fn serialize(&self) -> Snapshot {
        self.0
            .state
            .read()
            .values
            .iter()
            .map(|(name, value)| (*name, value.to_snapshot()))
            .collect()
    }

    /// Take a full baseline from the current state.
    pub fn mark_clean(&self) {
        let snapshot = self.serialize();
        self.0.state.write().snapshot = Some(snapshot);
    }

    /// Drop the baseline so every tracked field reads as changed.
    pub fn mark_dirty(&self) {
        self.0.state.write().snapshot = None;
    }

    /// True if any tracked field differs from the baseline.
    pub fn is_dirty(&self) -> bool {
        !self.get_changed_fields().is_empty()
    }

    /// Tracked fields that differ from the baseline, with their current values.
    ///
    /// A field missing from the baseline counts as changed.
    pub fn get_changed_fields(&self) -> BTreeMap<&'static str, Value> {
        let state = self.0.state.read();
        let mut changed = BTreeMap::new();

        for name in self.0.schema.tracked_fields() {
            let current = state.values.get(name).cloned().unwrap_or_default();
            let differs = match state.snapshot.as_ref().and_then(|s| s.get(name)) {
                Some(baseline) => *baseline != current.to_snapshot(),
                None => true,
            };
            if differs {
                changed.insert(name, current);
            }
        }

        changed
    }

    /// Advance the baseline for the given fields only.
    ///
    /// Every other field keeps its old baseline, so unrelated local edits stay
    /// dirty. Without a baseline, a partial one is started.
    pub fn update_snapshot_for_fields<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let mut state = self.0.state.write();
        let mut updates = Vec::new();

        for name in names {
            if let Some((key, value)) = state.values.get_key_value(name) {
                updates.push((*key, value.to_snapshot()));
            }
        }

        let snapshot = state.snapshot.get_or_insert_with(Snapshot::new);
        snapshot.extend(updates);
    }

    /// Record the given values as the baseline of their fields.
    ///
    /// Used after a save with the values that were sent, so edits made while
    /// the request was in flight stay dirty.
    pub fn set_baseline<'a>(&self, values: impl IntoIterator<Item = (&'a str, &'a Value)>) {
        let mut state = self.0.state.write();
        let mut updates = Vec::new();

        for (name, value) in values {
            if let Some(def) = self.0.schema.field(name) {
                updates.push((def.name, value.to_snapshot()));
            }
        }

        let snapshot = state.snapshot.get_or_insert_with(Snapshot::new);
        snapshot.extend(updates);
    }

    // ========================================================================
    // Merge support
    // ========================================================================

    /// Apply merged values in one step: values, received ledger and baseline.
    pub(crate) fn apply_merge(
        &self,
        values: Vec<(&'static FieldDef, Value)>,
        received: impl IntoIterator<Item = String>,
        clears_stub: bool,
    ) {
        let names: Vec<&'static str> = values.iter().map(|(def, _)| def.name).collect();
        {
            let mut state = self.0.state.write();
            for (def, value) in values {
                state.values.insert(def.name, value);
            }
            state.received_fields.extend(received);
            if clears_stub {
                state.is_stub = false;
            }
        }
        self.update_snapshot_for_fields(names);
    }

    /// Initialise a freshly constructed entity and take its first baseline.
    pub(crate) fn apply_initial(
        &self,
        values: Vec<(&'static FieldDef, Value)>,
        received: BTreeSet<String>,
        is_stub: bool,
    ) {
        {
            let mut state = self.0.state.write();
            for (def, value) in values {
                state.values.insert(def.name, value);
            }
            state.received_fields = received;
            state.is_stub = is_stub;
        }
        self.mark_clean();
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.id() == other.id()
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name().hash(state);
        self.id().hash(state);
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(self.type_name()).field(&self.id()).finish()
    }
}
