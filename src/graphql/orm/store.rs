//! Identity map with TTL support
//!
//! The authoritative cache keyed by `(type name, id)`. Every code path that
//! turns an identified payload into an entity consults it first, so there is
//! at most one live [`EntityRef`] per key while its entry is fresh.
//!
//! Expired entries are evicted lazily on the next lookup; there is no
//! background sweep. Lookups and inserts never suspend, so two tasks resolving
//! the same key within one scheduling tick cannot race.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::entity::EntityRef;
use super::traits::Entity;

/// Cache key: GraphQL type name plus id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub type_name: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// A cached entity with its insertion time and TTL
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub entity: EntityRef,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// A zero TTL is always expired.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_zero() || self.cached_at.elapsed() > self.ttl
    }
}

struct StoreInner {
    entries: Mutex<HashMap<EntityKey, CacheEntry>>,
    default_ttl: Duration,
}

/// Shared identity map.
///
/// Cloning is cheap and yields a handle to the same map. One store is meant
/// to be shared by every entity and populate call of one client session.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle kept by resident entities.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<EntityStore> {
        self.0.upgrade().map(|inner| EntityStore { inner })
    }
}

impl EntityStore {
    /// Default time-to-live for cached entities
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Create a store with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
                default_ttl,
            }),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Get a cached entity if present and not expired.
    ///
    /// Expired entries are removed and reported as a miss.
    pub fn get(&self, type_name: &str, id: &str) -> Option<EntityRef> {
        let key = EntityKey::new(type_name, id);
        let mut entries = self.inner.entries.lock();

        match entries.get(&key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(&key);
                debug!(key = %key, "Evicted expired entity from identity map");
                None
            }
            Some(entry) => {
                trace!(key = %key, "Identity map hit");
                Some(entry.entity.clone())
            }
            None => {
                trace!(key = %key, "Identity map miss");
                None
            }
        }
    }

    /// Typed lookup.
    pub fn get_typed<T: Entity>(&self, id: &str) -> Option<T> {
        self.get(T::TYPE_NAME, id).map(T::from_ref)
    }

    /// Cache an entity with the default TTL
    pub fn insert(&self, entity: &EntityRef) {
        self.insert_with_ttl(entity, self.inner.default_ttl);
    }

    /// Cache an entity with a custom TTL
    pub fn insert_with_ttl(&self, entity: &EntityRef, ttl: Duration) {
        entity.bind_store(self.downgrade());

        let key = entity.key();
        let mut entries = self.inner.entries.lock();
        let replaced = entries.insert(
            key.clone(),
            CacheEntry {
                entity: entity.clone(),
                cached_at: Instant::now(),
                ttl,
            },
        );

        if replaced.is_some_and(|previous| !previous.entity.ptr_eq(entity)) {
            debug!(key = %key, "Replaced cached entity with a different instance");
        }
    }

    /// Remove a cached entity
    pub fn remove(&self, type_name: &str, id: &str) -> Option<EntityRef> {
        self.inner
            .entries
            .lock()
            .remove(&EntityKey::new(type_name, id))
            .map(|entry| entry.entity)
    }

    /// Move an entity's entry from a placeholder id to its current id.
    pub(crate) fn rekey(&self, entity: &EntityRef, old_id: &str) {
        let mut entries = self.inner.entries.lock();
        let old_key = EntityKey::new(entity.type_name(), old_id);
        let ttl = entries
            .remove(&old_key)
            .map(|entry| entry.ttl)
            .unwrap_or(self.inner.default_ttl);
        drop(entries);

        debug!(from = %old_key, to = %entity.key(), "Re-keyed entity in identity map");
        self.insert_with_ttl(entity, ttl);
    }

    /// Check if a fresh entry exists
    pub fn contains(&self, type_name: &str, id: &str) -> bool {
        self.get(type_name, id).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    /// Drop every entry of one type, returning how many were removed
    pub fn clear_type(&self, type_name: &str) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| key.type_name != type_name);
        before - entries.len()
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    /// True if both handles point at the same map
    pub fn ptr_eq(&self, other: &EntityStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("entries", &self.len())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::entities::{Studio, Tag};
    use std::thread::sleep;

    #[test]
    fn test_insert_and_get_returns_same_instance() {
        let store = EntityStore::default();
        let tag = Tag::new();
        store.insert(tag.entity_ref());

        let cached = store.get("Tag", &tag.id()).expect("tag should be cached");
        assert!(cached.ptr_eq(tag.entity_ref()));
        assert!(store.contains("Tag", &tag.id()));
        assert!(!store.contains("Studio", &tag.id()));
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let store = EntityStore::new(Duration::ZERO);
        let tag = Tag::new();
        store.insert(tag.entity_ref());
        assert_eq!(store.len(), 1);

        assert!(store.get("Tag", &tag.id()).is_none());
        assert_eq!(store.len(), 0, "expired entry should be evicted on lookup");
    }

    #[test]
    fn test_elapsed_ttl_expires() {
        let store = EntityStore::default();
        let tag = Tag::new();
        store.insert_with_ttl(tag.entity_ref(), Duration::from_millis(20));
        assert!(store.get("Tag", &tag.id()).is_some());

        sleep(Duration::from_millis(40));
        assert!(store.get("Tag", &tag.id()).is_none());
    }

    #[test]
    fn test_clear_type_only_drops_that_type() {
        let store = EntityStore::default();
        store.insert(Tag::new().entity_ref());
        store.insert(Tag::new().entity_ref());
        store.insert(Studio::new().entity_ref());

        assert_eq!(store.clear_type("Tag"), 2);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_typed_lookup() {
        let store = EntityStore::default();
        let studio = Studio::new();
        store.insert(studio.entity_ref());

        let found: Option<Studio> = store.get_typed(&studio.id());
        assert_eq!(found, Some(studio.clone()));
        assert!(store.get_typed::<Tag>(&studio.id()).is_none());
    }
}
