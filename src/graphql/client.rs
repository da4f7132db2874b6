//! Stash API client
//!
//! Owns the transport and the session's identity map. Every entity built from
//! a response of this client resolves through the same [`EntityStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! let client = StashClient::from_config(&Config::from_env()?)?;
//!
//! let scene = client.find::<Scene>("42").await?.expect("scene exists");
//! client.populate(&scene, ["tags", "files.path"], false).await?;
//!
//! scene.set_title("Renamed".to_string());
//! client.save(&scene).await?;
//! ```

use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use tracing::{debug, info};

use super::errors::{Result, StashError};
use super::orm::{self, Entity, EntityRef, EntityStore, FindQuery, build_input};
use super::transport::{GraphQLRequest, HttpTransport, Transport};
use crate::config::Config;

/// Client for one Stash server session.
#[derive(Clone)]
pub struct StashClient {
    transport: Arc<dyn Transport>,
    store: EntityStore,
}

impl StashClient {
    pub fn new(transport: Arc<dyn Transport>, store: EntityStore) -> Self {
        Self { transport, store }
    }

    /// HTTP client with a fresh identity map, both configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        info!(url = %config.url, cache_ttl = ?config.cache_ttl, "Created Stash client");
        Ok(Self::new(Arc::new(transport), EntityStore::new(config.cache_ttl)))
    }

    /// The session's identity map
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Send a raw GraphQL request and return its `data` object.
    pub async fn execute(&self, request: GraphQLRequest) -> Result<JsonMap<String, JsonValue>> {
        self.transport.execute(request).await
    }

    /// Fetch one entity by id. A live cached instance is refreshed in place.
    pub async fn find<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let schema = T::schema();
        let request = GraphQLRequest::new(orm::find_document(schema)).variable("id", id);
        let mut data = self.execute(request).await?;

        match data.remove(schema.operations.find) {
            None | Some(JsonValue::Null) => {
                debug!(type_name = T::TYPE_NAME, id, "Entity not found");
                Ok(None)
            }
            Some(payload) => T::from_payload(&payload, &self.store).map(Some),
        }
    }

    /// Cached instance if fresh, otherwise [`find`](Self::find).
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        match self.store.get_typed::<T>(id) {
            Some(cached) => Ok(Some(cached)),
            None => self.find(id).await,
        }
    }

    /// Start a list query
    pub fn query<T: Entity>(&self) -> FindQuery<'_, T> {
        FindQuery::new(self)
    }

    /// Every entity matching a type-specific filter, in one page
    pub async fn find_all<T: Entity>(&self, filter: JsonValue) -> Result<Vec<T>> {
        self.query::<T>().filter(filter).all().fetch_all().await
    }

    /// Fetch the given paths of an entity that are not loaded yet.
    ///
    /// See [`orm::populate`] for the exact rules.
    pub async fn populate<T, I, S>(&self, entity: &T, fields: I, force_refetch: bool) -> Result<()>
    where
        T: Entity,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        orm::populate(entity.entity_ref(), fields, self, force_refetch).await?;
        Ok(())
    }

    /// Persist an entity.
    ///
    /// New entities are created with every set tracked field and re-keyed to
    /// the server id. Existing ones send only their changed tracked fields;
    /// a clean entity causes no request. Afterwards the baseline holds the
    /// sent values, so fields edited during the request remain dirty.
    pub async fn save<T: Entity>(&self, entity: &T) -> Result<()> {
        let entity = entity.entity_ref();
        let schema = entity.schema();
        let create = entity.is_new();

        let changed = entity.get_changed_fields();
        if !create && changed.is_empty() {
            debug!(entity = %entity.key(), "Entity is clean, nothing to save");
            return Ok(());
        }

        let input = build_input(entity, &changed)?;
        let saved_fields: Vec<&str> = changed
            .iter()
            .filter(|(_, value)| value.is_set())
            .map(|(name, _)| *name)
            .collect();
        let (document, operation) = orm::save_document(schema, create, saved_fields)?;

        let mut data = self
            .execute(GraphQLRequest::new(document).variable("input", JsonValue::Object(input)))
            .await?;

        let Some(JsonValue::Object(payload)) = data.remove(operation) else {
            return Err(StashError::Decode(format!("{} returned no object", operation)));
        };

        if create {
            self.confirm_created(entity, &payload)?;
        }

        let merged = orm::merge_payload(entity, &payload, &self.store)?;

        // Fields echoed by the server got their baseline from the merge
        entity.set_baseline(
            changed
                .iter()
                .filter(|(name, _)| !merged.contains(*name))
                .map(|(name, value)| (*name, value)),
        );

        info!(entity = %entity.key(), operation, fields = changed.len(), "Saved entity");
        Ok(())
    }

    fn confirm_created(&self, entity: &EntityRef, payload: &JsonMap<String, JsonValue>) -> Result<()> {
        let id = match payload.get("id") {
            Some(JsonValue::String(id)) => id.clone(),
            Some(JsonValue::Number(id)) => id.to_string(),
            _ => return Err(StashError::Decode("created entity has no id".to_string())),
        };

        let placeholder = entity.id();
        entity.confirm_id(id);
        self.store.rekey(entity, &placeholder);
        Ok(())
    }

    /// Delete an entity on the server and drop it from the identity map.
    ///
    /// Returns false for entities that were never saved.
    pub async fn destroy<T: Entity>(&self, entity: &T) -> Result<bool> {
        let entity = entity.entity_ref();
        if entity.is_new() {
            return Ok(false);
        }

        let (document, operation) = orm::destroy_document(entity.schema())?;
        let request = GraphQLRequest::new(document).variable("input", json!({ "id": entity.id() }));
        let mut data = self.execute(request).await?;

        let destroyed = data
            .remove(operation)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);

        if destroyed {
            self.store.remove(entity.type_name(), &entity.id());
            info!(entity = %entity.key(), "Destroyed entity");
        }

        Ok(destroyed)
    }
}

impl std::fmt::Debug for StashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StashClient")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
