//! List queries
//!
//! A fluent interface over the `find{Plural}` queries of the Stash API:
//!
//! ```rust,ignore
//! let tags = client
//!     .query::<Tag>()
//!     .q("outdoor")
//!     .sort("name", SortDirection::Asc)
//!     .per_page(50)
//!     .fetch_all()
//!     .await?;
//!
//! let favorites = client
//!     .query::<Performer>()
//!     .filter(json!({ "filter_favorites": true }))
//!     .count()
//!     .await?;
//! ```
//!
//! Results resolve through the client's identity map like any other payload.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use super::builder::list_document;
use super::traits::Entity;
use crate::graphql::client::StashClient;
use crate::graphql::errors::{Result, StashError};
use crate::graphql::transport::GraphQLRequest;

/// Sort direction of a list query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// `FindFilterType` of the Stash API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i32>,
    /// -1 returns every match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

/// Query builder for listing entities
pub struct FindQuery<'a, E: Entity> {
    client: &'a StashClient,
    find_filter: FindFilter,
    entity_filter: Option<JsonValue>,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> FindQuery<'a, E> {
    /// Create a new find query
    pub fn new(client: &'a StashClient) -> Self {
        Self {
            client,
            find_filter: FindFilter::default(),
            entity_filter: None,
            _marker: PhantomData,
        }
    }

    /// Free-text search
    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.find_filter.q = Some(q.into());
        self
    }

    /// Type-specific filter (`TagFilterType`, `SceneFilterType`, ...)
    pub fn filter(mut self, filter: JsonValue) -> Self {
        self.entity_filter = Some(filter);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.find_filter.sort = Some(field.into());
        self.find_filter.direction = Some(direction);
        self
    }

    /// 1-based page number
    pub fn page(mut self, page: i32) -> Self {
        self.find_filter.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: i32) -> Self {
        self.find_filter.per_page = Some(per_page);
        self
    }

    /// Return every match in one page
    pub fn all(self) -> Self {
        self.per_page(-1)
    }

    fn request(&self) -> Result<GraphQLRequest> {
        let schema = E::schema();
        let mut request = GraphQLRequest::new(list_document(schema)?).variable(
            "filter",
            serde_json::to_value(&self.find_filter).map_err(|e| StashError::Decode(e.to_string()))?,
        );
        if let Some(ref filter) = self.entity_filter {
            request = request.variable("entity_filter", filter.clone());
        }
        Ok(request)
    }

    async fn run(&self) -> Result<JsonMap<String, JsonValue>> {
        let schema = E::schema();
        let list = schema.operations.list.ok_or_else(|| StashError::Unsupported {
            type_name: schema.type_name.to_string(),
            operation: "list queries",
        })?;

        let mut data = self.client.execute(self.request()?).await?;
        match data.remove(list) {
            Some(JsonValue::Object(result)) => Ok(result),
            _ => Err(StashError::Decode(format!("{} returned no result", list))),
        }
    }

    /// Execute and fetch all results of the page
    pub async fn fetch_all(self) -> Result<Vec<E>> {
        let mut result = self.run().await?;
        let key = E::schema().operations.list_key.unwrap_or_default();

        let items = match result.remove(key) {
            Some(JsonValue::Array(items)) => items,
            _ => return Err(StashError::Decode(format!("list result has no {}", key))),
        };

        debug!(type_name = E::TYPE_NAME, count = items.len(), "Fetched entity list");

        items
            .iter()
            .map(|item| E::from_payload(item, self.client.store()))
            .collect()
    }

    /// Execute and fetch one optional result
    pub async fn fetch_optional(self) -> Result<Option<E>> {
        let results = self.per_page(1).fetch_all().await?;
        Ok(results.into_iter().next())
    }

    /// Execute and fetch exactly one result (errors if not found)
    pub async fn fetch_one(self) -> Result<E> {
        let query = self.find_filter.q.clone().unwrap_or_default();
        self.fetch_optional().await?.ok_or_else(|| StashError::NotFound {
            type_name: E::TYPE_NAME.to_string(),
            id: query,
        })
    }

    /// Number of matches, ignoring paging
    pub async fn count(self) -> Result<i64> {
        let result = self.run().await?;
        result
            .get("count")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| StashError::Decode("list result has no count".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_filter_serialization() {
        let filter = FindFilter {
            q: Some("outdoor".to_string()),
            per_page: Some(-1),
            sort: Some("name".to_string()),
            direction: Some(SortDirection::Desc),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({ "q": "outdoor", "per_page": -1, "sort": "name", "direction": "DESC" })
        );
        assert_eq!(serde_json::to_value(FindFilter::default()).unwrap(), json!({}));
    }
}
