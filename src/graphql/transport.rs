//! GraphQL transport
//!
//! The entity layer only needs "send a document with variables, get back the
//! `data` object". [`HttpTransport`] does that over HTTP with reqwest; tests
//! plug in their own [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};
use url::Url;

use super::errors::{Result, StashError};
use crate::config::Config;

/// A GraphQL request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub variables: JsonMap<String, JsonValue>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: JsonMap::new(),
        }
    }

    pub fn variable(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<JsonValue>,
    #[serde(default)]
    errors: Vec<GraphQLErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorMessage {
    message: String,
}

/// Sends GraphQL requests and returns the `data` object.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: GraphQLRequest) -> Result<JsonMap<String, JsonValue>>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(url: Url, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stash-client/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| StashError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.url.clone(), config.api_key.clone(), config.timeout)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: GraphQLRequest) -> Result<JsonMap<String, JsonValue>> {
        debug!(url = %self.url, variables = request.variables.len(), "Sending GraphQL request");

        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("ApiKey", key);
        }

        let response = builder.send().await.map_err(|e| StashError::Connection {
            url: self.url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Stash returned an error status");
            return Err(StashError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphQLResponse = response
            .json()
            .await
            .map_err(|e| StashError::Decode(e.to_string()))?;

        decode_response(body)
    }
}

fn decode_response(body: GraphQLResponse) -> Result<JsonMap<String, JsonValue>> {
    if !body.errors.is_empty() {
        return Err(StashError::Query(
            body.errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    match body.data {
        Some(JsonValue::Object(data)) => Ok(data),
        Some(other) => Err(StashError::Decode(format!(
            "expected an object in data, found {}",
            other
        ))),
        None => Err(StashError::Decode("response has no data".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn parse(body: JsonValue) -> GraphQLResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let request = GraphQLRequest::new("query { version { version } }");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "query": "query { version { version } }" })
        );

        let request = request.variable("id", "1");
        assert_eq!(serde_json::to_value(&request).unwrap()["variables"], json!({ "id": "1" }));
    }

    #[test]
    fn test_decode_data() {
        let data = decode_response(parse(json!({ "data": { "findTag": null } }))).unwrap();
        assert_eq!(data.get("findTag"), Some(&JsonValue::Null));
    }

    #[test]
    fn test_decode_errors() {
        let result = decode_response(parse(json!({
            "data": null,
            "errors": [{ "message": "tag not found", "path": ["findTag"] }]
        })));
        assert_matches!(result, Err(StashError::Query(messages)) if messages == vec!["tag not found".to_string()]);

        assert_matches!(decode_response(parse(json!({}))), Err(StashError::Decode(_)));
    }
}
