//! Shared test helpers

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as JsonValue};
use stash_client::{EntityStore, GraphQLRequest, Result, StashClient, StashError, Transport};

/// Transport double that replays queued responses and records every request.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<JsonMap<String, JsonValue>>>>,
    requests: Mutex<Vec<GraphQLRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful `data` object
    pub fn respond(&self, data: JsonValue) {
        let JsonValue::Object(data) = data else {
            panic!("mock responses must be JSON objects");
        };
        self.responses.lock().push_back(Ok(data));
    }

    /// Queue a failure
    pub fn fail(&self, error: StashError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GraphQLRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> GraphQLRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("at least one request was sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: GraphQLRequest) -> Result<JsonMap<String, JsonValue>> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StashError::Decode("no mock response queued".to_string())))
    }
}

/// Client over a fresh mock transport and identity map
pub fn mock_client() -> (StashClient, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let client = StashClient::new(transport.clone(), EntityStore::default());
    (client, transport)
}

/// A connection failure as produced by the HTTP transport
pub fn connection_error() -> StashError {
    StashError::Connection {
        url: "http://localhost:9999/graphql".to_string(),
        message: "connection refused".to_string(),
    }
}
