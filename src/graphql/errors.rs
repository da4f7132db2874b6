//! Error types for the Stash client
//!
//! The transport variants mirror the failure classes of a GraphQL round trip
//! (connection, server, query validation, decoding). The entity layer adds
//! only construction errors; cache misses and stubs are never errors.

use thiserror::Error;

/// Errors returned by the client and the entity layer.
#[derive(Debug, Error)]
pub enum StashError {
    /// The request never produced an HTTP response
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// Non-success HTTP status
    #[error("server returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// The response carried GraphQL `errors`
    #[error("GraphQL request failed: {}", .0.join("; "))]
    Query(Vec<String>),

    /// The response body could not be interpreted
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A payload or assigned value disagrees with the declared field shape
    #[error("cannot construct {type_name}.{field}: {reason}")]
    Construction {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("{type_name} has no field named {field}")]
    UnknownField { type_name: String, field: String },

    #[error("{type_name} {id} not found")]
    NotFound { type_name: String, id: String },

    /// The entity type has no such operation (e.g., files cannot be created)
    #[error("{type_name} does not support {operation}")]
    Unsupported {
        type_name: String,
        operation: &'static str,
    },
}

impl StashError {
    /// True for failures raised by the transport rather than the entity layer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StashError::Connection { .. }
                | StashError::Server { .. }
                | StashError::Query(_)
                | StashError::Decode(_)
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = StashError> = std::result::Result<T, E>;
