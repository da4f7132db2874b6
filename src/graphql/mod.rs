//! Typed access to the Stash GraphQL API
//!
//! - [`orm`]: the entity layer (identity map, dirty tracking, inverse sync,
//!   construction pipeline, selective populate)
//! - [`entities`]: the Stash entity types
//! - [`client`] and [`transport`]: requests over HTTP

pub mod client;
pub mod entities;
pub mod errors;
pub mod orm;
pub mod transport;

pub use client::StashClient;
pub use errors::{Result, StashError};
pub use transport::{GraphQLRequest, HttpTransport, Transport};
