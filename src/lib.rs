//! Typed client for the Stash media organizer's GraphQL API
//!
//! Entities fetched through one [`StashClient`] share an identity map, so a
//! given scene, tag or performer is one shared object however many payloads
//! mention it. Entities track which fields changed since they were loaded,
//! keep both sides of bidirectional relationships in sync, and can lazily
//! fetch just the fields they are missing.
//!
//! ```rust,ignore
//! use stash_client::{Config, StashClient, entities::Scene};
//!
//! let client = StashClient::from_config(&Config::from_env()?)?;
//! let scene = client.find::<Scene>("42").await?.expect("scene exists");
//!
//! client.populate(&scene, ["tags", "performers"], false).await?;
//! scene.set_organized(true);
//! client.save(&scene).await?;
//! ```

pub mod config;
pub mod graphql;
pub mod logging;

pub use config::Config;
pub use graphql::orm::{Entity, EntityRef, EntityStore, Field, UNSET, Value};
pub use graphql::{GraphQLRequest, HttpTransport, Result, StashClient, StashError, Transport};
pub use graphql::{entities, orm};
