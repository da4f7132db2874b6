//! Entity layer
//!
//! Provides the shared runtime behind the macro-generated entity types. The
//! `stash-macros` crate turns annotated structs into shared handles plus a
//! static [`EntitySchema`], which is the single source of truth for:
//! - field declarations and dirty tracking (which fields are tracked)
//! - relationship metadata (input keys, fetch strategy, inverses, transforms)
//! - GraphQL operation names and selections
//!
//! On top of it sit the identity map ([`EntityStore`]), the construction
//! pipeline that turns payloads into linked entities, and selective
//! population.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = EntityStore::default();
//! let scene = Scene::from_payload(&payload, &store)?;
//!
//! scene.set_title("Renamed".to_string());
//! assert!(scene.is_dirty());
//! assert_eq!(scene.get_changed_fields().len(), 1);
//! ```

mod builder;
mod construct;
mod entity;
mod input;
mod populate;
mod repository;
mod store;
mod traits;
mod value;

pub use builder::{
    Selection, default_selection, destroy_document, find_document, list_document,
    normalize_path, operation_name, populate_document, render_selection, save_document,
};
pub use construct::from_server_payload;
pub use entity::EntityRef;
pub use input::build_input;
pub use populate::{has_fields, missing_fields, populate};
pub use repository::{FindFilter, FindQuery, SortDirection};
pub use store::{CacheEntry, EntityKey, EntityStore};
pub use traits::*;
pub use value::{Field, UNSET, Unset, Value, is_set};

pub(crate) use construct::merge_payload;
pub(crate) use traits::json_field_type;
