//! Entity types of the Stash API
//!
//! Each type is a shared handle generated by `#[entity]`; see
//! [`crate::graphql::orm`] for the behaviour every entity shares.

mod file;
mod folder;
mod gallery;
mod group;
mod image;
mod job;
mod performer;
mod scene;
mod scene_marker;
pub mod shared;
mod studio;
mod tag;

pub use file::{ImageFile, VideoFile};
pub use folder::Folder;
pub use gallery::Gallery;
pub use group::Group;
pub use image::Image;
pub use job::Job;
pub use performer::Performer;
pub use scene::Scene;
pub use scene_marker::SceneMarker;
pub use shared::{Fingerprint, GroupDescription, ImagePaths, SceneGroup, ScenePaths, StashId};
pub use studio::Studio;
pub use tag::Tag;
