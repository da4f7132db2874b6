use stash_macros::entity;

use super::{Scene, Tag};

/// A timestamped marker inside a scene.
#[entity(name = "SceneMarker", label = "title", plural = "SceneMarkers")]
pub struct SceneMarker {
    #[field(tracked)]
    pub title: String,

    /// Start position in seconds
    #[field(tracked)]
    pub seconds: f64,

    #[field(tracked)]
    pub end_seconds: f64,

    pub stream: String,

    pub preview: String,

    pub screenshot: String,

    #[relation(to = "scene_id", inverse = "scene_markers")]
    pub scene: Scene,

    #[relation(to = "primary_tag_id")]
    pub primary_tag: Tag,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    pub created_at: String,

    pub updated_at: String,
}
