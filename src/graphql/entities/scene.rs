use stash_macros::entity;

use super::shared::scene_group_input;
use super::{
    Gallery, Group, Performer, SceneGroup, SceneMarker, ScenePaths, StashId, Studio, Tag,
    VideoFile,
};

/// A video scene and its links.
///
/// `scene_markers` is the inverse of `SceneMarker::scene`; assigning it
/// points each resident marker back at this scene.
#[entity(name = "Scene", label = "title", plural = "Scenes")]
pub struct Scene {
    #[field(tracked)]
    pub title: String,

    #[field(tracked)]
    pub code: String,

    #[field(tracked)]
    pub details: String,

    #[field(tracked)]
    pub director: String,

    #[field(tracked)]
    pub urls: Vec<String>,

    #[field(tracked)]
    pub date: String,

    #[field(tracked)]
    pub rating100: i32,

    #[field(tracked)]
    pub organized: bool,

    pub o_counter: i32,

    pub play_count: i32,

    #[field(select = "screenshot preview stream")]
    pub paths: ScenePaths,

    #[relation]
    pub files: Vec<VideoFile>,

    #[relation(to = "studio_id")]
    pub studio: Studio,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[relation(to = "performer_ids")]
    pub performers: Vec<Performer>,

    #[relation(to = "gallery_ids", inverse = "scenes")]
    pub galleries: Vec<Gallery>,

    /// Group memberships with the scene's position in each group
    #[relation(target = "Group", via = "group", to = "groups", transform = "scene_group_input")]
    #[field(select = "scene_index")]
    pub groups: Vec<SceneGroup>,

    #[relation(inverse = "scene")]
    pub scene_markers: Vec<SceneMarker>,

    #[field(tracked, select = "endpoint stash_id updated_at")]
    pub stash_ids: Vec<StashId>,

    pub created_at: String,

    pub updated_at: String,
}
