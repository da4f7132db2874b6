use stash_macros::entity;

use super::Scene;

/// Tag with a parent/child hierarchy.
#[entity(name = "Tag", label = "name", plural = "Tags")]
pub struct Tag {
    #[field(tracked)]
    pub name: String,

    #[field(tracked)]
    pub sort_name: String,

    #[field(tracked)]
    pub description: String,

    #[field(tracked)]
    pub aliases: Vec<String>,

    #[field(tracked)]
    pub favorite: bool,

    #[field(tracked)]
    pub ignore_auto_tag: bool,

    pub image_path: String,

    pub scene_count: i32,

    pub created_at: String,

    pub updated_at: String,

    #[relation(to = "parent_ids", inverse = "children")]
    pub parents: Vec<Tag>,

    #[relation(to = "child_ids", inverse = "parents")]
    pub children: Vec<Tag>,

    /// Scenes carrying this tag, fetched with a filtered scene query
    #[relation(query = "findScenes", filter_arg = "scene_filter", filter_field = "tags", result = "scenes")]
    pub scenes: Vec<Scene>,
}
