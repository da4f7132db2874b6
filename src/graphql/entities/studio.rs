use stash_macros::entity;

use super::{StashId, Tag};

#[entity(name = "Studio", label = "name", plural = "Studios")]
pub struct Studio {
    #[field(tracked)]
    pub name: String,

    #[field(tracked)]
    pub urls: Vec<String>,

    #[field(tracked)]
    pub details: String,

    #[field(tracked)]
    pub aliases: Vec<String>,

    #[field(tracked)]
    pub rating100: i32,

    #[field(tracked)]
    pub favorite: bool,

    #[field(tracked)]
    pub ignore_auto_tag: bool,

    pub image_path: String,

    pub scene_count: i32,

    #[relation(to = "parent_id", inverse = "child_studios")]
    pub parent_studio: Studio,

    /// Studios whose parent is this one. Assigning it re-parents each child.
    #[relation(inverse = "parent_studio")]
    pub child_studios: Vec<Studio>,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[field(tracked, select = "endpoint stash_id updated_at")]
    pub stash_ids: Vec<StashId>,

    pub created_at: String,

    pub updated_at: String,
}
