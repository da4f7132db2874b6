use stash_macros::entity;

use super::shared::group_description_input;
use super::{GroupDescription, Scene, Studio, Tag};

/// A group of scenes (formerly "movie").
///
/// Groups nest: `containing_groups` and `sub_groups` are link wrappers that
/// carry a description next to the related group.
#[entity(name = "Group", label = "name", plural = "Groups")]
pub struct Group {
    #[field(tracked)]
    pub name: String,

    #[field(tracked)]
    pub aliases: String,

    #[field(tracked)]
    pub duration: i32,

    #[field(tracked)]
    pub date: String,

    #[field(tracked)]
    pub rating100: i32,

    #[field(tracked)]
    pub director: String,

    #[field(tracked)]
    pub synopsis: String,

    #[field(tracked)]
    pub urls: Vec<String>,

    pub front_image_path: String,

    pub back_image_path: String,

    pub scene_count: i32,

    #[relation(to = "studio_id")]
    pub studio: Studio,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[relation(target = "Group", via = "group", to = "containing_groups", transform = "group_description_input")]
    #[field(select = "description")]
    pub containing_groups: Vec<GroupDescription>,

    #[relation(target = "Group", via = "group", to = "sub_groups", transform = "group_description_input")]
    #[field(select = "description")]
    pub sub_groups: Vec<GroupDescription>,

    #[relation(query = "findScenes", filter_arg = "scene_filter", filter_field = "groups", result = "scenes")]
    pub scenes: Vec<Scene>,

    pub created_at: String,

    pub updated_at: String,
}
