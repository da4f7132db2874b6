use stash_macros::entity;

use super::{Scene, StashId, Tag};

#[entity(name = "Performer", label = "name", plural = "Performers")]
pub struct Performer {
    #[field(tracked)]
    pub name: String,

    #[field(tracked)]
    pub disambiguation: String,

    #[field(tracked)]
    pub gender: String,

    #[field(tracked)]
    pub birthdate: String,

    #[field(tracked)]
    pub death_date: String,

    #[field(tracked)]
    pub ethnicity: String,

    #[field(tracked)]
    pub country: String,

    #[field(tracked)]
    pub eye_color: String,

    #[field(tracked)]
    pub hair_color: String,

    #[field(tracked)]
    pub height_cm: i32,

    #[field(tracked)]
    pub weight: i32,

    #[field(tracked)]
    pub measurements: String,

    #[field(tracked)]
    pub career_length: String,

    #[field(tracked)]
    pub tattoos: String,

    #[field(tracked)]
    pub piercings: String,

    #[field(tracked)]
    pub alias_list: Vec<String>,

    #[field(tracked)]
    pub urls: Vec<String>,

    #[field(tracked)]
    pub details: String,

    #[field(tracked)]
    pub favorite: bool,

    #[field(tracked)]
    pub rating100: i32,

    #[field(tracked)]
    pub ignore_auto_tag: bool,

    pub image_path: String,

    pub scene_count: i32,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[field(tracked, select = "endpoint stash_id updated_at")]
    pub stash_ids: Vec<StashId>,

    #[relation(query = "findScenes", filter_arg = "scene_filter", filter_field = "performers", result = "scenes")]
    pub scenes: Vec<Scene>,

    pub created_at: String,

    pub updated_at: String,
}
