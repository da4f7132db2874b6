use stash_macros::entity;

use super::{Image, Performer, Scene, Studio, Tag};

#[entity(name = "Gallery", label = "title", plural = "Galleries")]
pub struct Gallery {
    #[field(tracked)]
    pub title: String,

    #[field(tracked)]
    pub code: String,

    #[field(tracked)]
    pub details: String,

    #[field(tracked)]
    pub photographer: String,

    #[field(tracked)]
    pub urls: Vec<String>,

    #[field(tracked)]
    pub date: String,

    #[field(tracked)]
    pub rating100: i32,

    #[field(tracked)]
    pub organized: bool,

    pub image_count: i32,

    #[relation(to = "studio_id")]
    pub studio: Studio,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[relation(to = "performer_ids")]
    pub performers: Vec<Performer>,

    #[relation(to = "scene_ids", inverse = "galleries")]
    pub scenes: Vec<Scene>,

    #[relation(query = "findImages", filter_arg = "image_filter", filter_field = "galleries", result = "images")]
    pub images: Vec<Image>,

    pub created_at: String,

    pub updated_at: String,
}
