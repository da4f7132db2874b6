use stash_macros::entity;

use super::{Gallery, ImageFile, ImagePaths, Performer, Studio, Tag};

// Images are created by scans, never through the API
#[entity(name = "Image", plural = "Images", no_create)]
pub struct Image {
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

    pub o_counter: i32,

    #[field(select = "thumbnail preview image")]
    pub paths: ImagePaths,

    #[relation]
    pub files: Vec<ImageFile>,

    #[relation(to = "studio_id")]
    pub studio: Studio,

    #[relation(to = "tag_ids")]
    pub tags: Vec<Tag>,

    #[relation(to = "performer_ids")]
    pub performers: Vec<Performer>,

    #[relation(to = "gallery_ids")]
    pub galleries: Vec<Gallery>,

    pub created_at: String,

    pub updated_at: String,
}
