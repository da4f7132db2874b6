//! Files discovered by library scans. Read-only through the API.

use stash_macros::entity;

use super::{Fingerprint, Folder};

#[entity(name = "VideoFile", label = "path", find = "findFile", read_only)]
pub struct VideoFile {
    pub path: String,

    pub basename: String,

    pub size: i64,

    pub duration: f64,

    pub video_codec: String,

    pub audio_codec: String,

    pub width: i32,

    pub height: i32,

    pub frame_rate: f64,

    pub bit_rate: i64,

    #[field(select = "type value")]
    pub fingerprints: Vec<Fingerprint>,

    #[relation]
    pub parent_folder: Folder,

    pub mod_time: String,
}

#[entity(name = "ImageFile", label = "path", find = "findFile", read_only)]
pub struct ImageFile {
    pub path: String,

    pub basename: String,

    pub size: i64,

    pub width: i32,

    pub height: i32,

    #[field(select = "type value")]
    pub fingerprints: Vec<Fingerprint>,

    #[relation]
    pub parent_folder: Folder,

    pub mod_time: String,
}
