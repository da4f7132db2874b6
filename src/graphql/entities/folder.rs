use stash_macros::entity;

#[entity(name = "Folder", label = "path", read_only)]
pub struct Folder {
    pub path: String,

    #[relation]
    pub parent_folder: Folder,

    pub mod_time: String,
}
