use stash_macros::entity;

/// A background task on the server (scan, generate, clean, ...).
///
/// Jobs are looked up with `findJob(input: { id })` and cannot be written.
#[entity(name = "Job", label = "description", find_input, read_only)]
pub struct Job {
    pub status: String,

    #[field(rename = "subTasks")]
    pub sub_tasks: Vec<String>,

    pub description: String,

    /// Fraction complete, 0.0 to 1.0
    pub progress: f64,

    #[field(rename = "startTime")]
    pub start_time: String,

    #[field(rename = "endTime")]
    pub end_time: String,

    #[field(rename = "addTime")]
    pub add_time: String,

    pub error: String,
}
