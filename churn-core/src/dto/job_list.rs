//! Job-list document
//!
//! The on-disk shape is `{ "projects": [ <job>, ... ] }`.

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Root of the job file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub projects: Vec<Job>,
}

impl JobList {
    pub fn into_jobs(self) -> Vec<Job> {
        self.projects
    }
}
