//! Data Transfer Objects
//!
//! Documents read from or written to disk by the harness.

pub mod job_list;

pub use job_list::JobList;
