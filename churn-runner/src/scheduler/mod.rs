//! Scheduler layer for the runner
//!
//! This layer walks the job list in order, splits each job's repetitions
//! into concurrency-bounded batches and drives them through the execution
//! service, all under a single run deadline.

pub mod batch;
pub mod deadline;

pub use batch::{BatchScheduler, SchedulerSettings};
pub use deadline::Deadline;
