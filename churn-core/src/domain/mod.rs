//! Core domain types
//!
//! This module contains the core domain structures used across Churn.
//! Jobs are produced by the job source, metrics by the executor, and
//! summaries and reports by the scheduler.

pub mod batch;
pub mod job;
pub mod metric;
pub mod report;
pub mod summary;
