//! Churn Core
//!
//! Core types and abstractions for the Churn benchmark harness.
//!
//! This crate contains:
//! - Domain types: jobs, per-run metrics, summaries and reports
//! - Concurrency arithmetic: effective concurrency and batch partitioning
//! - DTOs: the job-list document read from disk

pub mod domain;
pub mod dto;
