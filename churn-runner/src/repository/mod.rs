//! Repository layer
//!
//! Repositories abstract where the harness's input comes from. They load
//! data without any scheduling logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod jobs;

// Re-export traits
pub use jobs::JobRepository;

// Re-export implementations
pub use jobs::FileJobRepository;
