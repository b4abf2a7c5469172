//! Service layer
//!
//! Services contain the runner's business logic: launching and observing
//! worker processes, and reading system resource counters.
//!
//! All services are trait-based to enable testing and dependency injection.

mod execution;
mod sampler;

// Re-export traits
pub use execution::ExecutionService;

// Re-export implementations
pub use execution::{ExecutorSettings, ProcessExecutionService};
pub use sampler::default_sampler;
