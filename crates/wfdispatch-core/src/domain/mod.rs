/// Caller identity
pub mod user;

/// Workflow domain models
pub mod workflow;

/// Orchestration backend port
pub mod backend;
