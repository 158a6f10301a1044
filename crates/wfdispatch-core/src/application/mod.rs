/// Identity to namespace resolution
pub mod namespace_resolver;

/// Backend workflow resources
pub mod workflow_store;

/// Per-node log collection
pub mod log_aggregator;

/// Public dispatcher operations
pub mod dispatcher;
