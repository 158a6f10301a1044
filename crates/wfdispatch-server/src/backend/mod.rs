//! Orchestration backend adapters
//!
//! The core defines the `OrchestrationBackend` port; this module holds the
//! Argo Workflows implementation and the manifest decoration it applies.

/// Argo Server REST client
pub mod argo;

/// Manifest labels and annotations
pub mod manifest;

pub use argo::ArgoBackend;
