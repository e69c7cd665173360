//! Error types shared across the gallery engine.
//!
//! Cancellation is not an error anywhere except at the transport
//! seam, where [`FetchError::Canceled`] lets the loader tell an aborted request
//! apart from a failed one.

use std::path::PathBuf;

use thiserror::Error;

use crate::signals::NodeId;

// =============================================================================
// Graph Errors
// =============================================================================

/// Error stored on a derived node whose computation failed.
///
/// Errors are values in the graph: they are compared for equality like any
/// other node value and handed to dependents that read the failed node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node read itself (directly or transitively) while computing.
    #[error("dependency cycle detected at node {0}")]
    Cycle(NodeId),
    /// The node was dropped while a dependent still referenced it.
    #[error("node {0} is no longer alive")]
    Disposed(NodeId),
    /// The data source behind an async derivation failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A resolved value violated a data-model invariant.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// Free-form computation failure.
    #[error("{0}")]
    Computation(String),
}

impl GraphError {
    /// Build a computation error from any displayable message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Computation(message.to_string())
    }
}

// =============================================================================
// Data Source Errors
// =============================================================================

/// Failure reported by a [`SampleSource`](crate::source::SampleSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("sample request failed (limit {limit}, offset {offset}): {message}")]
    Request {
        limit: usize,
        offset: usize,
        message: String,
    },
    #[error("inconsistent sample page at offset {offset}: {message}")]
    InvalidPage { offset: usize, message: String },
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Failure reported by a [`Transport`](crate::loader::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The cancellation token fired before the payload arrived.
    #[error("request canceled")]
    Canceled,
    /// The server answered with a status >= 400.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    /// Connection, DNS, TLS or body read failure.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

// =============================================================================
// Model / Config Errors
// =============================================================================

/// Rejected confidence threshold bounds.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ThresholdError {
    #[error("threshold bound {0} is outside [0, 1]")]
    OutOfRange(f64),
    #[error("threshold low {low} exceeds high {high}")]
    Inverted { low: f64, high: f64 },
}

/// Failure loading or validating a [`GalleryConfig`](crate::config::GalleryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
