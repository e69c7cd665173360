//! # spark-gallery
//!
//! Reactive engine for a virtualized, lazily loaded image grid.
//!
//! ## Architecture
//!
//! State lives in a fine-grained reactive graph ([`signals`]): signals, derived
//! nodes, async derived nodes and keyed families. Everything else is built from
//! those nodes:
//!
//! ```text
//! SampleSource → SampleList → ViewportTracker → ResourceLoader → ResourceCache
//!                    │
//!                    └──→ FilterState / SelectionIndex → rendering layer
//! ```
//!
//! The engine is single-threaded. Async work runs as local tasks, so hosts
//! drive it from inside a `tokio::task::LocalSet`.
//!
//! ## Modules
//!
//! - [`signals`] - Reactive dependency graph
//! - [`types`] - Samples, labels, visibility flags, confidence threshold
//! - [`state`] - Selection index, filter selectors, performance counters
//! - [`source`] - Data source trait and the resolved sample list
//! - [`viewport`] - Grid geometry and visibility tracking
//! - [`loader`] - Cancellable fetching, retries and the resource cache
//! - [`pipeline`] - Mount/unmount of the whole gallery
//! - [`config`] / [`logging`] / [`error`] - Ambient plumbing

pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod signals;
pub mod source;
pub mod state;
pub mod types;
pub mod viewport;

// Re-export commonly used items
pub use types::*;

pub use config::{CacheConfig, FilterConfig, GalleryConfig, GridConfig, LoaderConfig, SourceConfig};

pub use error::{ConfigError, FetchError, GraphError, SourceError, ThresholdError};

pub use signals::{
    AsyncDerived, Cleanup, Derived, DerivedFamily, Family, Loadable, NodeId, Scope, Signal, Track,
    async_derived, batch, derived, derived_family, family, signal,
};

pub use state::{
    FilterState, Overlay, PerformanceCounters, PerformanceStats, SelectionIndex, compute_overlays,
    passes_threshold,
};

pub use source::{InMemorySource, SampleList, SampleSource};

pub use viewport::{ContainerSize, GridGeometry, ViewportEvent, ViewportTracker, VisibleCell};

pub use loader::{
    HttpTransport, LoadState, ResourceCache, ResourceHandle, ResourceLoader, Transport,
};

pub use pipeline::{Gallery, MountHandle, mount, mount_http};
