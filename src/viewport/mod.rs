//! Viewport - Virtualized grid geometry and visibility tracking.
//!
//! - [`geometry`] - Column/row derivation and visible index ranges
//! - [`tracker`] - Reactive tracker emitting enter/leave transitions

pub mod geometry;
pub mod tracker;

pub use geometry::{ContainerSize, GridGeometry, compute_geometry};
pub use tracker::{ViewportEvent, ViewportTracker, VisibleCell};
