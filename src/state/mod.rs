//! State Module - Reactive application state
//!
//! - **Selection** - Set-backed selection index with per-id membership nodes
//! - **Filters** - Visibility flags, confidence threshold and their selectors
//! - **Performance** - Loader telemetry counters

mod filters;
mod performance;
mod selection;

pub use filters::{FilterState, Overlay, compute_overlays, passes_threshold};
pub use performance::{PerformanceCounters, PerformanceStats};
pub use selection::SelectionIndex;
