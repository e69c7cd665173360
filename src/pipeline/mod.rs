//! Gallery Pipeline
//!
//! Connects the data source, the reactive state and the loader.
//!
//! # Pipeline Architecture
//!
//! ```text
//! SampleSource → SampleList (async derived) → ViewportTracker → ResourceLoader → ResourceCache
//! ```
//!
//! ## Data Flow
//!
//! 1. **SampleList** - Pages through the source on every refresh, keeps the
//!    last complete list
//! 2. **ViewportTracker** - Container size + scroll + list → visible cells →
//!    enter/leave events
//! 3. **ResourceLoader** - Fetches, shares, retries and caches payloads of the
//!    visible cells
//!
//! Filters, overlays and selection read the same resolved list and never touch
//! the loader.

pub mod mount;

pub use mount::{Gallery, MountHandle, mount, mount_http};
