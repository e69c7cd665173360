//! Loader - Viewport-driven image loading.
//!
//! - [`transport`] - Cancellable fetch seam and the HTTP implementation
//! - [`cache`] - Bounded LRU of fetched payloads with a release hook
//! - [`resource_loader`] - Per-item state machine, request sharing, admission
//!   gate and retries

pub mod cache;
pub mod resource_loader;
pub mod transport;

pub use cache::{ResourceCache, ResourceHandle};
pub use resource_loader::{LoadState, ResourceLoader};
pub use transport::{HttpTransport, Transport};
