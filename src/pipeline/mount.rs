//! Mount API - Gallery lifecycle.
//!
//! `mount` builds the whole reactive pipeline and starts the first sample
//! fetch; the returned [`MountHandle`] tears it down again.
//!
//! # Example
//!
//! ```ignore
//! use spark_gallery::pipeline::mount;
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let handle = mount(GalleryConfig::default(), source, transport)?;
//!     handle.tracker().set_container_size(1200, 800);
//!     handle.samples().resolve().await?;
//!     // ... scroll, toggle, read handle.loader().state(id) ...
//!     handle.unmount();
//! }).await;
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::GalleryConfig;
use crate::error::ConfigError;
use crate::loader::{HttpTransport, ResourceCache, ResourceLoader, Transport};
use crate::signals::{Cleanup, Derived, DerivedFamily};
use crate::source::{SampleList, SampleSource};
use crate::state::{FilterState, Overlay, PerformanceCounters, SelectionIndex};
use crate::types::{Sample, SampleId, VisibilityFlags};
use crate::viewport::ViewportTracker;

// =============================================================================
// Gallery
// =============================================================================

/// Every component of a mounted gallery.
pub struct Gallery {
    config: GalleryConfig,
    samples: SampleList,
    filters: FilterState,
    filtered: Derived<Rc<Vec<Sample>>>,
    overlays: DerivedFamily<SampleId, Vec<Overlay>>,
    selection: SelectionIndex,
    tracker: ViewportTracker,
    loader: ResourceLoader,
}

impl Gallery {
    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn samples(&self) -> &SampleList {
        &self.samples
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Samples inside the confidence threshold.
    pub fn filtered_samples(&self) -> Derived<Rc<Vec<Sample>>> {
        self.filtered.clone()
    }

    /// Overlay list of one sample.
    pub fn overlays(&self, id: SampleId) -> Derived<Vec<Overlay>> {
        self.overlays.get(&id)
    }

    pub fn selection(&self) -> &SelectionIndex {
        &self.selection
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn counters(&self) -> PerformanceCounters {
        self.loader.counters()
    }

    pub fn cache(&self) -> ResourceCache {
        self.loader.cache()
    }

    /// Drop per-sample nodes of ids that left the list.
    ///
    /// The loader sees the item leave first, so a request still in flight
    /// is canceled before its state node goes away.
    fn release_samples(&self, ids: &[SampleId]) {
        for &id in ids {
            self.loader.leave(id);
            self.loader.release(id);
            self.selection.release(id);
            self.overlays.release(&id);
        }
    }
}

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`]. Unmounting (or dropping) detaches the loader
/// from the viewport and cancels every request.
pub struct MountHandle {
    gallery: Rc<Gallery>,
    cleanups: Vec<Cleanup>,
}

impl MountHandle {
    pub fn gallery(&self) -> Rc<Gallery> {
        self.gallery.clone()
    }

    /// Stop loading and detach every subscription.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.cleanups.is_empty() {
            return;
        }
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
        self.gallery.loader.shutdown();
        info!("gallery unmounted");
    }
}

impl Deref for MountHandle {
    type Target = Gallery;

    fn deref(&self) -> &Gallery {
        &self.gallery
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Build the pipeline and start fetching samples.
///
/// ```text
/// source ──▶ SampleList ──▶ ViewportTracker ──▶ ResourceLoader ──▶ cache
///                 │
///                 └──▶ filters / overlays / selection
/// ```
///
/// Must run inside a `LocalSet`. The container starts unmeasured, so nothing
/// loads until the host reports a size.
pub fn mount(
    config: GalleryConfig,
    source: Rc<dyn SampleSource>,
    transport: Rc<dyn Transport>,
) -> Result<MountHandle, ConfigError> {
    config.validate()?;

    let samples = SampleList::new(source, config.source.page_size);
    let resolved = samples.resolved();

    let filters = FilterState::new(VisibilityFlags::empty(), config.filters.threshold);
    let filtered = filters.filtered_samples(&resolved);
    let overlays = filters.overlays(&resolved);
    let selection = SelectionIndex::new();

    let tracker = ViewportTracker::new(resolved.clone(), config.grid);
    let loader = ResourceLoader::new(
        transport,
        ResourceCache::new(config.cache),
        PerformanceCounters::new(),
        config.loader,
    );

    let gallery = Rc::new(Gallery {
        config,
        samples,
        filters,
        filtered,
        overlays,
        selection,
        tracker,
        loader,
    });

    let mut cleanups = vec![gallery.loader.attach(&gallery.tracker)];

    let known: Rc<RefCell<HashSet<SampleId>>> = Rc::default();
    let weak = Rc::downgrade(&gallery);
    cleanups.push(resolved.subscribe(move |list| {
        let (Some(gallery), Ok(list)) = (weak.upgrade(), list) else {
            return;
        };
        let current: HashSet<SampleId> = list.iter().map(|s| s.id).collect();
        let gone: Vec<SampleId> = known.borrow().difference(&current).copied().collect();
        if !gone.is_empty() {
            debug!(released = gone.len(), "samples removed from list");
            gallery.release_samples(&gone);
        }
        *known.borrow_mut() = current;
    }));

    info!(
        page_size = gallery.config.source.page_size,
        max_in_flight = ?gallery.config.loader.max_in_flight,
        "gallery mounted"
    );
    Ok(MountHandle { gallery, cleanups })
}

/// [`mount`] with an [`HttpTransport`] sized from the loader config.
pub fn mount_http(
    config: GalleryConfig,
    source: Rc<dyn SampleSource>,
) -> Result<MountHandle, ConfigError> {
    let transport = Rc::new(HttpTransport::new(config.loader.max_response_bytes));
    mount(config, source, transport)
}
