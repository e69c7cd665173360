//! Viewport Tracker - Which cells are rendered right now.
//!
//! Container size and scroll offset are signals. Geometry and the visible cell
//! list are derived from them and from the sample list, so a resize, a scroll
//! or a list refresh all flow through the same path. The tracker subscribes to
//! the visible list and diffs it by sample id into [`ViewportEvent`]s.
//!
//! ```text
//! size ──▶ geometry ──┐
//! samples ──┴─────────┼──▶ visible ──▶ diff ──▶ Enter / Leave
//! scroll ─────────────┘
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::config::GridConfig;
use crate::signals::{Cleanup, Derived, Signal, derived, signal};
use crate::types::{Sample, SampleId};

use super::geometry::{ContainerSize, GridGeometry, compute_geometry};

// =============================================================================
// Events
// =============================================================================

/// A cell inside the viewport (overscan included).
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleCell {
    pub index: usize,
    pub sample: Sample,
}

/// Visibility transition of one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// The sample's cell became visible. `distance` is how far its row is
    /// from the on-screen area (0 when on screen, positive in the overscan band).
    Enter {
        index: usize,
        sample: Sample,
        distance: u64,
    },
    Leave { index: usize, sample_id: SampleId },
}

impl ViewportEvent {
    pub fn sample_id(&self) -> SampleId {
        match self {
            Self::Enter { sample, .. } => sample.id,
            Self::Leave { sample_id, .. } => *sample_id,
        }
    }
}

type Listener = Rc<dyn Fn(&ViewportEvent)>;

// =============================================================================
// ViewportTracker
// =============================================================================

/// Tracks the visible cells of a virtualized grid.
#[derive(Clone)]
pub struct ViewportTracker {
    inner: Rc<TrackerInner>,
}

struct TrackerInner {
    size: Signal<ContainerSize>,
    scroll: Signal<u64>,
    geometry: Derived<Option<GridGeometry>>,
    visible: Derived<Rc<Vec<VisibleCell>>>,
    current: RefCell<HashMap<SampleId, usize>>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
    subscription: RefCell<Option<Cleanup>>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.subscription.get_mut().take() {
            unsubscribe();
        }
    }
}

impl ViewportTracker {
    /// Track `samples` laid out with `grid`. The container starts unmeasured.
    pub fn new(samples: Derived<Rc<Vec<Sample>>>, grid: GridConfig) -> Self {
        let size = signal(ContainerSize::default());
        let scroll = signal(0u64);

        let size_input = size.clone();
        let list = samples.clone();
        let geometry = derived(move |cx| {
            let size = cx.get(&size_input);
            let total = cx.get(&list)?.len();
            Ok(compute_geometry(size, &grid, total))
        });

        let layout = geometry.clone();
        let offset = scroll.clone();
        let visible = derived(move |cx| {
            let Some(geometry) = cx.get(&layout)? else {
                return Ok(Rc::new(Vec::new()));
            };
            let scroll = cx.get(&offset).min(geometry.max_scroll());
            let samples = cx.get(&samples)?;
            Ok(Rc::new(
                geometry
                    .visible_range(scroll, grid.overscan)
                    .filter_map(|index| {
                        samples.get(index).map(|sample| VisibleCell {
                            index,
                            sample: sample.clone(),
                        })
                    })
                    .collect(),
            ))
        });

        let inner = Rc::new(TrackerInner {
            size,
            scroll,
            geometry,
            visible,
            current: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            subscription: RefCell::new(None),
        });

        let weak: Weak<TrackerInner> = Rc::downgrade(&inner);
        let unsubscribe = inner.visible.subscribe(move |cells| {
            if let Some(inner) = weak.upgrade() {
                match cells {
                    Ok(cells) => inner.apply(cells),
                    Err(err) => {
                        debug!(error = %err, "visible cells unavailable");
                        inner.apply(&[]);
                    }
                }
            }
        });
        *inner.subscription.borrow_mut() = Some(unsubscribe);

        Self { inner }
    }

    // -------------------------------------------------------------------------
    // Inputs
    // -------------------------------------------------------------------------

    /// Record a new container measurement.
    pub fn set_container_size(&self, width: u32, height: u32) {
        self.inner.size.set(ContainerSize::new(width, height));
    }

    /// Apply every size a resize stream yields until it ends.
    pub async fn follow_resizes<S>(&self, resizes: S)
    where
        S: Stream<Item = ContainerSize>,
    {
        let mut resizes = std::pin::pin!(resizes);
        while let Some(size) = resizes.next().await {
            self.set_container_size(size.width, size.height);
        }
    }

    /// Scroll to `offset`, clamped to `[0, max_scroll]`.
    pub fn set_scroll(&self, offset: u64) {
        let max = self.geometry().map_or(0, |g| g.max_scroll());
        self.inner.scroll.set(offset.min(max));
    }

    /// Scroll by a signed delta. Returns `false` if already at the boundary.
    pub fn scroll_by(&self, delta: i64) -> bool {
        let current = self.scroll_offset();
        let next = current.saturating_add_signed(delta);
        self.set_scroll(next);
        self.scroll_offset() != current
    }

    /// Scroll so the row holding `index` is at the top (as far as possible).
    pub fn scroll_to_index(&self, index: usize) {
        if let Some(geometry) = self.geometry() {
            let (row, _) = geometry.cell_of(index);
            self.set_scroll(row as u64 * u64::from(geometry.row_height));
        }
    }

    // -------------------------------------------------------------------------
    // Outputs
    // -------------------------------------------------------------------------

    pub fn container_size(&self) -> ContainerSize {
        self.inner.size.get()
    }

    /// Effective scroll offset (clamped against the current geometry).
    pub fn scroll_offset(&self) -> u64 {
        let raw = self.inner.scroll.get();
        self.geometry().map_or(0, |g| raw.min(g.max_scroll()))
    }

    pub fn geometry(&self) -> Option<GridGeometry> {
        self.inner.geometry.get().ok().flatten()
    }

    /// Geometry node, for composing further derived state.
    pub fn geometry_node(&self) -> Derived<Option<GridGeometry>> {
        self.inner.geometry.clone()
    }

    pub fn visible_cells(&self) -> Rc<Vec<VisibleCell>> {
        self.inner.visible.get().unwrap_or_default()
    }

    pub fn is_visible(&self, id: SampleId) -> bool {
        self.inner.current.borrow().contains_key(&id)
    }

    /// Register `f` for every subsequent transition.
    pub fn on_event(&self, f: impl Fn(&ViewportEvent) + 'static) -> Cleanup {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, Rc::new(f)));

        let weak = Rc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(l, _)| *l != id);
            }
        })
    }

    /// `Enter` events for every cell currently visible, for a listener that
    /// attaches after cells are already on screen.
    pub fn replay(&self) -> Vec<ViewportEvent> {
        let geometry = self.geometry();
        let scroll = self.scroll_offset();
        self.visible_cells()
            .iter()
            .map(|cell| ViewportEvent::Enter {
                index: cell.index,
                sample: cell.sample.clone(),
                distance: geometry.map_or(0, |g| g.distance_to_viewport(cell.index, scroll)),
            })
            .collect()
    }
}

impl TrackerInner {
    fn apply(&self, cells: &[VisibleCell]) {
        let next: HashMap<SampleId, usize> =
            cells.iter().map(|c| (c.sample.id, c.index)).collect();

        let mut events = Vec::new();
        {
            let current = self.current.borrow();
            let mut left: Vec<(usize, SampleId)> = current
                .iter()
                .filter(|(id, _)| !next.contains_key(id))
                .map(|(&sample_id, &index)| (index, sample_id))
                .collect();
            left.sort_unstable();
            events.extend(
                left.into_iter()
                    .map(|(index, sample_id)| ViewportEvent::Leave { index, sample_id }),
            );

            let geometry = self.geometry.get().ok().flatten();
            let scroll = geometry.map_or(0, |g| self.scroll.get().min(g.max_scroll()));
            events.extend(
                cells
                    .iter()
                    .filter(|c| !current.contains_key(&c.sample.id))
                    .map(|c| ViewportEvent::Enter {
                        index: c.index,
                        sample: c.sample.clone(),
                        distance: geometry.map_or(0, |g| g.distance_to_viewport(c.index, scroll)),
                    }),
            );
        }
        *self.current.borrow_mut() = next;

        if events.is_empty() {
            return;
        }
        debug!(
            events = events.len(),
            visible = cells.len(),
            "viewport transitions"
        );
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for event in &events {
            for listener in &listeners {
                listener(event);
            }
        }
    }
}
