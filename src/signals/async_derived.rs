//! Async Derived - Computed node whose computation suspends.
//!
//! The computation has two halves:
//!
//! - a synchronous prelude that reads its inputs through the [`Scope`]
//!   (these reads are the dependencies), and
//! - the returned future, run as a local task on the current `LocalSet`.
//!
//! Readers see a [`Loadable`] lifecycle. When an input changes while a previous
//! evaluation is still in flight, that evaluation is aborted and its result,
//! should it still arrive, is discarded: the node only ever publishes the
//! result of its latest evaluation.
//!
//! Evaluation spawns with `tokio::task::spawn_local`, so the first read must
//! happen inside a `LocalSet`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::GraphError;

use super::runtime::{self, Cleanup, Computation, NodeId};
use super::scope::{Scope, Track};

// =============================================================================
// Loadable
// =============================================================================

/// Observable state of an async derived node.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    /// An evaluation is in flight. `previous` is the last resolved value.
    Pending { previous: Option<T> },
    Ready(T),
    Failed(GraphError),
}

impl<T> Loadable<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Value of a resolved node.
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Resolved value, or the last resolved value while pending.
    pub fn latest(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending { previous } => previous.as_ref(),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&GraphError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// AsyncDerived
// =============================================================================

type AsyncComputeFn<T> = Box<dyn Fn(&mut Scope) -> LocalBoxFuture<'static, Result<T, GraphError>>>;

/// Computed node backed by a future.
pub struct AsyncDerived<T> {
    inner: Rc<AsyncInner<T>>,
}

struct AsyncInner<T> {
    id: NodeId,
    this: Weak<AsyncInner<T>>,
    compute: AsyncComputeFn<T>,
    state: RefCell<Loadable<T>>,
    last_ready: RefCell<Option<T>>,
    generation: Cell<u64>,
    task: RefCell<Option<JoinHandle<()>>>,
    settled: Notify,
}

impl<T> Drop for AsyncInner<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
        runtime::dispose(self.id);
    }
}

impl<T> Clone for AsyncDerived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AsyncDerived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDerived")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.borrow())
            .finish()
    }
}

/// Create an async derived node.
///
/// ```ignore
/// let page = signal(0usize);
/// let page2 = page.clone();
/// let rows = async_derived(move |cx| {
///     let offset = cx.get(&page2) * 100;
///     let source = source.clone();
///     async move { source.get_samples(100, offset).await.map_err(GraphError::from) }
/// });
/// ```
pub fn async_derived<T, F, Fut>(compute: F) -> AsyncDerived<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn(&mut Scope) -> Fut + 'static,
    Fut: Future<Output = Result<T, GraphError>> + 'static,
{
    let inner = Rc::new_cyclic(|weak: &Weak<AsyncInner<T>>| {
        let computation: Weak<dyn Computation> = weak.clone();
        AsyncInner {
            id: runtime::register_computed(computation),
            this: weak.clone(),
            compute: Box::new(move |scope| compute(scope).boxed_local()),
            state: RefCell::new(Loadable::Pending { previous: None }),
            last_ready: RefCell::new(None),
            generation: Cell::new(0),
            task: RefCell::new(None),
            settled: Notify::new(),
        }
    });
    AsyncDerived { inner }
}

impl<T: Clone + PartialEq + 'static> AsyncInner<T> {
    fn store(&self, next: Loadable<T>) -> bool {
        let changed = *self.state.borrow() != next;
        if changed {
            *self.state.borrow_mut() = next;
        }
        changed
    }

    fn settle(&self, generation: u64, result: Result<T, GraphError>) {
        if generation != self.generation.get() {
            tracing::trace!(node = %self.id, generation, "discarding superseded evaluation");
            return;
        }
        self.task.borrow_mut().take();

        let next = match result {
            Ok(value) => {
                *self.last_ready.borrow_mut() = Some(value.clone());
                Loadable::Ready(value)
            }
            Err(err) => {
                tracing::debug!(node = %self.id, error = %err, "async derived failed");
                Loadable::Failed(err)
            }
        };
        if self.store(next) {
            runtime::record_write(self.id);
        }
        self.settled.notify_waiters();
    }
}

impl<T: Clone + PartialEq + 'static> Computation for AsyncInner<T> {
    fn recompute(&self) -> bool {
        let future = match runtime::begin_compute(self.id) {
            Ok(()) => {
                let mut scope = Scope::new(self.id);
                let future = (self.compute)(&mut scope);
                runtime::end_compute(self.id, scope.into_sources());
                future
            }
            Err(err) => {
                let changed = self.store(Loadable::Failed(err));
                if changed {
                    runtime::record_change(self.id);
                }
                return changed;
            }
        };

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if let Some(previous) = self.task.borrow_mut().take() {
            previous.abort();
        }

        let weak = self.this.clone();
        let handle = tokio::task::spawn_local(async move {
            let result = future.await;
            if let Some(inner) = weak.upgrade() {
                inner.settle(generation, result);
            }
        });
        *self.task.borrow_mut() = Some(handle);

        let previous = self.last_ready.borrow().clone();
        let changed = self.store(Loadable::Pending { previous });
        if changed {
            runtime::record_change(self.id);
        }
        tracing::trace!(node = %self.id, generation, "async derived started");
        changed
    }
}

impl<T: Clone + PartialEq + 'static> AsyncDerived<T> {
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Current state, starting an evaluation if an input changed (untracked).
    pub fn get(&self) -> Loadable<T> {
        if let Err(err) = runtime::update_if_necessary(self.inner.id) {
            return Loadable::Failed(err);
        }
        self.inner.state.borrow().clone()
    }

    /// Last successfully resolved value, ignoring any evaluation in flight.
    pub fn latest(&self) -> Option<T> {
        let _ = runtime::update_if_necessary(self.inner.id);
        self.inner.last_ready.borrow().clone()
    }

    /// Wait until the latest evaluation settles.
    pub async fn resolve(&self) -> Result<T, GraphError> {
        loop {
            let notified = self.inner.settled.notified();
            match self.get() {
                Loadable::Ready(value) => return Ok(value),
                Loadable::Failed(err) => return Err(err),
                Loadable::Pending { .. } => notified.await,
            }
        }
    }

    /// Nodes read by the synchronous prelude of the last evaluation.
    pub fn dependencies(&self) -> Vec<NodeId> {
        runtime::sources_of(self.inner.id)
    }

    /// Call `f` after every settled change of the state.
    pub fn subscribe(&self, f: impl Fn(&Loadable<T>) + 'static) -> Cleanup {
        let _ = runtime::update_if_necessary(self.inner.id);
        let weak = Rc::downgrade(&self.inner);
        runtime::subscribe(
            self.inner.id,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let state = inner.state.borrow().clone();
                    f(&state);
                }
            }),
        )
    }
}

impl<T: Clone + PartialEq + 'static> Track for AsyncDerived<T> {
    type Output = Loadable<T>;

    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn read_tracked(&self) -> Self::Output {
        self.get()
    }
}
