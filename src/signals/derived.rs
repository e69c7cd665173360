//! Derived - Read-only computed node.
//!
//! A derived evaluates lazily on first read and re-evaluates only when a source
//! it read last time changed. A recomputed value that is equal (`PartialEq`) to
//! the previous one does not propagate: observers stay clean and subscribers
//! are not called.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::GraphError;

use super::runtime::{self, Cleanup, Computation, NodeId};
use super::scope::{Scope, Track};

type ComputeFn<T> = Box<dyn Fn(&mut Scope) -> Result<T, GraphError>>;

/// Read-only computed node.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

struct DerivedInner<T> {
    id: NodeId,
    compute: ComputeFn<T>,
    value: RefCell<Option<Result<T, GraphError>>>,
}

impl<T> Drop for DerivedInner<T> {
    fn drop(&mut self) {
        runtime::dispose(self.id);
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// Create a derived node from a computation.
///
/// The computation reads its inputs through the [`Scope`]; returning `Err`
/// stores the error as the node's value.
///
/// ```ignore
/// let width = signal(950u32);
/// let columns = derived(move |cx| Ok((cx.get(&width) / 100).max(1)));
/// assert_eq!(columns.get(), Ok(9));
/// ```
pub fn derived<T, F>(compute: F) -> Derived<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn(&mut Scope) -> Result<T, GraphError> + 'static,
{
    let inner = Rc::new_cyclic(|weak: &Weak<DerivedInner<T>>| {
        let computation: Weak<dyn Computation> = weak.clone();
        DerivedInner {
            id: runtime::register_computed(computation),
            compute: Box::new(compute),
            value: RefCell::new(None),
        }
    });
    Derived { inner }
}

impl<T: Clone + PartialEq + 'static> Computation for DerivedInner<T> {
    fn recompute(&self) -> bool {
        let next = match runtime::begin_compute(self.id) {
            Ok(()) => {
                let mut scope = Scope::new(self.id);
                let next = (self.compute)(&mut scope);
                runtime::end_compute(self.id, scope.into_sources());
                next
            }
            Err(err) => Err(err),
        };

        let changed = self.value.borrow().as_ref() != Some(&next);
        if changed {
            *self.value.borrow_mut() = Some(next);
            runtime::record_change(self.id);
        }
        tracing::trace!(node = %self.id, changed, "derived recomputed");
        changed
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Current value, recomputing first if any source changed (untracked).
    pub fn get(&self) -> Result<T, GraphError> {
        runtime::update_if_necessary(self.inner.id)?;
        self.inner
            .value
            .borrow()
            .clone()
            .unwrap_or(Err(GraphError::Disposed(self.inner.id)))
    }

    /// Nodes read during the last evaluation.
    pub fn dependencies(&self) -> Vec<NodeId> {
        runtime::sources_of(self.inner.id)
    }

    /// Call `f` after every settled change of the value.
    ///
    /// Subscribing evaluates the node immediately so later changes are pushed
    /// even if nothing else reads it.
    pub fn subscribe(&self, f: impl Fn(&Result<T, GraphError>) + 'static) -> Cleanup {
        let _ = runtime::update_if_necessary(self.inner.id);
        let weak = Rc::downgrade(&self.inner);
        runtime::subscribe(
            self.inner.id,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.value.borrow().clone();
                    if let Some(value) = value {
                        f(&value);
                    }
                }
            }),
        )
    }
}

impl<T: Clone + PartialEq + 'static> Track for Derived<T> {
    type Output = Result<T, GraphError>;

    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn read_tracked(&self) -> Self::Output {
        self.get()
    }
}
