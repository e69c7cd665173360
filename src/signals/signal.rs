//! Signal - Mutable root state cell.
//!
//! A signal holds a value and notifies the graph when a write actually changes
//! it (`PartialEq`). Reads outside a [`Scope`](super::Scope) are untracked.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{self, Cleanup, NodeId};
use super::scope::Track;

/// Mutable, observable state cell.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: NodeId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        runtime::dispose(self.id);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// Create a new signal.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal {
        inner: Rc::new(SignalInner {
            id: runtime::register_source(),
            value: RefCell::new(initial),
        }),
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Current value (untracked).
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning (untracked).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Equal values are ignored.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        runtime::record_write(self.inner.id);
    }

    /// Compute the next value from the previous one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Mutate the value in place. Always counts as a change.
    ///
    /// Pair with `Rc::make_mut` for copy-on-write collections: the value is
    /// only cloned when a reader still holds the previous snapshot.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        runtime::record_write(self.inner.id);
    }

    /// Call `f` with the new value after every settled change.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Cleanup {
        let weak = Rc::downgrade(&self.inner);
        runtime::subscribe(
            self.inner.id,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.value.borrow().clone();
                    f(&value);
                }
            }),
        )
    }
}

impl<T: Clone + PartialEq + 'static> Track for Signal<T> {
    type Output = T;

    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn read_tracked(&self) -> T {
        self.get()
    }
}
