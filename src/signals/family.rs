//! Families - Lazily keyed collections of independent nodes.
//!
//! A family creates one node per distinct key on first access. Each member has
//! its own node id and subscriber list, so writing one member never touches
//! the others. Members are kept until explicitly released; there is no
//! implicit collection of unused keys.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::error::GraphError;

use super::derived::{Derived, derived};
use super::scope::Scope;
use super::signal::{Signal, signal};

// =============================================================================
// Signal Family
// =============================================================================

/// One [`Signal`] per key, created on demand.
pub struct Family<K, T> {
    inner: Rc<FamilyInner<K, T>>,
}

struct FamilyInner<K, T> {
    init: Box<dyn Fn(&K) -> T>,
    members: RefCell<HashMap<K, Signal<T>>>,
}

impl<K, T> Clone for Family<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a signal family whose members start at `init(key)`.
pub fn family<K, T>(init: impl Fn(&K) -> T + 'static) -> Family<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    Family {
        inner: Rc::new(FamilyInner {
            init: Box::new(init),
            members: RefCell::new(HashMap::new()),
        }),
    }
}

impl<K, T> Family<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    /// Member for `key`, created on first access.
    pub fn get(&self, key: &K) -> Signal<T> {
        if let Some(member) = self.inner.members.borrow().get(key) {
            return member.clone();
        }
        let member = signal((self.inner.init)(key));
        self.inner
            .members
            .borrow_mut()
            .insert(key.clone(), member.clone());
        member
    }

    /// Member for `key` if it was already created.
    pub fn peek(&self, key: &K) -> Option<Signal<T>> {
        self.inner.members.borrow().get(key).cloned()
    }

    /// Drop the family's handle on `key`. Returns `true` if it existed.
    pub fn release(&self, key: &K) -> bool {
        let removed = self.inner.members.borrow_mut().remove(key);
        removed.is_some()
    }

    pub fn clear(&self) {
        let members = std::mem::take(&mut *self.inner.members.borrow_mut());
        drop(members);
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.members.borrow().keys().cloned().collect()
    }
}

// =============================================================================
// Derived Family
// =============================================================================

type KeyedComputeFn<K, T> = Rc<dyn Fn(&K, &mut Scope) -> Result<T, GraphError>>;

/// One [`Derived`] per key, created on demand.
pub struct DerivedFamily<K, T> {
    inner: Rc<DerivedFamilyInner<K, T>>,
}

struct DerivedFamilyInner<K, T> {
    compute: KeyedComputeFn<K, T>,
    members: RefCell<HashMap<K, Derived<T>>>,
}

impl<K, T> Clone for DerivedFamily<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a derived family; member `key` computes `compute(key, scope)`.
pub fn derived_family<K, T, F>(compute: F) -> DerivedFamily<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
    F: Fn(&K, &mut Scope) -> Result<T, GraphError> + 'static,
{
    DerivedFamily {
        inner: Rc::new(DerivedFamilyInner {
            compute: Rc::new(compute),
            members: RefCell::new(HashMap::new()),
        }),
    }
}

impl<K, T> DerivedFamily<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    pub fn get(&self, key: &K) -> Derived<T> {
        if let Some(member) = self.inner.members.borrow().get(key) {
            return member.clone();
        }
        let compute = self.inner.compute.clone();
        let owned_key = key.clone();
        let member = derived(move |cx| compute(&owned_key, cx));
        self.inner
            .members
            .borrow_mut()
            .insert(key.clone(), member.clone());
        member
    }

    pub fn peek(&self, key: &K) -> Option<Derived<T>> {
        self.inner.members.borrow().get(key).cloned()
    }

    pub fn release(&self, key: &K) -> bool {
        let removed = self.inner.members.borrow_mut().remove(key);
        removed.is_some()
    }

    pub fn clear(&self) {
        let members = std::mem::take(&mut *self.inner.members.borrow_mut());
        drop(members);
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
