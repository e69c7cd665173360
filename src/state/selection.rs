//! Selection Index
//!
//! The selected sample ids live in a single signal holding a set. Toggling is
//! an O(1) copy-on-write insert/remove and the count is the set's length, so
//! neither depends on how many samples exist.
//!
//! Per-id membership lives in a keyed family of flags that only `toggle` and
//! `clear` write. A toggle writes the set and the one affected flag, so no
//! other membership node is visited.

use std::collections::HashSet;
use std::rc::Rc;

use crate::signals::{
    Derived, DerivedFamily, Family, Signal, batch, derived, derived_family, family, signal,
};
use crate::types::SampleId;

/// Reactive set of selected sample ids.
#[derive(Clone)]
pub struct SelectionIndex {
    selected: Signal<Rc<HashSet<SampleId>>>,
    flags: Family<SampleId, bool>,
    membership: DerivedFamily<SampleId, bool>,
    count: Derived<usize>,
}

impl Default for SelectionIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionIndex {
    pub fn new() -> Self {
        let selected: Signal<Rc<HashSet<SampleId>>> = signal(Rc::new(HashSet::new()));

        let set = selected.clone();
        let flags = family(move |id: &SampleId| set.with(|set| set.contains(id)));

        let members = flags.clone();
        let membership = derived_family(move |id: &SampleId, cx| Ok(cx.get(&members.get(id))));

        let set = selected.clone();
        let count = derived(move |cx| Ok(cx.get(&set).len()));

        Self {
            selected,
            flags,
            membership,
            count,
        }
    }

    /// Membership node for `id`.
    pub fn is_selected(&self, id: SampleId) -> Derived<bool> {
        self.membership.get(&id)
    }

    /// Untracked membership test.
    pub fn contains(&self, id: SampleId) -> bool {
        self.selected.with(|set| set.contains(&id))
    }

    /// Add `id` if absent, remove it otherwise.
    pub fn toggle(&self, id: SampleId) {
        batch(|| {
            let mut now_selected = false;
            self.selected.modify(|set| {
                let set = Rc::make_mut(set);
                now_selected = set.insert(id);
                if !now_selected {
                    set.remove(&id);
                }
            });
            if let Some(flag) = self.flags.peek(&id) {
                flag.set(now_selected);
            }
        });
    }

    /// Number of selected ids.
    pub fn count(&self) -> Derived<usize> {
        self.count.clone()
    }

    /// Untracked count.
    pub fn len(&self) -> usize {
        self.selected.with(|set| set.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selected ids in ascending order.
    pub fn selected_ids(&self) -> Vec<SampleId> {
        let mut ids: Vec<SampleId> = self.selected.with(|set| set.iter().copied().collect());
        ids.sort_unstable();
        ids
    }

    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        let ids = self.selected_ids();
        batch(|| {
            self.selected.set(Rc::new(HashSet::new()));
            for id in ids {
                if let Some(flag) = self.flags.peek(&id) {
                    flag.set(false);
                }
            }
        });
    }

    /// Drop the membership nodes kept for `id`.
    pub fn release(&self, id: SampleId) {
        self.membership.release(&id);
        self.flags.release(&id);
    }

    /// Underlying set signal.
    pub fn signal(&self) -> Signal<Rc<HashSet<SampleId>>> {
        self.selected.clone()
    }
}
