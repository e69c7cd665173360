//! Reactive Runtime - Node registry and change propagation.
//!
//! Every signal, derived and async derived owns a `NodeId` registered here.
//! The runtime keeps the graph topology (sources / observers), per-node
//! freshness state and subscriber lists. Typed values never live in the
//! runtime; they stay in the node handles.
//!
//! # Propagation
//!
//! Three-colour push-pull:
//!
//! ```text
//! write(signal)  → direct observers Dirty, transitive observers Check
//! settle         → pull every subscribed node (update_if_necessary)
//! notify         → one callback per subscriber per changed node
//! ```
//!
//! A `Check` node only recomputes if one of its sources actually changed value,
//! so equality cut-offs stop propagation early and untouched parts of the graph
//! are never visited.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::GraphError;

// =============================================================================
// Node Identity
// =============================================================================

/// Stable identifier of a node in the reactive graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Freshness of a computed node. Ordered so that `state < Dirty` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeState {
    Clean,
    Check,
    Dirty,
}

/// A node that can re-run its computation.
pub(crate) trait Computation {
    /// Re-run the computation and store the result.
    ///
    /// Returns `true` if the stored value changed.
    fn recompute(&self) -> bool;
}

/// Unsubscribe / teardown callback.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Runtime State
// =============================================================================

struct NodeRecord {
    state: NodeState,
    sources: Vec<NodeId>,
    observers: BTreeSet<NodeId>,
    version: u64,
    notified_version: u64,
    computation: Option<Weak<dyn Computation>>,
    subscribers: Vec<(u64, Rc<dyn Fn()>)>,
}

impl NodeRecord {
    fn new(state: NodeState, computation: Option<Weak<dyn Computation>>) -> Self {
        Self {
            state,
            sources: Vec::new(),
            observers: BTreeSet::new(),
            version: 0,
            notified_version: 0,
            computation,
            subscribers: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Runtime {
    next_id: u64,
    next_subscriber: u64,
    nodes: HashMap<NodeId, NodeRecord>,
    /// Stack of nodes currently running their computation.
    computing: Vec<NodeId>,
    batch_depth: usize,
    flushing: bool,
    /// Subscribed nodes that were marked and must be pulled on settle.
    pending: BTreeSet<NodeId>,
    /// Subscribed nodes whose value changed since the last notification pass.
    changed: BTreeSet<NodeId>,
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::default());
}

fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

impl Runtime {
    fn allocate(&mut self, record: NodeRecord) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, record);
        id
    }

    /// Raise `id` to `state`, marking transitive observers `Check`.
    fn mark(&mut self, id: NodeId, state: NodeState) {
        let mut stack = vec![(id, state)];
        while let Some((id, state)) = stack.pop() {
            let Some(record) = self.nodes.get_mut(&id) else {
                continue;
            };
            if record.state >= state {
                continue;
            }
            let was_clean = record.state == NodeState::Clean;
            record.state = state;
            if !record.subscribers.is_empty() {
                self.pending.insert(id);
            }
            if was_clean {
                stack.extend(record.observers.iter().map(|&obs| (obs, NodeState::Check)));
            }
        }
    }

    /// Bump the version of `id` and invalidate everything downstream.
    fn bump(&mut self, id: NodeId) {
        let Some(record) = self.nodes.get_mut(&id) else {
            return;
        };
        record.version += 1;
        if !record.subscribers.is_empty() {
            self.changed.insert(id);
        }
        let observers: Vec<NodeId> = record.observers.iter().copied().collect();
        for observer in observers {
            self.mark(observer, NodeState::Dirty);
        }
    }

    fn take_notifications(&mut self) -> Vec<Rc<dyn Fn()>> {
        let mut callbacks = Vec::new();
        for id in std::mem::take(&mut self.changed) {
            let Some(record) = self.nodes.get_mut(&id) else {
                continue;
            };
            if record.version == record.notified_version {
                continue;
            }
            record.notified_version = record.version;
            callbacks.extend(record.subscribers.iter().map(|(_, cb)| cb.clone()));
        }
        callbacks
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Register a root (writable) node.
pub(crate) fn register_source() -> NodeId {
    with_runtime(|rt| rt.allocate(NodeRecord::new(NodeState::Clean, None)))
}

/// Register a computed node. It starts `Dirty` so the first read evaluates it.
pub(crate) fn register_computed(computation: Weak<dyn Computation>) -> NodeId {
    with_runtime(|rt| rt.allocate(NodeRecord::new(NodeState::Dirty, Some(computation))))
}

/// Remove a node from the graph.
///
/// Called from `Drop`; silently does nothing during thread teardown or when the
/// runtime is already borrowed (the dead record is then skipped lazily).
pub(crate) fn dispose(id: NodeId) {
    let _ = RUNTIME.try_with(|rt| {
        let Ok(mut rt) = rt.try_borrow_mut() else {
            return;
        };
        let Some(record) = rt.nodes.remove(&id) else {
            return;
        };
        for source in record.sources {
            if let Some(source) = rt.nodes.get_mut(&source) {
                source.observers.remove(&id);
            }
        }
        rt.pending.remove(&id);
        rt.changed.remove(&id);
    });
}

// =============================================================================
// Computation Tracking
// =============================================================================

/// Enter the computation of `id`. Fails if `id` is already computing.
pub(crate) fn begin_compute(id: NodeId) -> Result<(), GraphError> {
    with_runtime(|rt| {
        if rt.computing.contains(&id) {
            return Err(GraphError::Cycle(id));
        }
        rt.computing.push(id);
        Ok(())
    })
}

/// Leave the computation of `id`, replacing its source edges with `sources`.
pub(crate) fn end_compute(id: NodeId, sources: Vec<NodeId>) {
    with_runtime(|rt| {
        if let Some(pos) = rt.computing.iter().rposition(|&c| c == id) {
            rt.computing.remove(pos);
        }
        let old = match rt.nodes.get_mut(&id) {
            Some(record) => std::mem::replace(&mut record.sources, sources.clone()),
            None => return,
        };
        let keep: HashSet<NodeId> = sources.iter().copied().collect();
        for source in old.iter().filter(|s| !keep.contains(s)) {
            if let Some(record) = rt.nodes.get_mut(source) {
                record.observers.remove(&id);
            }
        }
        for source in &sources {
            if let Some(record) = rt.nodes.get_mut(source) {
                record.observers.insert(id);
            }
        }
    })
}

/// Bring a computed node up to date, recomputing only if a source changed.
pub(crate) fn update_if_necessary(id: NodeId) -> Result<(), GraphError> {
    let lookup = with_runtime(|rt| {
        if rt.computing.contains(&id) {
            return Err(GraphError::Cycle(id));
        }
        Ok(rt.nodes.get(&id).map(|r| (r.state, r.sources.clone())))
    })?;
    let Some((state, sources)) = lookup else {
        return Ok(());
    };

    if state == NodeState::Check {
        for source in sources {
            if is_computed(source) {
                update_if_necessary(source)?;
            }
            if state_of(id) == Some(NodeState::Dirty) {
                break;
            }
        }
    }

    if state_of(id) == Some(NodeState::Dirty) {
        let computation = with_runtime(|rt| {
            rt.nodes
                .get(&id)
                .and_then(|r| r.computation.as_ref())
                .and_then(Weak::upgrade)
        });
        if let Some(computation) = computation {
            computation.recompute();
        }
    }

    with_runtime(|rt| {
        if let Some(record) = rt.nodes.get_mut(&id) {
            record.state = NodeState::Clean;
        }
    });
    Ok(())
}

fn state_of(id: NodeId) -> Option<NodeState> {
    with_runtime(|rt| rt.nodes.get(&id).map(|r| r.state))
}

fn is_computed(id: NodeId) -> bool {
    with_runtime(|rt| rt.nodes.get(&id).is_some_and(|r| r.computation.is_some()))
}

// =============================================================================
// Writes & Settlement
// =============================================================================

/// A root node was written with a new value (or an async node settled).
pub(crate) fn record_write(id: NodeId) {
    with_runtime(|rt| rt.bump(id));
    flush();
}

/// A computed node produced a new value during recomputation.
///
/// No flush here: the caller is already inside a pull.
pub(crate) fn record_change(id: NodeId) {
    with_runtime(|rt| rt.bump(id));
}

/// Settle pending nodes and deliver notifications.
///
/// No-op inside a batch or while a settle pass is already running; the
/// outermost pass picks up whatever was marked meanwhile.
pub(crate) fn flush() {
    let start = with_runtime(|rt| {
        if rt.batch_depth > 0 || rt.flushing {
            return false;
        }
        rt.flushing = true;
        true
    });
    if !start {
        return;
    }

    loop {
        let next = with_runtime(|rt| rt.pending.pop_first());
        let Some(id) = next else { break };
        // Errors are stored on the node itself; settlement carries on.
        let _ = update_if_necessary(id);
    }

    let callbacks = with_runtime(|rt| {
        rt.flushing = false;
        rt.take_notifications()
    });
    for callback in callbacks {
        callback();
    }
}

/// Run `f` with notifications deferred until it returns.
///
/// Every write inside the batch is settled in a single pass, so each
/// subscriber hears about the batch at most once.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    with_runtime(|rt| rt.batch_depth += 1);
    let result = f();
    let outermost = with_runtime(|rt| {
        rt.batch_depth -= 1;
        rt.batch_depth == 0
    });
    if outermost {
        flush();
    }
    result
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Register `callback` on `id`. The current version counts as already seen.
pub(crate) fn subscribe(id: NodeId, callback: Rc<dyn Fn()>) -> Cleanup {
    let subscriber = with_runtime(|rt| {
        let subscriber = rt.next_subscriber;
        rt.next_subscriber += 1;
        if let Some(record) = rt.nodes.get_mut(&id) {
            record.notified_version = record.version;
            record.subscribers.push((subscriber, callback));
        }
        subscriber
    });
    Box::new(move || {
        let _ = RUNTIME.try_with(|rt| {
            let Ok(mut rt) = rt.try_borrow_mut() else {
                return;
            };
            if let Some(record) = rt.nodes.get_mut(&id) {
                record.subscribers.retain(|(s, _)| *s != subscriber);
            }
        });
    })
}

// =============================================================================
// Inspection
// =============================================================================

/// Sources recorded during the last evaluation of `id`.
pub fn sources_of(id: NodeId) -> Vec<NodeId> {
    with_runtime(|rt| rt.nodes.get(&id).map(|r| r.sources.clone()).unwrap_or_default())
}

/// Nodes that read `id` during their last evaluation.
pub fn observers_of(id: NodeId) -> Vec<NodeId> {
    with_runtime(|rt| {
        rt.nodes
            .get(&id)
            .map(|r| r.observers.iter().copied().collect())
            .unwrap_or_default()
    })
}

/// Number of live nodes on this thread.
pub fn node_count() -> usize {
    with_runtime(|rt| rt.nodes.len())
}
