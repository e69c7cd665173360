//! Scope - Explicit dependency registration.
//!
//! Computations never read nodes behind the runtime's back. Every tracked read
//! goes through the `Scope` passed to the computation, which records the node
//! id. When the computation returns, the recorded set becomes the node's
//! source list, replacing the previous one.

use std::collections::HashSet;

use super::runtime::NodeId;

/// A node that can be read from inside a computation.
pub trait Track {
    /// What a tracked read yields (`T` for signals, `Result<T, _>` for deriveds).
    type Output;

    fn node_id(&self) -> NodeId;

    /// Bring the node up to date and read it.
    fn read_tracked(&self) -> Self::Output;
}

/// Dependency recorder handed to derived computations.
#[derive(Debug)]
pub struct Scope {
    owner: NodeId,
    sources: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl Scope {
    pub(crate) fn new(owner: NodeId) -> Self {
        Self {
            owner,
            sources: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Node being computed.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Read `node` and register it as a dependency.
    pub fn get<S: Track>(&mut self, node: &S) -> S::Output {
        let id = node.node_id();
        if id != self.owner && self.seen.insert(id) {
            self.sources.push(id);
        }
        node.read_tracked()
    }

    /// Dependencies recorded so far, in first-read order.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub(crate) fn into_sources(self) -> Vec<NodeId> {
        self.sources
    }
}
