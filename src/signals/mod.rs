//! Reactive Dependency Graph
//!
//! Fine-grained reactivity for the gallery: root [`Signal`]s, lazily computed
//! [`Derived`] nodes, [`AsyncDerived`] nodes backed by futures, and keyed
//! [`Family`] collections.
//!
//! # Model
//!
//! ```text
//! Signal ──▶ Derived ──▶ Derived ──▶ subscriber
//!    │                      ▲
//!    └──▶ AsyncDerived ─────┘
//! ```
//!
//! - Dependencies are registered explicitly: computations read through the
//!   [`Scope`] they are given, and the recorded ids become the node's sources.
//! - Recomputed values are compared with `PartialEq`; equal values stop
//!   propagation.
//! - Subscribers run once per settled change, after every node touched by the
//!   triggering write (or [`batch`]) is up to date.
//!
//! The graph is single-threaded: all state is thread-local, and async
//! derivations run as local tasks.

pub mod async_derived;
pub mod derived;
pub mod family;
pub mod runtime;
pub mod scope;
pub mod signal;

pub use async_derived::{AsyncDerived, Loadable, async_derived};
pub use derived::{Derived, derived};
pub use family::{DerivedFamily, Family, derived_family, family};
pub use runtime::{Cleanup, NodeId, batch, node_count, observers_of, sources_of};
pub use scope::{Scope, Track};
pub use signal::{Signal, signal};
