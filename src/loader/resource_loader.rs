//! Resource Loader - Cancellable, deduplicated fetches for visible items.
//!
//! # Per-item state
//!
//! ```text
//! Idle ──enter──▶ Queued ──admit──▶ Requesting{attempt} ──▶ Loaded | Failed
//!   ▲               │                    │
//!   └────leave──────┴────────────────────┘   (canceled, back to Idle)
//! ```
//!
//! A cached URL skips straight to `Loaded`. Leaving resets any item to `Idle`,
//! so only visible items hold handles outside the cache.
//!
//! # Requests
//!
//! One request per URL, shared by every waiting item. A request owns a child
//! of the loader's shutdown token; it is canceled when its last waiter leaves.
//! At most `max_in_flight` requests run at once, the rest wait in a priority
//! queue ordered by distance to the viewport. Transient failures are retried
//! `max_retries` times after a fixed delay; the delay is raced against the
//! token, so a retry never fires for an item that already left.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::{Rc, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::LoaderConfig;
use crate::error::FetchError;
use crate::signals::{Cleanup, Family, Signal, batch, family};
use crate::state::PerformanceCounters;
use crate::types::SampleId;
use crate::viewport::{ViewportEvent, ViewportTracker};

use super::cache::{ResourceCache, ResourceHandle};
use super::transport::Transport;

// =============================================================================
// LoadState
// =============================================================================

/// Load state of one sample's image.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Idle,
    /// Waiting for an admission slot.
    Queued,
    /// Network operation in progress; `attempt` starts at 1.
    Requesting { attempt: u32 },
    Loaded(ResourceHandle),
    /// Retries exhausted. The renderer shows its placeholder.
    Failed(FetchError),
}

impl LoadState {
    /// Queued or requesting.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::Requesting { .. })
    }
}

// =============================================================================
// Internal bookkeeping
// =============================================================================

struct Request {
    token: CancellationToken,
    waiters: HashSet<SampleId>,
    priority: u64,
    /// Sequence of the queue entry that may start this request. Older
    /// entries for the same URL are stale.
    queue_seq: u64,
    attempt: u32,
    task: Option<JoinHandle<()>>,
}

impl Request {
    fn started(&self) -> bool {
        self.task.is_some()
    }

    fn state(&self) -> LoadState {
        if self.started() {
            LoadState::Requesting {
                attempt: self.attempt,
            }
        } else {
            LoadState::Queued
        }
    }
}

/// Queue entry: closest first, then first come.
type QueueEntry = Reverse<(u64, u64, String)>;

struct LoaderInner {
    transport: Rc<dyn Transport>,
    cache: ResourceCache,
    counters: PerformanceCounters,
    config: LoaderConfig,
    states: Family<SampleId, LoadState>,
    /// Entered items and the URL each one shows.
    visible: RefCell<HashMap<SampleId, String>>,
    requests: RefCell<HashMap<String, Request>>,
    queue: RefCell<BinaryHeap<QueueEntry>>,
    in_flight: Cell<usize>,
    sequence: Cell<u64>,
    shutdown: CancellationToken,
}

impl Drop for LoaderInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        for request in self.requests.get_mut().values_mut() {
            if let Some(task) = request.task.take() {
                task.abort();
            }
        }
    }
}

// =============================================================================
// ResourceLoader
// =============================================================================

/// Loads images for the items the viewport reports as visible.
#[derive(Clone)]
pub struct ResourceLoader {
    inner: Rc<LoaderInner>,
}

impl ResourceLoader {
    pub fn new(
        transport: Rc<dyn Transport>,
        cache: ResourceCache,
        counters: PerformanceCounters,
        config: LoaderConfig,
    ) -> Self {
        Self {
            inner: Rc::new(LoaderInner {
                transport,
                cache,
                counters,
                config,
                states: family(|_: &SampleId| LoadState::Idle),
                visible: RefCell::new(HashMap::new()),
                requests: RefCell::new(HashMap::new()),
                queue: RefCell::new(BinaryHeap::new()),
                in_flight: Cell::new(0),
                sequence: Cell::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Reactive load state of `id`.
    pub fn state(&self, id: SampleId) -> Signal<LoadState> {
        self.inner.states.get(&id)
    }

    /// Drop the state node kept for `id` (for samples gone from the list).
    pub fn release(&self, id: SampleId) {
        self.inner.states.release(&id);
    }

    /// Samples with a live state node.
    pub fn tracked_states(&self) -> usize {
        self.inner.states.len()
    }

    pub fn cache(&self) -> ResourceCache {
        self.inner.cache.clone()
    }

    pub fn counters(&self) -> PerformanceCounters {
        self.inner.counters.clone()
    }

    /// Requests currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// Requests waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner
            .requests
            .borrow()
            .values()
            .filter(|r| !r.started())
            .count()
    }

    /// Apply one viewport transition.
    pub fn handle_event(&self, event: &ViewportEvent) {
        match event {
            ViewportEvent::Enter {
                sample, distance, ..
            } => self.enter(sample.id, &sample.url, *distance),
            ViewportEvent::Leave { sample_id, .. } => self.leave(*sample_id),
        }
    }

    /// Follow `tracker`, starting with the cells it already shows.
    pub fn attach(&self, tracker: &ViewportTracker) -> Cleanup {
        for event in tracker.replay() {
            self.handle_event(&event);
        }
        let weak = Rc::downgrade(&self.inner);
        tracker.on_event(move |event| {
            if let Some(inner) = weak.upgrade() {
                ResourceLoader { inner }.handle_event(event);
            }
        })
    }

    /// An item became visible.
    pub fn enter(&self, id: SampleId, url: &str, distance: u64) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() || inner.visible.borrow().contains_key(&id) {
            return;
        }
        inner.visible.borrow_mut().insert(id, url.to_owned());
        let state = inner.states.get(&id);

        if let Some(handle) = inner.cache.get(url) {
            trace!(id, url, "cache hit");
            state.set(LoadState::Loaded(handle));
            return;
        }

        inner.counters.record_requested();
        let joined = {
            let mut requests = inner.requests.borrow_mut();
            match requests.get_mut(url) {
                Some(request) => {
                    request.waiters.insert(id);
                    if !request.started() && distance < request.priority {
                        request.priority = distance;
                        request.queue_seq = inner.push_queue(url, distance);
                    }
                    Some(request.state())
                }
                None => {
                    let queue_seq = inner.push_queue(url, distance);
                    requests.insert(
                        url.to_owned(),
                        Request {
                            token: inner.shutdown.child_token(),
                            waiters: HashSet::from([id]),
                            priority: distance,
                            queue_seq,
                            attempt: 0,
                            task: None,
                        },
                    );
                    None
                }
            }
        };

        match joined {
            Some(shared) => {
                debug!(id, url, "joined request in flight");
                state.set(shared);
            }
            None => {
                state.set(LoadState::Queued);
                LoaderInner::pump(inner);
            }
        }
    }

    /// An item left the viewport.
    ///
    /// Pending is decided by the request's waiter set, so an item whose
    /// state node was already released still cancels its request.
    pub fn leave(&self, id: SampleId) {
        let inner = &self.inner;
        let Some(url) = inner.visible.borrow_mut().remove(&id) else {
            return;
        };

        let (was_waiting, abandoned) = {
            let mut requests = inner.requests.borrow_mut();
            match requests.get_mut(&url) {
                Some(request) => {
                    if request.waiters.remove(&id) {
                        let orphaned = request.waiters.is_empty();
                        (true, if orphaned { requests.remove(&url) } else { None })
                    } else {
                        (false, None)
                    }
                }
                None => (false, None),
            }
        };

        if was_waiting {
            inner.counters.record_canceled();
        }
        if let Some(request) = abandoned {
            debug!(id, url = %url, "request canceled");
            request.token.cancel();
            if request.started() {
                inner.release_slot();
                LoaderInner::pump(inner);
            }
        }
        if let Some(state) = inner.states.peek(&id) {
            state.set(LoadState::Idle);
        }
    }

    /// Cancel every request and reset every pending item to `Idle`.
    ///
    /// The loader ignores later `enter` calls.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        let requests: Vec<Request> = inner.requests.borrow_mut().drain().map(|(_, r)| r).collect();
        inner.queue.borrow_mut().clear();
        inner.in_flight.set(0);

        let mut waiters = Vec::new();
        for mut request in requests {
            request.token.cancel();
            if let Some(task) = request.task.take() {
                task.abort();
            }
            waiters.extend(request.waiters);
        }
        debug!(items = waiters.len(), "loader shutdown");
        batch(|| {
            for id in waiters {
                inner.counters.record_canceled();
                inner.states.get(&id).set(LoadState::Idle);
            }
        });
        inner.visible.borrow_mut().clear();
    }
}

impl LoaderInner {
    /// Queue `url` and return the entry's sequence number.
    fn push_queue(&self, url: &str, distance: u64) -> u64 {
        let seq = self.sequence.get();
        self.sequence.set(seq + 1);
        self.queue
            .borrow_mut()
            .push(Reverse((distance, seq, url.to_owned())));
        seq
    }

    fn has_free_slot(&self) -> bool {
        self.config
            .max_in_flight
            .is_none_or(|max| self.in_flight.get() < max)
    }

    fn release_slot(&self) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
    }

    /// Start queued requests while slots are free.
    fn pump(this: &Rc<Self>) {
        while this.has_free_slot() {
            let Some(Reverse((_, seq, url))) = this.queue.borrow_mut().pop() else {
                return;
            };
            let startable = this
                .requests
                .borrow()
                .get(&url)
                .is_some_and(|r| !r.started() && r.queue_seq == seq && !r.token.is_cancelled());
            if startable {
                Self::start(this, &url);
            }
        }
    }

    fn start(this: &Rc<Self>, url: &str) {
        let token = {
            let requests = this.requests.borrow();
            let Some(request) = requests.get(url) else {
                return;
            };
            request.token.clone()
        };
        this.in_flight.set(this.in_flight.get() + 1);

        let task = tokio::task::spawn_local(run_request(
            Rc::downgrade(this),
            this.transport.clone(),
            url.to_owned(),
            token,
            this.config,
        ));
        if let Some(request) = this.requests.borrow_mut().get_mut(url) {
            request.task = Some(task);
        }
        this.begin_attempt(url, 1);
    }

    /// Record a new attempt and show it on every waiter.
    fn begin_attempt(&self, url: &str, attempt: u32) {
        let waiters: Vec<SampleId> = {
            let mut requests = self.requests.borrow_mut();
            let Some(request) = requests.get_mut(url) else {
                return;
            };
            request.attempt = attempt;
            request.waiters.iter().copied().collect()
        };
        trace!(url, attempt, waiters = waiters.len(), "attempt");
        batch(|| {
            for id in waiters {
                self.states.get(&id).set(LoadState::Requesting { attempt });
            }
        });
    }

    /// Settle a request that was not canceled.
    fn complete(this: &Rc<Self>, url: &str, outcome: Result<ResourceHandle, FetchError>) {
        let Some(request) = this.requests.borrow_mut().remove(url) else {
            return;
        };
        this.release_slot();

        match outcome {
            Ok(handle) => {
                debug!(url, bytes = handle.len(), waiters = request.waiters.len(), "loaded");
                this.cache.insert(handle.clone());
                batch(|| {
                    for id in &request.waiters {
                        this.counters.record_loaded();
                        this.states.get(id).set(LoadState::Loaded(handle.clone()));
                    }
                });
            }
            Err(err) => {
                warn!(url, error = %err, attempts = request.attempt, "load failed");
                batch(|| {
                    for id in &request.waiters {
                        this.states.get(id).set(LoadState::Failed(err.clone()));
                    }
                });
            }
        }
        Self::pump(this);
    }
}

/// Drive one request through its attempts.
async fn run_request(
    loader: Weak<LoaderInner>,
    transport: Rc<dyn Transport>,
    url: String,
    token: CancellationToken,
    config: LoaderConfig,
) {
    let mut attempt = 1;
    loop {
        let result = transport.fetch(&url, token.clone()).await;
        if token.is_cancelled() {
            return;
        }
        let Some(inner) = loader.upgrade() else {
            return;
        };
        match result {
            Ok(bytes) => {
                LoaderInner::complete(&inner, &url, Ok(ResourceHandle::new(&url, bytes)));
                return;
            }
            Err(err) if err.is_canceled() => return,
            Err(err) if attempt <= config.max_retries => {
                debug!(url = %url, attempt, error = %err, "retrying after delay");
                drop(inner);
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(config.retry_delay()) => {}
                }
                attempt += 1;
                match loader.upgrade() {
                    Some(inner) => inner.begin_attempt(&url, attempt),
                    None => return,
                }
            }
            Err(err) => {
                LoaderInner::complete(&inner, &url, Err(err));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::task::LocalSet;

    /// Serves `url` bytes after `delay`; URLs in `failures` fail that many times first.
    struct FakeTransport {
        delay: Duration,
        failures: RefCell<HashMap<String, u32>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn new(delay_ms: u64) -> Rc<Self> {
            Rc::new(Self {
                delay: Duration::from_millis(delay_ms),
                failures: RefCell::new(HashMap::new()),
                calls: RefCell::new(Vec::new()),
            })
        }

        fn fail(&self, url: &str, times: u32) {
            self.failures.borrow_mut().insert(url.to_owned(), times);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    #[async_trait(?Send)]
    impl Transport for FakeTransport {
        async fn fetch(&self, url: &str, cancel: CancellationToken) -> Result<Vec<u8>, FetchError> {
            self.calls.borrow_mut().push(url.to_owned());
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Canceled),
                _ = tokio::time::sleep(self.delay) => {}
            }
            let mut failures = self.failures.borrow_mut();
            if let Some(remaining) = failures.get_mut(url).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(FetchError::Status {
                    url: url.to_owned(),
                    status: 503,
                });
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    fn setup(transport: Rc<FakeTransport>, max_in_flight: Option<usize>) -> ResourceLoader {
        ResourceLoader::new(
            transport,
            ResourceCache::new(CacheConfig::default()),
            PerformanceCounters::new(),
            LoaderConfig {
                max_in_flight,
                ..LoaderConfig::default()
            },
        )
    }

    async fn wait_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_enter_loads_and_caches() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(50);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "u1", 0);
                assert_eq!(loader.state(1).get(), LoadState::Requesting { attempt: 1 });
                assert_eq!(loader.in_flight(), 1);

                wait_ms(60).await;
                assert!(matches!(loader.state(1).get(), LoadState::Loaded(h) if h.bytes() == b"u1"));
                assert!(loader.cache().contains("u1"));
                assert_eq!(loader.in_flight(), 0);
                let stats = loader.counters().snapshot();
                assert_eq!((stats.total_requested, stats.fully_loaded), (1, 1));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_cached_url_skips_network() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(10);
                let loader = setup(transport.clone(), None);
                loader.cache().insert(ResourceHandle::new("u1", vec![1, 2, 3]));

                loader.enter(7, "u1", 0);
                assert!(matches!(loader.state(7).get(), LoadState::Loaded(_)));
                wait_ms(50).await;
                assert!(transport.calls().is_empty());
                assert_eq!(loader.counters().snapshot().total_requested, 0);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_leave_while_requesting_cancels() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(100);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "u1", 0);
                wait_ms(10).await;
                loader.leave(1);
                assert_eq!(loader.state(1).get(), LoadState::Idle);
                assert_eq!(loader.in_flight(), 0);

                wait_ms(500).await;
                assert_eq!(loader.state(1).get(), LoadState::Idle);
                assert!(loader.cache().is_empty());
                let stats = loader.counters().snapshot();
                assert_eq!((stats.canceled, stats.fully_loaded), (1, 0));
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_retries_then_fails() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(10);
                transport.fail("bad", 10);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "bad", 0);
                wait_ms(15).await;
                assert_eq!(loader.state(1).get(), LoadState::Requesting { attempt: 1 });
                wait_ms(1_000).await;
                assert_eq!(loader.state(1).get(), LoadState::Requesting { attempt: 2 });

                wait_ms(5_000).await;
                assert!(matches!(
                    loader.state(1).get(),
                    LoadState::Failed(FetchError::Status { status: 503, .. })
                ));
                assert_eq!(transport.calls().len(), 3);

                wait_ms(5_000).await;
                assert_eq!(transport.calls().len(), 3);

                // Re-entry starts over.
                loader.leave(1);
                loader.enter(1, "bad", 0);
                assert_eq!(loader.state(1).get(), LoadState::Requesting { attempt: 1 });
                assert_eq!(transport.calls().len(), 3);
                wait_ms(1).await;
                assert_eq!(transport.calls().len(), 4);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_transient_failure_recovers() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(10);
                transport.fail("flaky", 1);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "flaky", 0);
                wait_ms(1_100).await;
                assert!(matches!(loader.state(1).get(), LoadState::Loaded(_)));
                assert_eq!(transport.calls().len(), 2);
                assert_eq!(loader.counters().snapshot().total_requested, 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_leave_during_retry_delay_stops_retrying() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(10);
                transport.fail("bad", 10);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "bad", 0);
                wait_ms(100).await;
                assert_eq!(transport.calls().len(), 1);
                loader.leave(1);

                wait_ms(10_000).await;
                assert_eq!(transport.calls().len(), 1);
                assert_eq!(loader.state(1).get(), LoadState::Idle);
                assert_eq!(loader.counters().snapshot().canceled, 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_shared_url_issues_one_request() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(50);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "same", 0);
                loader.enter(2, "same", 0);
                assert_eq!(loader.state(2).get(), LoadState::Requesting { attempt: 1 });

                // One waiter leaving does not cancel the shared request.
                loader.enter(3, "same", 0);
                loader.leave(3);

                wait_ms(60).await;
                assert_eq!(transport.calls(), vec!["same".to_string()]);
                assert_eq!(loader.state(1).get(), loader.state(2).get());
                assert!(matches!(loader.state(1).get(), LoadState::Loaded(_)));
                assert_eq!(loader.state(3).get(), LoadState::Idle);
                let stats = loader.counters().snapshot();
                assert_eq!(
                    (stats.total_requested, stats.canceled, stats.fully_loaded),
                    (3, 1, 2)
                );
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_admission_gate_prefers_closest() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(50);
                let loader = setup(transport.clone(), Some(2));

                loader.enter(1, "a", 0);
                loader.enter(2, "b", 0);
                loader.enter(3, "far", 400);
                loader.enter(4, "near", 100);
                loader.enter(5, "mid", 200);
                assert_eq!(loader.in_flight(), 2);
                assert_eq!(loader.queued(), 3);
                assert_eq!(loader.state(4).get(), LoadState::Queued);

                // A queued item leaving frees nothing and is never fetched.
                loader.leave(5);

                wait_ms(60).await;
                assert_eq!(transport.calls(), vec!["a", "b", "near", "far"]);
                wait_ms(60).await;
                assert!(matches!(loader.state(3).get(), LoadState::Loaded(_)));
                assert_eq!(loader.in_flight(), 0);
                assert_eq!(loader.counters().snapshot().canceled, 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_requeued_url_ignores_its_canceled_entry() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(50);
                let loader = setup(transport.clone(), Some(1));

                loader.enter(1, "a", 0);
                // Queued close to the viewport, then abandoned.
                loader.enter(2, "b", 0);
                loader.leave(2);
                loader.enter(3, "c", 100);
                loader.enter(2, "b", 900);
                assert_eq!(loader.queued(), 2);

                wait_ms(160).await;
                assert_eq!(transport.calls(), vec!["a", "c", "b"]);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_leave_after_release_still_cancels() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(100);
                let loader = setup(transport.clone(), Some(4));

                loader.enter(1, "u1", 0);
                wait_ms(10).await;
                loader.release(1);
                assert_eq!(loader.tracked_states(), 0);

                loader.leave(1);
                assert_eq!(loader.in_flight(), 0);
                assert_eq!(loader.counters().snapshot().canceled, 1);

                wait_ms(500).await;
                assert!(loader.cache().is_empty());
                assert_eq!(loader.counters().snapshot().fully_loaded, 0);
                assert_eq!(loader.tracked_states(), 0);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        LocalSet::new()
            .run_until(async {
                let transport = FakeTransport::new(100);
                let loader = setup(transport.clone(), Some(1));

                loader.enter(1, "a", 0);
                loader.enter(2, "b", 0);
                wait_ms(10).await;
                loader.shutdown();
                assert_eq!(loader.state(1).get(), LoadState::Idle);
                assert_eq!(loader.state(2).get(), LoadState::Idle);
                assert_eq!(loader.in_flight(), 0);

                wait_ms(1_000).await;
                assert!(loader.cache().is_empty());
                assert_eq!(transport.calls(), vec!["a"]);
                assert_eq!(loader.counters().snapshot().canceled, 2);

                // A shut down loader ignores new items.
                loader.enter(3, "c", 0);
                assert_eq!(loader.state(3).get(), LoadState::Idle);
            })
            .await;
    }
}
