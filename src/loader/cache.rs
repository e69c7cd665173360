//! Resource Cache - Bounded LRU of fetched payloads keyed by URL.
//!
//! Bounded by entry count and total bytes. The least recently used entry is
//! evicted first; the entry being inserted is never evicted by its own insert,
//! so a single payload larger than the byte budget still gets cached alone.
//!
//! Every handle leaving the cache (eviction, `release`, `clear`) is passed to
//! the release hook, after the cache's own borrow is dropped.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::config::CacheConfig;

// =============================================================================
// ResourceHandle
// =============================================================================

/// Shared, immutable fetched payload.
///
/// Cloning is cheap. Two handles are equal when they share the same buffer.
#[derive(Clone)]
pub struct ResourceHandle {
    url: Rc<str>,
    bytes: Rc<[u8]>,
}

impl ResourceHandle {
    pub fn new(url: &str, bytes: Vec<u8>) -> Self {
        Self {
            url: Rc::from(url),
            bytes: Rc::from(bytes),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("url", &self.url)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// =============================================================================
// ResourceCache
// =============================================================================

type ReleaseHook = Rc<dyn Fn(&ResourceHandle)>;

struct Entry {
    handle: ResourceHandle,
    stamp: u64,
}

struct CacheState {
    entries: HashMap<String, Entry>,
    /// Use stamp → URL, oldest first.
    recency: BTreeMap<u64, String>,
    clock: u64,
    total_bytes: usize,
    limits: CacheConfig,
    on_release: Option<ReleaseHook>,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn touch(&mut self, url: &str) {
        let stamp = self.tick();
        if let Some(entry) = self.entries.get_mut(url) {
            self.recency.remove(&entry.stamp);
            entry.stamp = stamp;
            self.recency.insert(stamp, url.to_owned());
        }
    }

    fn remove(&mut self, url: &str) -> Option<ResourceHandle> {
        let entry = self.entries.remove(url)?;
        self.recency.remove(&entry.stamp);
        self.total_bytes -= entry.handle.len();
        Some(entry.handle)
    }

    fn over_budget(&self, incoming: usize) -> bool {
        self.entries.len() + 1 > self.limits.max_entries
            || self.total_bytes + incoming > self.limits.max_bytes
    }
}

/// Shared LRU cache. Clones refer to the same storage.
#[derive(Clone)]
pub struct ResourceCache {
    state: Rc<RefCell<CacheState>>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResourceCache {
    pub fn new(limits: CacheConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(CacheState {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                clock: 0,
                total_bytes: 0,
                limits,
                on_release: None,
            })),
        }
    }

    /// Install the hook called for every handle leaving the cache.
    pub fn set_release_hook(&self, hook: impl Fn(&ResourceHandle) + 'static) {
        self.state.borrow_mut().on_release = Some(Rc::new(hook));
    }

    /// Cached handle for `url`, marking it most recently used.
    pub fn get(&self, url: &str) -> Option<ResourceHandle> {
        let mut state = self.state.borrow_mut();
        let handle = state.entries.get(url)?.handle.clone();
        state.touch(url);
        Some(handle)
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, url: &str) -> bool {
        self.state.borrow().entries.contains_key(url)
    }

    /// Insert (or replace) the handle for its URL, evicting as needed.
    pub fn insert(&self, handle: ResourceHandle) {
        let (released, hook) = {
            let mut state = self.state.borrow_mut();
            let mut released: Vec<ResourceHandle> = state.remove(handle.url()).into_iter().collect();

            while !state.entries.is_empty() && state.over_budget(handle.len()) {
                let Some((_, oldest)) = state.recency.pop_first() else {
                    break;
                };
                if let Some(entry) = state.entries.remove(&oldest) {
                    state.total_bytes -= entry.handle.len();
                    trace!(url = %oldest, bytes = entry.handle.len(), "cache eviction");
                    released.push(entry.handle);
                }
            }

            let stamp = state.tick();
            let url = handle.url().to_owned();
            state.total_bytes += handle.len();
            state.recency.insert(stamp, url.clone());
            state.entries.insert(url, Entry { handle, stamp });
            (released, state.on_release.clone())
        };
        notify_release(hook, &released);
    }

    /// Remove `url`, passing its handle to the release hook.
    pub fn release(&self, url: &str) -> Option<ResourceHandle> {
        let (handle, hook) = {
            let mut state = self.state.borrow_mut();
            (state.remove(url), state.on_release.clone())
        };
        if let Some(handle) = &handle {
            notify_release(hook, std::slice::from_ref(handle));
        }
        handle
    }

    pub fn clear(&self) {
        let (released, hook) = {
            let mut state = self.state.borrow_mut();
            state.recency.clear();
            state.total_bytes = 0;
            let released: Vec<ResourceHandle> =
                state.entries.drain().map(|(_, entry)| entry.handle).collect();
            (released, state.on_release.clone())
        };
        notify_release(hook, &released);
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.state.borrow().total_bytes
    }

    /// URLs from least to most recently used.
    pub fn urls_by_recency(&self) -> Vec<String> {
        self.state.borrow().recency.values().cloned().collect()
    }
}

fn notify_release(hook: Option<ReleaseHook>, released: &[ResourceHandle]) {
    if let Some(hook) = hook {
        for handle in released {
            hook(handle);
        }
    }
}
