//! Data Source
//!
//! The gallery consumes samples page by page through [`SampleSource`]. The
//! trait is `?Send`: sources run on the same local task set as the graph.
//!
//! [`InMemorySource`] pages over a fixed list and is what hosts without a
//! backend (and the tests) use.

mod sample_list;

use std::cell::{Cell, RefCell};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::{Sample, SamplePage};

pub use sample_list::{SampleList, fetch_all, validate_samples};

/// Paginated provider of samples.
#[async_trait(?Send)]
pub trait SampleSource {
    /// Up to `limit` samples starting at `offset`.
    async fn get_samples(&self, limit: usize, offset: usize) -> Result<SamplePage, SourceError>;
}

// =============================================================================
// InMemorySource
// =============================================================================

/// Source backed by a `Vec<Sample>`.
#[derive(Debug, Default)]
pub struct InMemorySource {
    samples: RefCell<Vec<Sample>>,
    latency: Option<Duration>,
    failing: Cell<bool>,
    requests: Cell<usize>,
}

impl InMemorySource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: RefCell::new(samples),
            ..Self::default()
        }
    }

    /// Delay every page by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Replace the backing list. Visible after the next refresh.
    pub fn set_samples(&self, samples: Vec<Sample>) {
        *self.samples.borrow_mut() = samples;
    }

    /// Make every request fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Pages served or refused so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

#[async_trait(?Send)]
impl SampleSource for InMemorySource {
    async fn get_samples(&self, limit: usize, offset: usize) -> Result<SamplePage, SourceError> {
        self.requests.set(self.requests.get() + 1);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.get() {
            return Err(SourceError::Request {
                limit,
                offset,
                message: "source unavailable".into(),
            });
        }

        let samples = self.samples.borrow();
        let total = samples.len();
        let start = offset.min(total);
        let end = offset.saturating_add(limit).min(total);
        Ok(SamplePage {
            samples: samples[start..end].to_vec(),
            total,
            has_more: offset.saturating_add(limit) < total,
        })
    }
}
