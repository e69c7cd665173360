//! Sample List - The resolved sample list as an async derived node.
//!
//! A refresh trigger signal feeds an async derivation that walks every page
//! of the source and validates the result. Downstream code reads
//! [`SampleList::resolved`], which only ever holds a complete, validated list:
//! while a refresh is in flight it keeps the previous list, and a failed
//! refresh keeps the last good one.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::error::{GraphError, SourceError};
use crate::signals::{AsyncDerived, Derived, Loadable, Signal, async_derived, derived, signal};
use crate::types::Sample;

use super::SampleSource;

/// Fetch every page of `source`, `page_size` samples at a time.
pub async fn fetch_all(
    source: &dyn SampleSource,
    page_size: usize,
) -> Result<Vec<Sample>, SourceError> {
    let mut samples = Vec::new();
    loop {
        let offset = samples.len();
        let page = source.get_samples(page_size, offset).await?;
        debug!(offset, received = page.samples.len(), total = page.total, "sample page");
        if page.samples.is_empty() && page.has_more {
            return Err(SourceError::InvalidPage {
                offset,
                message: "empty page reports more samples".into(),
            });
        }
        samples.extend(page.samples);
        if !page.has_more {
            return Ok(samples);
        }
    }
}

/// Reject duplicate ids and boxes outside `[0, 100]`.
pub fn validate_samples(samples: &[Sample]) -> Result<(), GraphError> {
    let mut ids = HashSet::with_capacity(samples.len());
    for sample in samples {
        if !ids.insert(sample.id) {
            return Err(GraphError::InvalidData(format!(
                "duplicate sample id {}",
                sample.id
            )));
        }
        if let Some(label) = sample.labels.iter().find(|l| !l.bbox.is_valid()) {
            return Err(GraphError::InvalidData(format!(
                "sample {} has an out-of-range box {:?}",
                sample.id, label.bbox
            )));
        }
    }
    Ok(())
}

/// Refreshable, validated list of every sample the source serves.
#[derive(Clone)]
pub struct SampleList {
    trigger: Signal<u64>,
    status: AsyncDerived<Rc<Vec<Sample>>>,
    resolved: Derived<Rc<Vec<Sample>>>,
}

impl SampleList {
    /// Nothing is fetched until the list is first read, which must happen
    /// inside a `LocalSet`.
    pub fn new(source: Rc<dyn SampleSource>, page_size: usize) -> Self {
        let trigger = signal(0u64);

        let refresh = trigger.clone();
        let status = async_derived(move |cx| {
            let generation = cx.get(&refresh);
            let source = source.clone();
            async move {
                let samples = fetch_all(source.as_ref(), page_size).await?;
                validate_samples(&samples)?;
                info!(generation, count = samples.len(), "sample list resolved");
                Ok(Rc::new(samples))
            }
        });

        let list = status.clone();
        let resolved = derived(move |cx| match cx.get(&list) {
            Loadable::Ready(samples) => Ok(samples),
            Loadable::Pending { previous } => Ok(previous.unwrap_or_default()),
            Loadable::Failed(err) => match list.latest() {
                Some(samples) => {
                    warn!(error = %err, "sample refresh failed, keeping previous list");
                    Ok(samples)
                }
                None => Err(err),
            },
        });

        Self {
            trigger,
            status,
            resolved,
        }
    }

    /// Re-run the derivation against the source.
    pub fn refresh(&self) {
        self.trigger.update(|n| n + 1);
    }

    /// Full lifecycle of the latest fetch.
    pub fn status(&self) -> AsyncDerived<Rc<Vec<Sample>>> {
        self.status.clone()
    }

    /// Latest complete list (empty before the first resolution).
    pub fn resolved(&self) -> Derived<Rc<Vec<Sample>>> {
        self.resolved.clone()
    }

    /// Wait for the fetch in flight (if any) to settle.
    pub async fn resolve(&self) -> Result<Rc<Vec<Sample>>, GraphError> {
        self.status.resolve().await
    }
}
