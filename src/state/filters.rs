//! Filter Selectors
//!
//! Derived views over the resolved sample list:
//!
//! - `filtered_samples` - samples whose primary confidence lies inside the
//!   threshold window (samples without a confidence always pass)
//! - `overlays` - per-sample overlay list given the visibility flags and the
//!   threshold, as a derived family keyed by sample id
//!
//! Both are ordinary derived nodes, so flipping a visibility flag recomputes
//! the overlays that are alive but only notifies those whose output changed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ThresholdError;
use crate::signals::{Derived, DerivedFamily, Signal, derived, derived_family, signal};
use crate::types::{
    BoundingBox, ConfidenceThreshold, Label, LabelKind, Sample, SampleId, VisibilityFlags,
};

// =============================================================================
// Overlay
// =============================================================================

/// Something the rendering layer draws on top of an image.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Outlined box with its caption.
    Box {
        kind: LabelKind,
        bbox: BoundingBox,
        text: String,
    },
    /// Confidence badge (formatted with three decimals by the renderer).
    Confidence { value: f64 },
}

/// Overlays for `labels` under the given flags and threshold.
///
/// A label whose confidence falls outside the threshold is suppressed
/// entirely. Boxes follow their kind's flag; badges follow `CONFIDENCE`.
pub fn compute_overlays(
    labels: &[Label],
    flags: VisibilityFlags,
    threshold: ConfidenceThreshold,
) -> Vec<Overlay> {
    let mut overlays = Vec::new();
    for label in labels {
        if label.confidence.is_some_and(|c| !threshold.contains(c)) {
            continue;
        }
        if flags.shows(label.kind) {
            overlays.push(Overlay::Box {
                kind: label.kind,
                bbox: label.bbox,
                text: label.text.clone(),
            });
        }
        if flags.contains(VisibilityFlags::CONFIDENCE) {
            if let Some(value) = label.confidence {
                overlays.push(Overlay::Confidence { value });
            }
        }
    }
    overlays
}

/// Whether a sample passes the threshold. Only the first label counts.
pub fn passes_threshold(sample: &Sample, threshold: ConfidenceThreshold) -> bool {
    sample
        .primary_confidence()
        .is_none_or(|c| threshold.contains(c))
}

// =============================================================================
// FilterState
// =============================================================================

/// Visibility flags and confidence threshold signals plus their selectors.
#[derive(Clone)]
pub struct FilterState {
    visibility: Signal<VisibilityFlags>,
    threshold: Signal<ConfidenceThreshold>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(VisibilityFlags::empty(), ConfidenceThreshold::default())
    }
}

impl FilterState {
    pub fn new(visibility: VisibilityFlags, threshold: ConfidenceThreshold) -> Self {
        Self {
            visibility: signal(visibility),
            threshold: signal(threshold),
        }
    }

    pub fn visibility(&self) -> Signal<VisibilityFlags> {
        self.visibility.clone()
    }

    pub fn threshold(&self) -> Signal<ConfidenceThreshold> {
        self.threshold.clone()
    }

    /// Flip one or more visibility flags.
    pub fn toggle_visibility(&self, flags: VisibilityFlags) {
        self.visibility.update(|current| *current ^ flags);
    }

    pub fn set_visible(&self, flags: VisibilityFlags, visible: bool) {
        self.visibility.update(|current| {
            let mut next = *current;
            next.set(flags, visible);
            next
        });
    }

    /// Replace the threshold window. Invalid bounds leave it untouched.
    pub fn set_threshold(&self, low: f64, high: f64) -> Result<(), ThresholdError> {
        self.threshold.set(ConfidenceThreshold::new(low, high)?);
        Ok(())
    }

    /// Samples passing the threshold, in source order.
    pub fn filtered_samples(&self, samples: &Derived<Rc<Vec<Sample>>>) -> Derived<Rc<Vec<Sample>>> {
        let samples = samples.clone();
        let threshold = self.threshold.clone();
        derived(move |cx| {
            let threshold = cx.get(&threshold);
            let samples = cx.get(&samples)?;
            Ok(Rc::new(
                samples
                    .iter()
                    .filter(|s| passes_threshold(s, threshold))
                    .cloned()
                    .collect(),
            ))
        })
    }

    /// Overlay lists keyed by sample id.
    ///
    /// An id missing from the list yields no overlays.
    pub fn overlays(
        &self,
        samples: &Derived<Rc<Vec<Sample>>>,
    ) -> DerivedFamily<SampleId, Vec<Overlay>> {
        let index_source = samples.clone();
        let by_id = derived(move |cx| {
            let samples = cx.get(&index_source)?;
            Ok(Rc::new(
                samples
                    .iter()
                    .enumerate()
                    .map(|(position, s)| (s.id, position))
                    .collect::<HashMap<SampleId, usize>>(),
            ))
        });
        let list = samples.clone();
        let visibility = self.visibility.clone();
        let threshold = self.threshold.clone();
        derived_family(move |id: &SampleId, cx| {
            let flags = cx.get(&visibility);
            let threshold = cx.get(&threshold);
            let index = cx.get(&by_id)?;
            let list = cx.get(&list)?;
            Ok(index
                .get(id)
                .and_then(|&position| list.get(position))
                .map(|sample| compute_overlays(&sample.labels, flags, threshold))
                .unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::signal;
    use std::cell::Cell;

    fn labelled(id: SampleId, confidence: f64) -> Sample {
        Sample::new(id, format!("https://img/{id}"))
            .with_label(
                Label::new(LabelKind::Prediction, BoundingBox::new(10.0, 10.0, 50.0, 50.0), "car")
                    .with_confidence(confidence),
            )
            .with_label(
                Label::new(LabelKind::GroundTruth, BoundingBox::new(5.0, 5.0, 45.0, 45.0), "car")
                    .with_confidence(0.99),
            )
    }

    fn list(samples: Vec<Sample>) -> (Signal<Rc<Vec<Sample>>>, Derived<Rc<Vec<Sample>>>) {
        let source = signal(Rc::new(samples));
        let source2 = source.clone();
        let resolved = derived(move |cx| Ok(cx.get(&source2)));
        (source, resolved)
    }

    fn ids(samples: &[Sample]) -> Vec<SampleId> {
        samples.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_threshold_filter_is_inclusive() {
        let (_source, resolved) = list(vec![
            labelled(1, 0.15),
            labelled(2, 0.5),
            labelled(3, 0.2),
            labelled(4, 0.8),
            Sample::new(5, "https://img/5"),
        ]);
        let filters = FilterState::default();
        let filtered = filters.filtered_samples(&resolved);
        assert_eq!(filtered.get().map(|s| s.len()), Ok(5));

        filters.set_threshold(0.2, 0.8).unwrap();
        assert_eq!(ids(&filtered.get().unwrap()), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let filters = FilterState::default();
        assert!(filters.set_threshold(0.7, 0.3).is_err());
        assert_eq!(filters.threshold().get(), ConfidenceThreshold::default());
    }

    #[test]
    fn test_filter_follows_source_updates() {
        let (source, resolved) = list(vec![labelled(1, 0.5)]);
        let filters = FilterState::new(
            VisibilityFlags::empty(),
            ConfidenceThreshold::new(0.4, 0.6).unwrap(),
        );
        let filtered = filters.filtered_samples(&resolved);
        assert_eq!(ids(&filtered.get().unwrap()), vec![1]);

        source.set(Rc::new(vec![labelled(1, 0.5), labelled(2, 0.9), labelled(3, 0.41)]));
        assert_eq!(ids(&filtered.get().unwrap()), vec![1, 3]);
    }

    #[test]
    fn test_compute_overlays() {
        let sample = labelled(1, 0.5);
        let none = compute_overlays(&sample.labels, VisibilityFlags::empty(), ConfidenceThreshold::default());
        assert!(none.is_empty());

        let boxes = compute_overlays(
            &sample.labels,
            VisibilityFlags::PREDICTION,
            ConfidenceThreshold::default(),
        );
        assert_eq!(boxes.len(), 1);
        assert!(matches!(boxes[0], Overlay::Box { kind: LabelKind::Prediction, .. }));

        let all = compute_overlays(&sample.labels, VisibilityFlags::all(), ConfidenceThreshold::default());
        assert_eq!(
            all.iter().filter(|o| matches!(o, Overlay::Confidence { .. })).count(),
            2
        );

        let narrow = ConfidenceThreshold::new(0.0, 0.6).unwrap();
        let clipped = compute_overlays(&sample.labels, VisibilityFlags::all(), narrow);
        assert_eq!(
            clipped,
            vec![
                Overlay::Box {
                    kind: LabelKind::Prediction,
                    bbox: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
                    text: "car".into(),
                },
                Overlay::Confidence { value: 0.5 },
            ]
        );
    }

    #[test]
    fn test_visibility_toggle_rerenders_overlays() {
        let (_source, resolved) = list(vec![labelled(1, 0.5), labelled(2, 0.3)]);
        let filters = FilterState::default();
        let overlays = filters.overlays(&resolved);

        let first = overlays.get(&1);
        let hits = Rc::new(Cell::new(0));
        let hits2 = hits.clone();
        let _unsub = first.subscribe(move |_| hits2.set(hits2.get() + 1));
        assert_eq!(first.get(), Ok(vec![]));

        filters.toggle_visibility(VisibilityFlags::GROUND_TRUTH);
        assert_eq!(hits.get(), 1);
        assert_eq!(first.get().unwrap().len(), 1);

        // Raising the threshold does not affect sample 1's labels (0.5, 0.99).
        filters.set_threshold(0.4, 1.0).unwrap();
        assert_eq!(hits.get(), 1);

        filters.set_visible(VisibilityFlags::GROUND_TRUTH, false);
        assert_eq!(first.get(), Ok(vec![]));
        assert_eq!(hits.get(), 2);

        assert_eq!(overlays.get(&404).get(), Ok(vec![]));
    }
}
