//! Core types for spark-gallery.
//!
//! Samples, annotation labels, visibility flags and the confidence threshold.
//! These are plain values: they live inside signals and derived nodes, so
//! they are all `Clone + PartialEq`.

use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;

// =============================================================================
// Samples
// =============================================================================

/// Stable sample identifier, unique within one resolved sample list.
pub type SampleId = u64;

/// Which overlay a label renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Prediction,
    GroundTruth,
    Confidence,
}

/// Box in percent of the image: `x`, `y`, `width`, `height` each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// All four values lie within `[0, 100]`.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| (0.0..=100.0).contains(v))
    }
}

/// Annotation attached to a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub kind: LabelKind,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(rename = "label")]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Label {
    pub fn new(kind: LabelKind, bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            kind,
            bbox,
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// One image in the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Sample {
    pub fn new(id: SampleId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Confidence of the first label; this is what the sample-level filter uses.
    pub fn primary_confidence(&self) -> Option<f64> {
        self.labels.first().and_then(|label| label.confidence)
    }
}

/// One page returned by a [`SampleSource`](crate::source::SampleSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePage {
    pub samples: Vec<Sample>,
    pub total: usize,
    pub has_more: bool,
}

// =============================================================================
// Visibility Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Overlay kinds currently shown.
    ///
    /// Combine with bitwise OR: `VisibilityFlags::PREDICTION | VisibilityFlags::CONFIDENCE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VisibilityFlags: u8 {
        const PREDICTION = 1 << 0;
        const GROUND_TRUTH = 1 << 1;
        const CONFIDENCE = 1 << 2;
    }
}

impl VisibilityFlags {
    /// Flag controlling labels of `kind`.
    pub fn for_kind(kind: LabelKind) -> Self {
        match kind {
            LabelKind::Prediction => Self::PREDICTION,
            LabelKind::GroundTruth => Self::GROUND_TRUTH,
            LabelKind::Confidence => Self::CONFIDENCE,
        }
    }

    pub fn shows(&self, kind: LabelKind) -> bool {
        self.contains(Self::for_kind(kind))
    }
}

// =============================================================================
// Confidence Threshold
// =============================================================================

/// Inclusive confidence window `[low, high]` within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThreshold")]
pub struct ConfidenceThreshold {
    low: f64,
    high: f64,
}

#[derive(Deserialize)]
struct RawThreshold {
    low: f64,
    high: f64,
}

impl TryFrom<RawThreshold> for ConfidenceThreshold {
    type Error = ThresholdError;

    fn try_from(raw: RawThreshold) -> Result<Self, Self::Error> {
        Self::new(raw.low, raw.high)
    }
}

impl ConfidenceThreshold {
    pub fn new(low: f64, high: f64) -> Result<Self, ThresholdError> {
        for bound in [low, high] {
            if !(0.0..=1.0).contains(&bound) {
                return Err(ThresholdError::OutOfRange(bound));
            }
        }
        if low > high {
            return Err(ThresholdError::Inverted { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// `low <= confidence <= high`.
    pub fn contains(&self, confidence: f64) -> bool {
        confidence >= self.low && confidence <= self.high
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self { low: 0.0, high: 1.0 }
    }
}
