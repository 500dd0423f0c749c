use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::{NormalizedRect, Origin};

/// One detected object in one frame. Box is normalized with a top-left origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
}

/// A label with its confidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub identifier: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(identifier: impl Into<String>, confidence: f32) -> Self {
        Self {
            identifier: identifier.into(),
            confidence,
        }
    }
}

/// Raw backend output before typed extraction.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    /// Localized object with candidate labels.
    RecognizedObject {
        labels: Vec<Classification>,
        bounding_box: NormalizedRect,
    },
    /// Whole-image classification without a box.
    Classification(Classification),
    /// Anything else a backend may report (feature prints, saliency, ...).
    Other { kind: String },
}

impl Observation {
    pub fn object(label: impl Into<String>, confidence: f32, bounding_box: NormalizedRect) -> Self {
        Observation::RecognizedObject {
            labels: vec![Classification::new(label, confidence)],
            bounding_box,
        }
    }
}

/// Pull typed detections out of a heterogeneous observation list.
///
/// Only recognized objects are kept. Each yields its best label and a box
/// converted to top-left origin. Non-finite values, confidences outside
/// [0, 1] and objects without labels are rejected; box range is left alone.
pub fn extract_detections(
    observations: &[Observation],
    origin: Origin,
) -> Result<Vec<DetectionResult>> {
    let mut out = Vec::new();
    for (index, observation) in observations.iter().enumerate() {
        let Observation::RecognizedObject {
            labels,
            bounding_box,
        } = observation
        else {
            continue;
        };
        let best = labels
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .ok_or_else(|| anyhow!("observation {} has no labels", index))?;
        if !best.confidence.is_finite() || !(0.0..=1.0).contains(&best.confidence) {
            return Err(anyhow!(
                "observation {} confidence {} outside [0, 1]",
                index,
                best.confidence
            ));
        }
        if !bounding_box.is_finite() {
            return Err(anyhow!(
                "observation {} has a non-finite bounding box",
                index
            ));
        }
        out.push(DetectionResult {
            label: best.identifier.clone(),
            confidence: best.confidence,
            bounding_box: bounding_box.to_top_left(origin),
        });
    }
    Ok(out)
}

/// Greedy per-label non-maximum suppression.
///
/// Detections are visited in descending confidence; a detection is dropped
/// when it overlaps an already kept detection of the same label by more
/// than `iou_threshold`.
pub fn non_max_suppression(
    mut detections: Vec<DetectionResult>,
    iou_threshold: f32,
) -> Vec<DetectionResult> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<DetectionResult> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.label == candidate.label
                && k.bounding_box.iou(&candidate.bounding_box) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
