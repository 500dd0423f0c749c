#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{Classification, Observation};
use crate::frame::Frame;
use crate::geometry::{NormalizedRect, Origin};

/// Tract-based backend for ONNX object detectors.
///
/// The model takes a `1x3xNxN` f32 RGB tensor in 0..1 and produces rows of
/// `[cx, cy, w, h, score_0 .. score_k]` in input pixel units. The upright
/// frame is scale-filled to the input size, so boxes map straight back to
/// normalized frame coordinates.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
    origin: Origin,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("tract backend needs at least one label"));
        }
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels,
            confidence_threshold: 0.5,
            origin: Origin::TopLeft,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Declare the origin convention of the model's boxes.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let upright = frame.upright();
        let resized = imageops::resize(
            &upright,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let side = self.input_size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Observation>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let row_len = *shape.last().ok_or_else(|| anyhow!("model output is a scalar"))?;
        if row_len < 5 {
            return Err(anyhow!("model rows have {} values, need at least 5", row_len));
        }
        let classes = row_len - 4;
        let flat: Vec<f32> = view.iter().copied().collect();
        let side = self.input_size as f32;

        let mut observations = Vec::new();
        for row in flat.chunks_exact(row_len) {
            let mut labels: Vec<Classification> = row[4..]
                .iter()
                .enumerate()
                .filter(|(_, score)| **score >= self.confidence_threshold)
                .map(|(class, score)| Classification::new(self.label_for(class), *score))
                .collect();
            if labels.is_empty() {
                continue;
            }
            labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            observations.push(Observation::RecognizedObject {
                labels,
                bounding_box: NormalizedRect::new(
                    (cx - w / 2.0) / side,
                    (cy - h / 2.0) / side,
                    w / side,
                    h / side,
                ),
            });
        }
        log::debug!(
            "tract: {} candidate(s) above {:.2} from {} class(es)",
            observations.len(),
            self.confidence_threshold,
            classes
        );
        Ok(observations)
    }

    fn label_for(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::ObjectDetection)
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Observation>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }
}
