//! Still-image mode: detect once, outline every detection, compose.

use anyhow::Result;
use image::RgbaImage;

use crate::detect::{BackendRegistry, DetectionCapability, DetectionResult};
use crate::frame::Frame;
use crate::geometry::ClampPolicy;
use crate::overlay::{compose, OverlayElement, StrokeStyle};
use crate::pipeline::{DetectionBatch, DisplayLoop};

/// Output of `annotate_still`.
pub struct Annotated {
    pub detections: Vec<DetectionResult>,
    pub elements: Vec<OverlayElement>,
    pub image: RgbaImage,
}

/// Run detection on a single frame and burn the outlines into the upright image.
///
/// Boxes are scaled against the upright image size, so the outlines line up
/// with what a viewer sees regardless of the capture orientation.
pub fn annotate_still(
    registry: &BackendRegistry,
    frame: &Frame,
    nms_threshold: f32,
    style: StrokeStyle,
    clamp: ClampPolicy,
) -> Result<Annotated> {
    let detections =
        registry.detect_with_capability(DetectionCapability::ObjectDetection, frame, nms_threshold)?;
    log::info!(
        "frame {}: {} detection(s)",
        frame.seq(),
        detections.len()
    );
    for det in &detections {
        log::debug!(
            "{} {:.2} {:?}",
            det.label,
            det.confidence,
            det.bounding_box
        );
    }

    let mut display = DisplayLoop::new(frame.display_surface()?, style, clamp);
    display.apply(DetectionBatch {
        frame_seq: frame.seq(),
        frame_size: frame.display_size(),
        detections: detections.clone(),
    });
    let image = compose(&frame.upright(), display.layer());
    Ok(Annotated {
        detections,
        elements: display.layer().elements().to_vec(),
        image,
    })
}
