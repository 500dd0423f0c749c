use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::geometry::{scale, ClampPolicy, Size};
use crate::overlay::{OverlayElement, OverlayLayer, StrokeStyle};

use super::worker::DetectionBatch;

/// Display-side consumer of detection batches.
///
/// Owns the overlay layer, so it lives on (and stays on) the display thread.
/// Only the newest batch is ever rendered; older ones are counted as stale.
#[derive(Debug)]
pub struct DisplayLoop {
    layer: OverlayLayer,
    surface: Size,
    style: StrokeStyle,
    clamp: ClampPolicy,
    last_seq: Option<u64>,
    rendered: u64,
    stale: u64,
    aspect_mismatches: u64,
}

/// Relative aspect-ratio difference tolerated between frame and surface.
const ASPECT_TOLERANCE: f32 = 0.01;

impl DisplayLoop {
    pub fn new(surface: Size, style: StrokeStyle, clamp: ClampPolicy) -> Self {
        Self {
            layer: OverlayLayer::new(),
            surface,
            style,
            clamp,
            last_seq: None,
            rendered: 0,
            stale: 0,
            aspect_mismatches: 0,
        }
    }

    pub fn layer(&self) -> &OverlayLayer {
        &self.layer
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    /// Change the destination surface. Takes effect with the next batch.
    pub fn resize(&mut self, surface: Size) {
        self.surface = surface;
    }

    pub fn rendered_batches(&self) -> u64 {
        self.rendered
    }

    pub fn stale_batches(&self) -> u64 {
        self.stale
    }

    /// Rendered batches whose frame shape did not match the surface.
    pub fn aspect_mismatches(&self) -> u64 {
        self.aspect_mismatches
    }

    pub fn last_frame_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn clear(&mut self) {
        self.layer.clear();
    }

    /// Render a batch unless it is older than what is already on screen.
    pub fn apply(&mut self, batch: DetectionBatch) -> bool {
        if self.last_seq.is_some_and(|last| batch.frame_seq < last) {
            self.stale += 1;
            log::trace!("ignoring stale batch for frame {}", batch.frame_seq);
            return false;
        }
        if !self.matches_surface(batch.frame_size) {
            self.aspect_mismatches += 1;
            if self.aspect_mismatches == 1 {
                log::warn!(
                    "frame {}x{} does not match display surface {}x{}; boxes will be stretched",
                    batch.frame_size.0,
                    batch.frame_size.1,
                    self.surface.width,
                    self.surface.height
                );
            }
        }
        let elements = batch
            .detections
            .into_iter()
            .map(|det| OverlayElement {
                rect: scale(self.clamp.apply(det.bounding_box), self.surface),
                label: Some(det.label),
                confidence: Some(det.confidence),
                style: self.style,
            })
            .collect();
        self.layer.replace(elements);
        self.last_seq = Some(batch.frame_seq);
        self.rendered += 1;
        true
    }

    fn matches_surface(&self, (width, height): (u32, u32)) -> bool {
        if width == 0 || height == 0 {
            return true;
        }
        let frame_aspect = width as f32 / height as f32;
        let surface_aspect = self.surface.width / self.surface.height;
        ((frame_aspect - surface_aspect) / surface_aspect).abs() <= ASPECT_TOLERANCE
    }

    /// Drain pending batches without blocking and render only the newest.
    pub fn pump(&mut self, rx: &Receiver<DetectionBatch>) -> bool {
        let mut latest: Option<DetectionBatch> = None;
        loop {
            match rx.try_recv() {
                Ok(batch) => {
                    if let Some(prev) = latest.take() {
                        if prev.frame_seq > batch.frame_seq {
                            self.stale += 1;
                            latest = Some(prev);
                            continue;
                        }
                        self.stale += 1;
                    }
                    latest = Some(batch);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        match latest {
            Some(batch) => self.apply(batch),
            None => false,
        }
    }

    /// Block until at least one batch arrives, then render the newest pending one.
    pub fn wait(&mut self, rx: &Receiver<DetectionBatch>, timeout: Duration) -> Result<bool> {
        let first = match rx.recv_timeout(timeout) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => return Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("detection worker disconnected"))
            }
        };
        let changed = self.apply(first);
        Ok(self.pump(rx) || changed)
    }
}
