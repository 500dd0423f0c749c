use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::Observation;
use crate::frame::Frame;
use crate::geometry::{NormalizedRect, Origin};

/// One scripted response.
#[derive(Clone, Debug)]
pub enum StubStep {
    Observations(Vec<Observation>),
    Fail(String),
}

/// Stub backend for tests and demos.
///
/// By default it reports a single `drone` that drifts left to right with the
/// frame sequence. In scripted mode it replays the given steps in order and
/// then keeps repeating the last one.
pub struct StubBackend {
    script: Vec<StubStep>,
    cursor: usize,
    latency: Option<Duration>,
    origin: Origin,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            cursor: 0,
            latency: None,
            origin: Origin::TopLeft,
        }
    }

    pub fn scripted(steps: Vec<StubStep>) -> Self {
        Self {
            script: steps,
            ..Self::new()
        }
    }

    /// Simulate inference time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report boxes in the given origin convention.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    fn drifting_drone(seq: u64) -> Observation {
        let x = (seq % 36) as f32 * 0.02;
        Observation::object("drone", 0.92, NormalizedRect::new(x, 0.3, 0.25, 0.2))
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::ObjectDetection)
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Observation>> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.script.is_empty() {
            return Ok(vec![Self::drifting_drone(frame.seq())]);
        }
        let index = self.cursor.min(self.script.len() - 1);
        self.cursor = self.cursor.saturating_add(1);
        match &self.script[index] {
            StubStep::Observations(observations) => Ok(observations.clone()),
            StubStep::Fail(reason) => Err(anyhow!("stub inference failed: {}", reason)),
        }
    }
}
