use anyhow::Result;

use crate::detect::result::Observation;
use crate::frame::Frame;
use crate::geometry::Origin;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    ObjectDetection,
    Classification,
}

/// Detector backend trait.
///
/// Backends are the inference collaborator: they own the model and runtime
/// and report raw observations. Typed extraction happens in the registry.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a frame. Boxes are relative to the upright frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Observation>>;

    /// Origin convention of the boxes this backend reports.
    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
