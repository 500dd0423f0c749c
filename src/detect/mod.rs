mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::{StubBackend, StubStep};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{
    extract_detections, non_max_suppression, Classification, DetectionResult, Observation,
};
