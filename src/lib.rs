//! Drone overlay engine
//!
//! Runs frames through an object detector and turns the detections into
//! outlined rectangles on a display surface.
//!
//! # Module Structure
//!
//! - `geometry`: normalized/pixel rectangles and the `scale` step between them
//! - `frame`: RGB frames with orientation metadata
//! - `ingest`: frame sources (still images, synthetic stream)
//! - `detect`: detector backends, typed extraction, suppression
//! - `overlay`: overlay layer (clear-before-add) and rasterization
//! - `pipeline`: background detection worker and display loop
//! - `still`: one-shot annotation of a single image
//! - `config`: file + environment configuration
//! - `ui`: stage reporting for the binaries

pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod still;
pub mod ui;

pub use detect::{
    BackendRegistry, DetectionCapability, DetectionResult, DetectorBackend, Observation,
    StubBackend,
};
pub use frame::{Frame, Orientation};
pub use geometry::{scale, ClampPolicy, NormalizedRect, Origin, PixelRect, Size};
pub use ingest::{FileConfig, FileSource, PixelFormat};
pub use overlay::{compose, Color, OverlayElement, OverlayLayer, StrokeStyle};
pub use pipeline::{DetectionBatch, DetectionWorker, DisplayLoop, SubmitOutcome, WorkerOptions};
pub use still::{annotate_still, Annotated};
