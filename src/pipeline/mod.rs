//! Detection pipeline.
//!
//! Capture → `FrameSubmitter` → `DetectionWorker` thread → batch channel →
//! `DisplayLoop` on the display thread. Capture and inference run
//! concurrently; everything that touches the overlay is serialized on the
//! display thread, and only the most recent result is shown.

mod display;
mod worker;

pub use display::DisplayLoop;
pub use worker::{
    DetectionBatch, DetectionWorker, FrameSubmitter, SubmitOutcome, WorkerHandle, WorkerOptions,
    WorkerStats,
};
