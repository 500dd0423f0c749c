//! Frame ingestion sources.
//!
//! - Local still images or a directory of stills (the bundled sample image case)
//! - Synthetic `stub://` stream (testing, demos)
//!
//! All sources produce `Frame` instances with a per-source monotonic sequence
//! number, pixel dimensions and orientation metadata. Camera pixel layouts are
//! normalized to RGB24 before a `Frame` is built.

pub mod file;
pub mod normalize;

pub use file::{FileConfig, FileSource, FileStats};
pub use normalize::PixelFormat;
