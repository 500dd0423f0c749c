//! Local file frame source.
//!
//! `FileSource` reads frames from a local still image, a directory of stills,
//! or a synthetic `stub://` stream. Remote URLs are rejected.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, Orientation};
use crate::ingest::normalize::packed_len;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Largest synthetic frame side accepted.
pub const MAX_SYNTHETIC_DIMENSION: u32 = 16_384;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image file, directory of images, or `stub://name`.
    pub path: String,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
    /// Orientation stamped on every produced frame.
    pub orientation: Orientation,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "stub://camera".to_string(),
            width: 640,
            height: 480,
            orientation: Orientation::Up,
        }
    }
}

/// Local frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Images(ImageSequenceSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths or stub:// (got '{}')",
                config.path
            ));
        }
        if config.path.starts_with("stub://") {
            if config.width == 0 || config.height == 0 {
                return Err(anyhow!("synthetic frame size must be non-zero"));
            }
            if config.width > MAX_SYNTHETIC_DIMENSION || config.height > MAX_SYNTHETIC_DIMENSION {
                return Err(anyhow!(
                    "synthetic frame size {}x{} exceeds {} pixels per side",
                    config.width,
                    config.height,
                    MAX_SYNTHETIC_DIMENSION
                ));
            }
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(config)),
            })
        } else {
            Ok(Self {
                backend: FileBackend::Images(ImageSequenceSource::new(config)?),
            })
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            FileBackend::Images(source) => source.connect(),
        }
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Images(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            FileBackend::Images(source) => source.last_error.is_none(),
        }
    }

    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => FileStats {
                frames_captured: source.frame_count,
                path: source.config.path.clone(),
            },
            FileBackend::Images(source) => FileStats {
                frames_captured: source.frame_count,
                path: source.config.path.clone(),
            },
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Still images
// ----------------------------------------------------------------------------

struct ImageSequenceSource {
    config: FileConfig,
    files: Vec<PathBuf>,
    /// Next file to read. Advances past undecodable files too.
    cursor: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageSequenceSource {
    fn new(config: FileConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        let files = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        Ok(Self {
            config,
            files,
            cursor: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        for file in &self.files {
            if !file.is_file() {
                return Err(anyhow!("image {} does not exist", file.display()));
            }
        }
        log::info!(
            "FileSource: {} image(s) from {}",
            self.files.len(),
            self.config.path
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let file = self.files[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.files.len();
        let decoded = image::open(&file)
            .with_context(|| format!("decode image {}", file.display()))
            .and_then(|img| {
                Frame::from_image(self.frame_count, self.config.orientation, img.into_rgb8())
            });
        match decoded {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_error = None;
                Ok(frame)
            }
            Err(e) => {
                self.last_error = Some(format!("{:#}", e));
                Err(e)
            }
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: FileConfig,
    frame_count: u64,
}

impl SyntheticSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let pixels = self.generate_synthetic_pixels()?;
        let frame = Frame::from_rgb(
            self.frame_count,
            self.config.width,
            self.config.height,
            self.config.orientation,
            pixels,
        )?;
        self.frame_count += 1;
        Ok(frame)
    }

    /// Diagonal gradient that shifts one step per frame.
    fn generate_synthetic_pixels(&self) -> Result<Vec<u8>> {
        let width = self.config.width as u64;
        let len = packed_len(self.config.width, self.config.height, 3)?;
        let mut pixels = Vec::with_capacity(len);
        for i in 0..(len / 3) as u64 {
            let (x, y) = (i % width, i / width);
            let v = ((x + y + self.frame_count) % 256) as u8;
            pixels.extend_from_slice(&[v / 2, v, 255 - v]);
        }
        Ok(pixels)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
