//! Local file frame source.
//!
//! `FileSource` reads still images from a single file or from a directory
//! (files with a known image extension, sorted by name). `stub://` paths select
//! the synthetic board generator instead.
//!
//! The file source MUST NOT fetch remote URLs.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::synthetic::SyntheticBoard;
use super::FrameSource;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image file, image directory, or `stub://name`.
    pub path: String,
    /// Frame width for synthetic sources.
    pub width: u32,
    /// Frame height for synthetic sources.
    pub height: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            width: 640,
            height: 480,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticBoard),
    Images(ImageSequence),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): {}",
                config.path
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            log::info!("FileSource: {} (synthetic)", config.path);
            FileBackend::Synthetic(SyntheticBoard::new(config.width, config.height))
        } else {
            let sequence = ImageSequence::open(Path::new(&config.path))?;
            log::info!(
                "FileSource: {} ({} image(s))",
                config.path,
                sequence.files.len()
            );
            FileBackend::Images(sequence)
        };
        Ok(Self {
            path: config.path,
            backend,
        })
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => Ok(Some(source.next_frame())),
            FileBackend::Images(source) => source.next_frame(),
        }
    }

    fn restart(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(_) => Err(anyhow!(
                "synthetic source {} cannot be restarted",
                self.path
            )),
            FileBackend::Images(source) => {
                source.position = 0;
                Ok(())
            }
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            FileBackend::Images(source) => source.last_error.is_none(),
        }
    }

    fn stats(&self) -> SourceStats {
        let frames_captured = match &self.backend {
            FileBackend::Synthetic(source) => source.frame_count(),
            FileBackend::Images(source) => source.frames_read,
        };
        SourceStats {
            frames_captured,
            path: self.path.clone(),
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub path: String,
}

struct ImageSequence {
    files: Vec<PathBuf>,
    position: usize,
    frames_read: u64,
    last_error: Option<String>,
}

impl ImageSequence {
    fn open(path: &Path) -> Result<Self> {
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("read image directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();
            files
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("image source not found: {}", path.display()));
        };
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", path.display()));
        }
        Ok(Self {
            files,
            position: 0,
            frames_read: 0,
            last_error: None,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(anyhow!("decode {}: {}", path.display(), e));
            }
        };
        self.last_error = None;
        self.frames_read += 1;
        Ok(Some(Frame::new(image, self.frames_read)))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
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

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rejects_url_schemes() {
        for path in ["rtsp://camera/stream", "http://host/frame.jpg", "", "  "] {
            let err = FileSource::new(FileConfig {
                path: path.to_string(),
                ..FileConfig::default()
            });
            assert!(err.is_err(), "{path:?} should be rejected");
        }
    }

    #[test]
    fn directory_is_read_in_order_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.PNG", 30)] {
            RgbImage::from_pixel(4, 3, Rgb([shade; 3]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = FileSource::new(FileConfig {
            path: dir.path().display().to_string(),
            ..FileConfig::default()
        })
        .unwrap();

        let mut shades = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (4, 3));
            shades.push(frame.image().get_pixel(0, 0).0[0]);
        }
        assert_eq!(shades, vec![10, 20, 30]);
        assert_eq!(source.stats().frames_captured, 3);

        source.restart().unwrap();
        assert!(source.next_frame().unwrap().is_some());
    }

    #[test]
    fn undecodable_image_is_skipped_after_one_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"not a png").unwrap();
        RgbImage::from_pixel(4, 3, Rgb([40; 3]))
            .save(dir.path().join("b.png"))
            .unwrap();
        let mut source = FileSource::new(FileConfig {
            path: dir.path().display().to_string(),
            ..FileConfig::default()
        })
        .unwrap();

        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.image().get_pixel(0, 0).0[0], 40);
        assert!(source.is_healthy());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.png");
        assert!(FileSource::new(FileConfig {
            path: path.display().to_string(),
            ..FileConfig::default()
        })
        .is_err());
    }

    #[test]
    fn synthetic_source_is_endless_and_not_restartable() {
        let mut source = FileSource::new(FileConfig {
            path: "stub://board".to_string(),
            width: 64,
            height: 48,
        })
        .unwrap();
        for expected in 1..=5 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.width(), 64);
        }
        assert!(source.restart().is_err());
    }
}
