use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use log::{debug, info};

use crate::core::error::{ExtractionError, SourceError};
use crate::core::video::frame::Frame;

const SEQUENCE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Decoded-frame supplier consumed by the extraction pipeline.
///
/// Frames come back in presentation order; `Ok(None)` marks end of stream.
pub trait VideoSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    fn frame_rate(&self) -> f64;

    fn close(&mut self) {}
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }

    fn frame_rate(&self) -> f64 {
        (**self).frame_rate()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// 图片序列视频源：目录下按文件名排序的静态帧
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    fps: f64,
    start_index: u64,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, ExtractionError> {
        let unavailable = |reason: String| ExtractionError::SourceUnavailable {
            path: dir.to_path_buf(),
            reason,
        };

        if fps.is_nan() || fps <= 0.0 {
            return Err(unavailable(format!("invalid frame rate {}", fps)));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_frame_extension(path))
            .collect();
        frames.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

        if frames.is_empty() {
            return Err(unavailable("no frame images found".to_string()));
        }

        info!("🎞️ Opened image sequence {:?}: {} frames at {} fps", dir, frames.len(), fps);
        Ok(Self::from_paths(frames, fps, 0))
    }

    /// `start_index` is the global index of the first path, used for timestamps.
    pub fn from_paths(frames: Vec<PathBuf>, fps: f64, start_index: u64) -> Self {
        Self {
            frames,
            fps,
            start_index,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into at most `parts` contiguous ranges, each paired with its global start index.
    pub fn split(self, parts: usize) -> Vec<(u64, ImageSequenceSource)> {
        let parts = parts.max(1).min(self.frames.len().max(1));
        let chunk = self.frames.len().div_ceil(parts).max(1);

        self.frames
            .chunks(chunk)
            .enumerate()
            .map(|(i, paths)| {
                let start = self.start_index + (i * chunk) as u64;
                (start, Self::from_paths(paths.to_vec(), self.fps, start))
            })
            .collect()
    }
}

impl VideoSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let frame_number = self.start_index + self.cursor as u64;
        self.cursor += 1;

        let image = image::open(path)
            .map_err(|e| SourceError::Decode {
                frame_number,
                reason: format!("{:?}: {}", path, e),
            })?
            .to_rgb8();

        Ok(Some(Frame::new(
            image,
            frame_number as f64 / self.fps,
            frame_number,
        )))
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn close(&mut self) {
        debug!("Closing image sequence after {} frames", self.cursor);
        self.cursor = self.frames.len();
    }
}

/// 自然排序：数字段按数值比较，`frame_2` 排在 `frame_10` 之前
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let left_trimmed = left.trim_start_matches('0');
                let right_trimmed = right.trim_start_matches('0');
                let ord = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed))
                    .then_with(|| left.len().cmp(&right.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SEQUENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 纯色合成视频源，用于测试和演示
#[derive(Debug, Clone)]
pub struct SyntheticVideoSource {
    width: u32,
    height: u32,
    fps: f64,
    fill: Rgb<u8>,
    next: u64,
    end: u64,
    fail_at: Option<u64>,
}

impl SyntheticVideoSource {
    pub fn new(width: u32, height: u32, frame_count: u64, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            fill: Rgb([255, 255, 255]),
            next: 0,
            end: frame_count,
            fail_at: None,
        }
    }

    pub fn with_fill(mut self, fill: Rgb<u8>) -> Self {
        self.fill = fill;
        self
    }

    /// Produce a decode error instead of frame `frame_number`.
    pub fn failing_at(mut self, frame_number: u64) -> Self {
        self.fail_at = Some(frame_number);
        self
    }

    /// Restrict to frames `[start, end)`, keeping global frame numbers and timestamps.
    pub fn range(mut self, start: u64, end: u64) -> Self {
        self.next = start;
        self.end = end.min(self.end);
        self
    }
}

impl VideoSource for SyntheticVideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.next >= self.end {
            return Ok(None);
        }
        let frame_number = self.next;
        self.next += 1;

        if self.fail_at == Some(frame_number) {
            return Err(SourceError::Decode {
                frame_number,
                reason: "synthetic failure".to_string(),
            });
        }

        let image = RgbImage::from_pixel(self.width, self.height, self.fill);
        Ok(Some(Frame::new(
            image,
            frame_number as f64 / self.fps,
            frame_number,
        )))
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }
}
