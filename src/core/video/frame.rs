use std::fmt;
use std::str::FromStr;

use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::core::error::{ConfigError, ExtractionError};

/// 解码后的帧 (RGB8)
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Source-reported presentation time in seconds.
    pub timestamp_secs: f64,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp_secs: f64, frame_number: u64) -> Self {
        Self {
            image,
            timestamp_secs,
            frame_number,
        }
    }

    /// Build a frame from packed RGB8 bytes, `None` if the buffer size is wrong.
    pub fn from_rgb(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_secs: f64,
        frame_number: u64,
    ) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|img| Self::new(img, timestamp_secs, frame_number))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Region of interest in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies fully inside a `frame_width` x `frame_height` frame.
    pub fn fits(&self, frame_width: u32, frame_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= frame_width && b <= frame_height)
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Roi {
    type Err = ConfigError;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::Roi(s.to_string()))?;

        match parts.as_slice() {
            [x, y, w, h] => Ok(Roi::new(*x, *y, *w, *h)),
            _ => Err(ConfigError::Roi(s.to_string())),
        }
    }
}

/// Crops frames to the ROI and converts them to grayscale for recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePreprocessor;

impl FramePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn crop(&self, frame: &Frame, roi: &Roi) -> Result<GrayImage, ExtractionError> {
        if roi.is_empty() {
            return Err(ExtractionError::InvalidRoi(*roi));
        }
        if !roi.fits(frame.width(), frame.height()) {
            return Err(ExtractionError::OutOfBounds {
                roi: *roi,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        let cropped = imageops::crop_imm(&frame.image, roi.x, roi.y, roi.width, roi.height).to_image();
        Ok(imageops::grayscale(&cropped))
    }
}
