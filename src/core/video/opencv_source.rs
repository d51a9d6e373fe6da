//! OpenCV 解码的视频文件源（需要 `opencv` feature）

use std::path::Path;

use log::{debug, info};
use opencv::{core::Mat, imgproc, prelude::*, videoio};

use crate::core::error::{ExtractionError, SourceError};
use crate::core::video::frame::Frame;
use crate::core::video::source::VideoSource;

pub struct OpenCvVideoSource {
    capture: videoio::VideoCapture,
    fps: f64,
    next_frame_number: u64,
}

impl OpenCvVideoSource {
    pub fn open(path: &Path) -> Result<Self, ExtractionError> {
        let unavailable = |reason: String| ExtractionError::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let path_str = path
            .to_str()
            .ok_or_else(|| unavailable("path is not valid UTF-8".to_string()))?;
        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| unavailable(e.to_string()))?;

        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable(format!("Unable to open {}", path_str)));
        }

        let fps = capture
            .get(videoio::CAP_PROP_FPS)
            .map_err(|e| unavailable(e.to_string()))?;

        info!("🎬 Opened video {:?} at {:.2} fps", path, fps);
        Ok(Self {
            capture,
            fps,
            next_frame_number: 0,
        })
    }
}

impl VideoSource for OpenCvVideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let backend = |e: opencv::Error| SourceError::Backend(e.to_string());

        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr).map_err(backend)? || bgr.empty() {
            return Ok(None);
        }

        let frame_number = self.next_frame_number;
        self.next_frame_number += 1;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(backend)?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb.data_bytes().map_err(backend)?.to_vec();
        let timestamp_secs = self
            .capture
            .get(videoio::CAP_PROP_POS_MSEC)
            .map_err(backend)?
            / 1000.0;

        let frame = Frame::from_rgb(width, height, data, timestamp_secs, frame_number).ok_or(
            SourceError::Decode {
                frame_number,
                reason: "unexpected frame buffer size".to_string(),
            },
        )?;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn close(&mut self) {
        debug!("Releasing video capture after {} frames", self.next_frame_number);
        let _ = self.capture.release();
    }
}
