use std::path::PathBuf;

use thiserror::Error;

use crate::core::video::Roi;

/// Failures while decoding frames from an already opened source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to decode frame {frame_number}: {reason}")]
    Decode { frame_number: u64, reason: String },
    #[error("video backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer engine error: {0}")]
    Engine(String),
    #[error("failed to load template {path:?}: {reason}")]
    Template { path: PathBuf, reason: String },
    #[error("no templates found in {0:?}")]
    NoTemplates(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("video source unavailable at {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("ROI {roi} does not fit a {frame_width}x{frame_height} frame")]
    OutOfBounds {
        roi: Roi,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("ROI {0} must have a positive width and height")]
    InvalidRoi(Roi),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("pipeline already ran; use one pipeline per run")]
    AlreadyStarted,
}

/// Raised by summary statistics only, never by the extraction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("series has no readings")]
    EmptySeries,
    #[error("every reading in the series is missing")]
    AllMissing,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid ROI `{0}`, expected x,y,width,height")]
    Roi(String),
}

/// Failures of a whole service run: extract, then export.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] crate::frame_extractor::ExtractionFailure),
    #[error(transparent)]
    Export(#[from] ExportError),
}
