pub mod frame;
#[cfg(feature = "opencv")]
pub mod opencv_source;
pub mod source;

pub use frame::{Frame, FramePreprocessor, Roi};
#[cfg(feature = "opencv")]
pub use opencv_source::OpenCvVideoSource;
pub use source::{ImageSequenceSource, SyntheticVideoSource, VideoSource};
