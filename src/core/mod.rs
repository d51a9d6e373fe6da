pub mod error;
pub mod export;
pub mod ocr;
pub mod video;
