//! Tesseract 识别后端（需要 `tesseract` feature）

use std::io::Cursor;
use std::sync::Mutex;

use image::{GrayImage, ImageFormat};
use leptess::{LepTess, Variable};
use log::{debug, info};

use crate::core::error::RecognizerError;
use crate::core::ocr::recognizer::{Recognizer, TextCandidate};

pub struct TesseractRecognizer {
    engine: Mutex<LepTess>,
}

impl TesseractRecognizer {
    pub fn new(language: &str) -> Result<Self, RecognizerError> {
        let engine_err = |e: &dyn std::fmt::Display| RecognizerError::Engine(e.to_string());

        let mut engine = LepTess::new(None, language).map_err(|e| engine_err(&e))?;
        engine
            .set_variable(Variable::TesseditCharWhitelist, "0123456789.,")
            .map_err(|e| engine_err(&e))?;
        // 单行文本
        engine
            .set_variable(Variable::TesseditPagesegMode, "7")
            .map_err(|e| engine_err(&e))?;

        info!("🔤 Tesseract initialized for language {}", language);
        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<TextCandidate>, RecognizerError> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| RecognizerError::Engine(e.to_string()))?;

        let mut engine = self
            .engine
            .lock()
            .map_err(|_| RecognizerError::Engine("tesseract engine poisoned".to_string()))?;
        engine
            .set_image_from_mem(png.get_ref())
            .map_err(|e| RecognizerError::Engine(e.to_string()))?;

        let text = engine
            .get_utf8_text()
            .map_err(|e| RecognizerError::Engine(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let confidence = (engine.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);
        debug!("Tesseract read {:?} ({:.2})", text, confidence);
        Ok(vec![TextCandidate::new(text, confidence)])
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
