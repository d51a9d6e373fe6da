//! 模板匹配数字识别器
//!
//! Pipeline per crop:
//! 1. Binarize around the mean, text taken as the minority polarity
//! 2. Split into glyphs by column occupancy
//! 3. Trim each glyph to its bounding box and match it against every template
//!    by sum of absolute differences after resizing to the template size
//! 4. Confidence per glyph is `1 - best / second_best`, averaged over the token

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use log::{debug, info};

use crate::core::error::RecognizerError;
use crate::core::ocr::recognizer::{Recognizer, TextCandidate};

/// Template file stems and the character each one stands for.
const TEMPLATE_FILES: [(&str, char); 12] = [
    ("0", '0'),
    ("1", '1'),
    ("2", '2'),
    ("3", '3'),
    ("4", '4'),
    ("5", '5'),
    ("6", '6'),
    ("7", '7'),
    ("8", '8'),
    ("9", '9'),
    ("dot", '.'),
    ("comma", ','),
];

/// Aspect ratio mismatch above which a template is not considered.
const MAX_ASPECT_MISMATCH: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct GlyphTemplate {
    pub ch: char,
    pub image: GrayImage,
}

pub struct TemplateRecognizer {
    templates: Vec<GlyphTemplate>,
}

impl TemplateRecognizer {
    /// Templates are binarized and trimmed the same way crops are.
    pub fn from_templates(templates: Vec<(char, GrayImage)>) -> Self {
        let templates = templates
            .into_iter()
            .filter_map(|(ch, image)| {
                trim_to_content(&binarize(&image)).map(|image| GlyphTemplate { ch, image })
            })
            .collect();
        Self { templates }
    }

    /// Loads `0.png`..`9.png`, `dot.png` and `comma.png` from `dir`; missing files are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self, RecognizerError> {
        let mut templates = Vec::new();

        for (stem, ch) in TEMPLATE_FILES {
            let path = dir.join(format!("{}.png", stem));
            if !path.exists() {
                debug!("No template for {:?} at {:?}", ch, path);
                continue;
            }
            let image = image::open(&path)
                .map_err(|e| RecognizerError::Template {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
                .to_luma8();
            templates.push((ch, image));
        }

        let recognizer = Self::from_templates(templates);
        if recognizer.templates.is_empty() {
            return Err(RecognizerError::NoTemplates(dir.to_path_buf()));
        }

        info!("🔤 Loaded {} glyph templates from {:?}", recognizer.templates.len(), dir);
        Ok(recognizer)
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    fn match_glyph(&self, glyph: &GrayImage) -> Option<(char, f32)> {
        let ar_in = glyph.width() as f32 / glyph.height() as f32;
        let mut best: Option<(char, u64)> = None;
        let mut second_best = u64::MAX;

        for template in &self.templates {
            let (tw, th) = template.image.dimensions();
            let ar_tm = tw as f32 / th as f32;
            if (ar_in - ar_tm).abs() / ar_tm.max(0.01) > MAX_ASPECT_MISMATCH {
                continue;
            }

            let resized = imageops::resize(glyph, tw, th, FilterType::Triangle);
            let score: u64 = resized
                .pixels()
                .zip(template.image.pixels())
                .map(|(a, b)| (a.0[0] as i64 - b.0[0] as i64).unsigned_abs())
                .sum();

            match best {
                Some((_, best_score)) if score >= best_score => {
                    second_best = second_best.min(score);
                }
                _ => {
                    if let Some((_, previous)) = best {
                        second_best = previous;
                    }
                    best = Some((template.ch, score));
                }
            }
        }

        best.map(|(ch, score)| {
            let confidence = if second_best == u64::MAX || second_best == 0 {
                if score == 0 { 1.0 } else { 0.0 }
            } else {
                1.0 - score as f32 / second_best as f32
            };
            (ch, confidence)
        })
    }
}

impl Recognizer for TemplateRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<TextCandidate>, RecognizerError> {
        let binary = binarize(image);
        let mut text = String::new();
        let mut confidence_sum = 0.0f32;

        for (start, end) in find_character_columns(&binary) {
            let column = imageops::crop_imm(&binary, start, 0, end - start + 1, binary.height()).to_image();
            let Some(glyph) = trim_to_content(&column) else {
                continue;
            };
            match self.match_glyph(&glyph) {
                Some((ch, confidence)) => {
                    text.push(ch);
                    confidence_sum += confidence;
                }
                // a glyph no template resembles still goes to the validator
                None => text.push('?'),
            }
        }

        if text.is_empty() {
            return Ok(Vec::new());
        }

        let confidence = (confidence_sum / text.chars().count() as f32).clamp(0.0, 1.0);
        Ok(vec![TextCandidate::new(text, confidence)])
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// Text pixels become 255, background 0.
pub fn binarize(image: &GrayImage) -> GrayImage {
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let mean = (image.pixels().map(|p| p.0[0] as u64).sum::<u64>() / count) as u8;
    let bright = image.pixels().filter(|p| p.0[0] > mean).count() as u64;

    // text is whichever side of the mean covers fewer pixels
    let text_is_bright = bright * 2 <= count;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        let is_text = if text_is_bright { v > mean } else { v < mean };
        Luma([if is_text { 255 } else { 0 }])
    })
}

/// Inclusive column ranges that contain at least one text pixel.
pub fn find_character_columns(binary: &GrayImage) -> Vec<(u32, u32)> {
    let mut boundaries = Vec::new();
    let mut start: Option<u32> = None;

    for x in 0..binary.width() {
        let occupied = (0..binary.height()).any(|y| binary.get_pixel(x, y).0[0] > 0);
        match (occupied, start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                boundaries.push((s, x - 1));
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        boundaries.push((s, binary.width() - 1));
    }

    boundaries
}

fn trim_to_content(binary: &GrayImage) -> Option<GrayImage> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;

    for (x, y, p) in binary.enumerate_pixels() {
        if p.0[0] > 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return None;
    }

    Some(imageops::crop_imm(binary, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1).to_image())
}
