use std::sync::atomic::{AtomicU64, Ordering};

use image::GrayImage;

use crate::core::error::RecognizerError;

/// One recognized string and the engine's confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCandidate {
    pub text: String,
    pub confidence: f32,
}

impl TextCandidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Text recognition capability invoked once per sampled, cropped frame.
///
/// Candidates are ordered best-first; an empty list means nothing was detected.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<Vec<TextCandidate>, RecognizerError>;

    fn name(&self) -> &str {
        "recognizer"
    }
}

type Pattern = Box<dyn Fn(u64) -> Result<Vec<TextCandidate>, RecognizerError> + Send + Sync>;

/// Scripted recognizer keyed on call index (0-based), for tests and dry runs.
pub struct MockRecognizer {
    pattern: Pattern,
    calls: AtomicU64,
}

impl MockRecognizer {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> Result<Vec<TextCandidate>, RecognizerError> + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
            calls: AtomicU64::new(0),
        }
    }

    /// Always returns `text` with full confidence.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::with_pattern(move |_| Ok(vec![TextCandidate::new(text.clone(), 1.0)]))
    }

    /// Call `i` returns `responses[i]`; calls past the end detect nothing.
    pub fn with_sequence(responses: Vec<Vec<TextCandidate>>) -> Self {
        Self::with_pattern(move |call| Ok(responses.get(call as usize).cloned().unwrap_or_default()))
    }

    /// Returns `text` except on the listed calls, which detect nothing.
    pub fn with_blank_calls(text: &str, blank_calls: Vec<u64>) -> Self {
        let text = text.to_string();
        Self::with_pattern(move |call| {
            if blank_calls.contains(&call) {
                Ok(Vec::new())
            } else {
                Ok(vec![TextCandidate::new(text.clone(), 1.0)])
            }
        })
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<TextCandidate>, RecognizerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.pattern)(call)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> GrayImage {
        GrayImage::new(4, 4)
    }

    #[test]
    fn test_mock_constant() {
        let recognizer = MockRecognizer::constant("42");
        let result = recognizer.recognize(&blank()).unwrap();
        assert_eq!(result, vec![TextCandidate::new("42", 1.0)]);
        assert_eq!(recognizer.call_count(), 1);
    }

    #[test]
    fn test_mock_with_blank_calls() {
        let recognizer = MockRecognizer::with_blank_calls("7", vec![1]);
        assert_eq!(recognizer.recognize(&blank()).unwrap().len(), 1);
        assert!(recognizer.recognize(&blank()).unwrap().is_empty());
        assert_eq!(recognizer.recognize(&blank()).unwrap().len(), 1);
    }

    #[test]
    fn test_mock_sequence_runs_out() {
        let recognizer = MockRecognizer::with_sequence(vec![vec![TextCandidate::new("1", 0.5)]]);
        assert_eq!(recognizer.recognize(&blank()).unwrap()[0].text, "1");
        assert!(recognizer.recognize(&blank()).unwrap().is_empty());
    }

    #[test]
    fn test_mock_pattern_error() {
        let recognizer = MockRecognizer::with_pattern(|call| {
            if call == 0 {
                Err(RecognizerError::Engine("boom".to_string()))
            } else {
                Ok(Vec::new())
            }
        });
        assert!(recognizer.recognize(&blank()).is_err());
        assert!(recognizer.recognize(&blank()).is_ok());
    }
}
