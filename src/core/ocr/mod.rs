pub mod recognizer;
pub mod template;
#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod validator;

pub use recognizer::{MockRecognizer, Recognizer, TextCandidate};
pub use template::TemplateRecognizer;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;
pub use validator::{Validation, ValueValidator};
