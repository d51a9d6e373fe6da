//! 数值校验：过滤识别结果中的非数值文本

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::ocr::recognizer::TextCandidate;

/// 只允许数字、'.'、','，且至少包含一个数字
static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9.,]*[0-9][0-9.,]*$").expect("numeric token regex"));

/// 识别结果的校验结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// 通过，原样保留（前导零和分隔符不变）
    Accepted(String),
    /// 未检测到文本
    NoDetection,
    /// 首个候选不是数值
    InvalidFormat(String),
}

impl Validation {
    pub fn into_value(self) -> Option<String> {
        match self {
            Validation::Accepted(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueValidator;

impl ValueValidator {
    pub fn new() -> Self {
        Self
    }

    /// 只看第一个候选，排序由识别器负责
    pub fn classify(&self, candidates: &[TextCandidate]) -> Validation {
        match candidates.first() {
            None => Validation::NoDetection,
            Some(best) if NUMERIC_TOKEN.is_match(&best.text) => {
                Validation::Accepted(best.text.clone())
            }
            Some(best) => Validation::InvalidFormat(best.text.clone()),
        }
    }

    pub fn validate(&self, candidates: &[TextCandidate]) -> Option<String> {
        self.classify(candidates).into_value()
    }
}
