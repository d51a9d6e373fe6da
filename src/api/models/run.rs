use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::export::ExportConfig;
use crate::core::video::Roi;
use crate::frame_extractor::{default_partitions, ExtractionConfig, Reading, RunSummary};

/// 一次运行的完整配置，可从 JSON 文件读取，命令行参数优先
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub roi: Option<Roi>,
    pub extraction: ExtractionConfig,
    pub export: ExportConfig,
    pub csv_dir: PathBuf,
    pub plot_dir: PathBuf,
    /// 并行帧区间数，仅图片序列可拆分；0 表示按 CPU 核数
    pub partitions: usize,
    /// Frame rate assumed for directories of still frames.
    pub image_sequence_fps: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            roi: None,
            extraction: ExtractionConfig::default(),
            export: ExportConfig::default(),
            csv_dir: PathBuf::from("csvs"),
            plot_dir: PathBuf::from("plots"),
            partitions: 1,
            image_sequence_fps: 30.0,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 实际使用的区间数：0 解析为 CPU 核数
    pub fn resolved_partitions(&self) -> usize {
        match self.partitions {
            0 => default_partitions(),
            n => n,
        }
    }
}

/// A min/max reading as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatValue {
    pub timestamp_secs: f64,
    pub value: String,
}

impl StatValue {
    pub fn from_reading(reading: &Reading) -> Option<Self> {
        reading.value.as_ref().map(|value| Self {
            timestamp_secs: reading.rounded_timestamp(),
            value: value.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub video: PathBuf,
    pub roi: Roi,
    pub csv_path: PathBuf,
    pub plot_path: PathBuf,
    pub readings: usize,
    pub missing: usize,
    pub summary: RunSummary,
    /// `None` when the series is empty or every value is missing.
    pub average: Option<f64>,
    pub min: Option<StatValue>,
    pub max: Option<StatValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.csv_dir, PathBuf::from("csvs"));
        assert_eq!(config.plot_dir, PathBuf::from("plots"));
        assert_eq!(config.partitions, 1);
        assert_eq!(config.extraction.sample_every, 6);
        assert_eq!(config.export.missing_marker, "nan");
        assert!(config.roi.is_none());
    }

    #[test]
    fn test_from_json_file_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "roi": {"x": 10, "y": 20, "width": 100, "height": 40},
                "extraction": {"sample_interval_secs": 1.0},
                "export": {"missing_marker": ""},
                "partitions": 4
            }"#,
        )
        .unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.roi, Some(Roi::new(10, 20, 100, 40)));
        assert_eq!(config.extraction.sample_interval_secs, Some(1.0));
        assert_eq!(config.extraction.sample_every, 6);
        assert_eq!(config.export.missing_marker, "");
        assert_eq!(config.export.chart_width, 800);
        assert_eq!(config.partitions, 4);
        assert_eq!(config.image_sequence_fps, 30.0);
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            RunConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RunConfig::from_json_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_partitions_means_one_per_cpu() {
        let auto = RunConfig {
            partitions: 0,
            ..RunConfig::default()
        };
        assert_eq!(auto.resolved_partitions(), default_partitions());
        assert!(auto.resolved_partitions() >= 1);
        assert_eq!(RunConfig::default().resolved_partitions(), 1);
    }

    #[test]
    fn test_stat_value_skips_missing() {
        assert_eq!(StatValue::from_reading(&Reading::missing(1.0)), None);
        let stat = StatValue::from_reading(&Reading::new(0.166, Some("7".to_string()))).unwrap();
        assert_eq!(stat.timestamp_secs, 0.17);
        assert_eq!(stat.value, "7");
    }
}
