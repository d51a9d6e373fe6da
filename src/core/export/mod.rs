//! 序列导出：CSV 表格和 PNG 折线图

pub mod chart;
pub mod font;
pub mod table;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::error::ExportError;
use crate::frame_extractor::series::Series;

pub use chart::LineChart;
pub use table::{SeriesTable, TableRow, TABLE_HEADER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Written in place of missing values.
    pub missing_marker: String,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            missing_marker: "nan".to_string(),
            chart_width: 800,
            chart_height: 600,
        }
    }
}

/// 根据输入视频文件名（去扩展名）生成输出文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    stem: String,
}

impl OutputNames {
    pub fn from_video_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        Self { stem }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn csv_file_name(&self) -> String {
        format!("{}_data.csv", self.stem)
    }

    pub fn plot_file_name(&self) -> String {
        format!("{}_plot.png", self.stem)
    }
}

/// 序列导出器：CSV 和折线图写入调用方指定的目录
///
/// 不负责创建目录，目录不存在时返回 I/O 错误。
#[derive(Debug, Clone)]
pub struct SeriesExporter {
    csv_dir: PathBuf,
    plot_dir: PathBuf,
    config: ExportConfig,
}

impl SeriesExporter {
    pub fn new(csv_dir: impl Into<PathBuf>, plot_dir: impl Into<PathBuf>, config: ExportConfig) -> Self {
        Self {
            csv_dir: csv_dir.into(),
            plot_dir: plot_dir.into(),
            config,
        }
    }

    pub fn to_table(series: &Series) -> SeriesTable {
        SeriesTable::from_series(series)
    }

    pub fn to_chart(series: &Series) -> LineChart {
        LineChart::from_series(series)
    }

    pub fn export_csv(&self, series: &Series, names: &OutputNames) -> Result<PathBuf, ExportError> {
        warn_if_partial(series);
        let path = self.csv_dir.join(names.csv_file_name());
        let io_err = |source| ExportError::Io {
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        Self::to_table(series)
            .write_csv(&mut writer, &self.config.missing_marker)
            .map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        info!("📄 CSV saved: {:?} ({} rows)", path, series.len());
        Ok(path)
    }

    pub fn export_chart(&self, series: &Series, names: &OutputNames) -> Result<PathBuf, ExportError> {
        warn_if_partial(series);
        let path = self.plot_dir.join(names.plot_file_name());
        let image = Self::to_chart(series).render(self.config.chart_width, self.config.chart_height);

        let file = File::create(&path).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        image.write_to(&mut writer, ImageFormat::Png)?;

        info!("📈 Plot saved: {:?}", path);
        Ok(path)
    }
}

fn warn_if_partial(series: &Series) {
    if series.is_partial() {
        warn!(
            "⚠️ Exporting a partial series ({} readings); the run did not complete",
            series.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_extractor::series::Reading;
    use tempfile::tempdir;

    fn series() -> Series {
        Series::from_readings(vec![
            Reading::new(0.2, Some("42".to_string())),
            Reading::new(0.4, None),
        ])
    }

    #[test]
    fn test_output_names() {
        let names = OutputNames::from_video_path(Path::new("/videos/run.01.mp4"));
        assert_eq!(names.stem(), "run.01");
        assert_eq!(names.csv_file_name(), "run.01_data.csv");
        assert_eq!(names.plot_file_name(), "run.01_plot.png");

        let dir_names = OutputNames::from_video_path(Path::new("frames/session"));
        assert_eq!(dir_names.csv_file_name(), "session_data.csv");
    }

    #[test]
    fn test_export_writes_files() {
        let dir = tempdir().unwrap();
        let csv_dir = dir.path().join("csvs");
        let plot_dir = dir.path().join("plots");
        std::fs::create_dir(&csv_dir).unwrap();
        std::fs::create_dir(&plot_dir).unwrap();

        let exporter = SeriesExporter::new(&csv_dir, &plot_dir, ExportConfig::default());
        let names = OutputNames::from_video_path(Path::new("clip.mp4"));

        let csv_path = exporter.export_csv(&series(), &names).unwrap();
        assert_eq!(csv_path, csv_dir.join("clip_data.csv"));
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content, "time_stamp_in_sec,value_per_frame\n0.20,42\n0.40,nan\n");

        let plot_path = exporter.export_chart(&series(), &names).unwrap();
        let plot = image::open(&plot_path).unwrap();
        assert_eq!((plot.width(), plot.height()), (800, 600));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let exporter = SeriesExporter::new(
            dir.path().join("missing"),
            dir.path().join("missing"),
            ExportConfig::default(),
        );
        let names = OutputNames::from_video_path(Path::new("clip.mp4"));

        assert!(matches!(
            exporter.export_csv(&series(), &names),
            Err(ExportError::Io { .. })
        ));
        assert!(matches!(
            exporter.export_chart(&series(), &names),
            Err(ExportError::Io { .. })
        ));
    }
}
