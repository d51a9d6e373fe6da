//! 数值识别服务 - 打开视频源、提取、导出、统计

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{error, info, warn};

use crate::api::models::{RunConfig, RunReport, StatValue};
use crate::core::error::{ExtractionError, ServiceError, StatsError};
use crate::core::export::{OutputNames, SeriesExporter};
use crate::core::ocr::Recognizer;
use crate::core::video::{ImageSequenceSource, Roi, VideoSource};
use crate::frame_extractor::{
    extract_partitioned, ExtractionFailure, ExtractionPipeline, PartitionedRun,
};

/// 视频数值提取服务
///
/// A directory is read as an image sequence at `image_sequence_fps`; any other
/// path is decoded as a video file, which needs the `opencv` feature.
pub struct OcrService {
    video_path: PathBuf,
    roi: Roi,
    config: RunConfig,
    cancel: Arc<AtomicBool>,
}

impl OcrService {
    pub fn new(video_path: impl Into<PathBuf>, roi: Roi, config: RunConfig) -> Self {
        let video_path = video_path.into();
        info!("🎬 OcrService: created for {:?}", video_path);
        Self {
            video_path,
            roi,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag stops a sequential run before its next frame.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn output_names(&self) -> OutputNames {
        OutputNames::from_video_path(&self.video_path)
    }

    /// Extract, export CSV and chart, then summarize.
    ///
    /// When extraction aborts, whatever was read is still written to CSV
    /// before the failure is returned.
    pub fn run(&self, recognizer: &dyn Recognizer) -> Result<RunReport, ServiceError> {
        let exporter = SeriesExporter::new(
            &self.config.csv_dir,
            &self.config.plot_dir,
            self.config.export.clone(),
        );
        let names = self.output_names();

        let PartitionedRun { series, summary } = match self.extract(recognizer) {
            Ok(run) => run,
            Err(failure) => {
                if !failure.partial.is_empty() {
                    if let Err(e) = exporter.export_csv(&failure.partial, &names) {
                        warn!("⚠️ Could not save partial series: {}", e);
                    }
                }
                return Err(failure.into());
            }
        };

        let csv_path = exporter.export_csv(&series, &names)?;
        let plot_path = exporter.export_chart(&series, &names)?;

        let report = RunReport {
            video: self.video_path.clone(),
            roi: self.roi,
            csv_path,
            plot_path,
            readings: series.len(),
            missing: series.missing_count(),
            summary,
            average: stat_or_warn(series.average(), "average"),
            min: stat_or_warn(series.min(), "min").and_then(StatValue::from_reading),
            max: stat_or_warn(series.max(), "max").and_then(StatValue::from_reading),
        };

        info!(
            "📊 {} readings, {} missing, average {:?}",
            report.readings, report.missing, report.average
        );
        Ok(report)
    }

    fn extract(&self, recognizer: &dyn Recognizer) -> Result<PartitionedRun, ExtractionFailure> {
        if !self.video_path.is_dir() {
            return self.extract_video_file(recognizer);
        }

        let fps = self.config.image_sequence_fps;
        let partitions = self.config.resolved_partitions();
        if partitions <= 1 {
            return self.run_pipeline(|| ImageSequenceSource::open(&self.video_path, fps), recognizer);
        }

        let source = ImageSequenceSource::open(&self.video_path, fps).map_err(|e| {
            error!("❌ Failed to open video source: {}", e);
            ExtractionFailure::before_start(e)
        })?;
        let every = self.config.extraction.sampling_policy(fps).every();
        extract_partitioned(self.roi, every, source.split(partitions), recognizer)
    }

    #[cfg(feature = "opencv")]
    fn extract_video_file(
        &self,
        recognizer: &dyn Recognizer,
    ) -> Result<PartitionedRun, ExtractionFailure> {
        use crate::core::video::OpenCvVideoSource;

        self.run_pipeline(|| OpenCvVideoSource::open(&self.video_path), recognizer)
    }

    #[cfg(not(feature = "opencv"))]
    fn extract_video_file(
        &self,
        _recognizer: &dyn Recognizer,
    ) -> Result<PartitionedRun, ExtractionFailure> {
        let error = ExtractionError::SourceUnavailable {
            path: self.video_path.clone(),
            reason: unsupported_reason(&self.video_path),
        };
        error!("❌ Failed to open video source: {}", error);
        Err(ExtractionFailure::before_start(error))
    }

    fn run_pipeline<S, F>(
        &self,
        open: F,
        recognizer: &dyn Recognizer,
    ) -> Result<PartitionedRun, ExtractionFailure>
    where
        S: VideoSource,
        F: FnOnce() -> Result<S, ExtractionError>,
    {
        let mut pipeline = ExtractionPipeline::from_config(self.roi, &self.config.extraction)
            .with_cancel_flag(self.cancel_handle());
        pipeline.process_with(open, recognizer)?;

        let summary = pipeline.summary();
        Ok(PartitionedRun {
            series: pipeline.into_series(),
            summary,
        })
    }
}

impl Drop for OcrService {
    fn drop(&mut self) {
        info!("🗑️ OcrService: released");
    }
}

#[cfg(not(feature = "opencv"))]
fn unsupported_reason(path: &std::path::Path) -> String {
    if path.exists() {
        "video decoding needs the `opencv` feature; pass a directory of frames instead".to_string()
    } else {
        "no such file or directory".to_string()
    }
}

fn stat_or_warn<T>(stat: Result<T, StatsError>, name: &str) -> Option<T> {
    match stat {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("⚠️ No {} available: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::MockRecognizer;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};

    struct Workspace {
        _root: TempDir,
        frames: PathBuf,
        config: RunConfig,
    }

    fn workspace(frames: usize) -> Workspace {
        let root = tempdir().unwrap();
        let frames_dir = root.path().join("session");
        let csv_dir = root.path().join("csvs");
        let plot_dir = root.path().join("plots");
        for dir in [&frames_dir, &csv_dir, &plot_dir] {
            std::fs::create_dir(dir).unwrap();
        }
        for i in 0..frames {
            RgbImage::from_pixel(32, 24, Rgb([240, 240, 240]))
                .save(frames_dir.join(format!("{:04}.png", i)))
                .unwrap();
        }

        let config = RunConfig {
            csv_dir,
            plot_dir,
            ..RunConfig::default()
        };
        Workspace {
            _root: root,
            frames: frames_dir,
            config,
        }
    }

    #[test]
    fn test_run_image_sequence() {
        let ws = workspace(30);
        let service = OcrService::new(&ws.frames, Roi::new(0, 0, 16, 8), ws.config.clone());
        let recognizer = MockRecognizer::with_blank_calls("42", vec![1, 3]);

        let report = service.run(&recognizer).unwrap();
        assert_eq!(report.readings, 5);
        assert_eq!(report.missing, 2);
        assert_eq!(report.summary.skipped_count, 2);
        assert_eq!(report.average, Some(42.0));
        assert_eq!(report.min.as_ref().map(|m| m.value.as_str()), Some("42"));
        assert_eq!(report.csv_path, ws.config.csv_dir.join("session_data.csv"));
        assert_eq!(report.plot_path, ws.config.plot_dir.join("session_plot.png"));

        let csv = std::fs::read_to_string(&report.csv_path).unwrap();
        assert_eq!(csv.lines().count(), 6);
        assert_eq!(csv.lines().nth(2), Some("0.37,nan"));
        assert!(report.plot_path.exists());
    }

    #[test]
    fn test_partitioned_run_matches_sequential() {
        let ws = workspace(40);
        let roi = Roi::new(0, 0, 16, 8);
        let sequential = OcrService::new(&ws.frames, roi, ws.config.clone())
            .run(&MockRecognizer::constant("9"))
            .unwrap();

        let config = RunConfig {
            partitions: 3,
            ..ws.config.clone()
        };
        let parallel = OcrService::new(&ws.frames, roi, config)
            .run(&MockRecognizer::constant("9"))
            .unwrap();

        assert_eq!(parallel.readings, sequential.readings);
        assert_eq!(parallel.summary, sequential.summary);
    }

    #[test]
    fn test_auto_partitions_matches_sequential() {
        let ws = workspace(40);
        let roi = Roi::new(0, 0, 16, 8);
        let sequential = OcrService::new(&ws.frames, roi, ws.config.clone())
            .run(&MockRecognizer::constant("3"))
            .unwrap();

        let config = RunConfig {
            partitions: 0,
            ..ws.config.clone()
        };
        let auto = OcrService::new(&ws.frames, roi, config)
            .run(&MockRecognizer::constant("3"))
            .unwrap();

        assert_eq!(auto.readings, sequential.readings);
        assert_eq!(auto.summary, sequential.summary);
    }

    #[test]
    fn test_all_missing_run_still_exports() {
        let ws = workspace(12);
        let service = OcrService::new(&ws.frames, Roi::new(0, 0, 16, 8), ws.config.clone());
        let report = service.run(&MockRecognizer::with_sequence(vec![])).unwrap();

        assert_eq!(report.readings, 2);
        assert_eq!(report.average, None);
        assert_eq!(report.max, None);
        assert!(report.csv_path.exists());
    }

    #[test]
    fn test_failure_exports_partial_csv() {
        let ws = workspace(30);
        let service = OcrService::new(&ws.frames, Roi::new(0, 0, 16, 8), ws.config.clone());
        let recognizer = MockRecognizer::with_pattern(|call| {
            if call == 3 {
                Err(crate::core::error::RecognizerError::Engine("boom".to_string()))
            } else {
                Ok(vec![crate::core::ocr::TextCandidate::new("1", 1.0)])
            }
        });

        let err = service.run(&recognizer).unwrap_err();
        let ServiceError::Extraction(failure) = err else {
            panic!("expected extraction failure");
        };
        assert_eq!(failure.partial.len(), 3);

        let csv = std::fs::read_to_string(ws.config.csv_dir.join("session_data.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let ws = workspace(0);
        let service = OcrService::new(
            ws.frames.join("nope.mp4"),
            Roi::new(0, 0, 4, 4),
            ws.config.clone(),
        );
        let err = service.run(&MockRecognizer::constant("1")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(ExtractionFailure {
                error: ExtractionError::SourceUnavailable { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let ws = workspace(12);
        let service = OcrService::new(&ws.frames, Roi::new(0, 0, 16, 8), ws.config.clone());
        service.cancel_handle().store(true, Ordering::Relaxed);

        let err = service.run(&MockRecognizer::constant("1")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(ExtractionFailure {
                error: ExtractionError::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_output_dir_is_export_error() {
        let ws = workspace(12);
        let config = RunConfig {
            csv_dir: ws.frames.join("does-not-exist"),
            ..ws.config.clone()
        };
        let service = OcrService::new(&ws.frames, Roi::new(0, 0, 16, 8), config);
        assert!(matches!(
            service.run(&MockRecognizer::constant("1")),
            Err(ServiceError::Export(_))
        ));
    }
}
