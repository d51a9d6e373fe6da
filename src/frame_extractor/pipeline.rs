//! 提取流水线 - 状态机 + 逐帧处理

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::core::error::ExtractionError;
use crate::core::ocr::{Recognizer, Validation, ValueValidator};
use crate::core::video::{Frame, FramePreprocessor, Roi, VideoSource};
use crate::frame_extractor::sampling::SamplingPolicy;
use crate::frame_extractor::series::{Reading, Series};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 每 N 帧采样一帧
    pub sample_every: u64,
    /// 按秒采样间隔，设置后结合帧率覆盖 `sample_every`
    pub sample_interval_secs: Option<f64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_every: SamplingPolicy::DEFAULT_EVERY,
            sample_interval_secs: None,
        }
    }
}

impl ExtractionConfig {
    pub fn every_frame() -> Self {
        Self {
            sample_every: 1,
            sample_interval_secs: None,
        }
    }

    pub fn every_seconds(interval_secs: f64) -> Self {
        Self {
            sample_interval_secs: Some(interval_secs),
            ..Self::default()
        }
    }

    /// 按视频帧率解析出采样策略
    pub fn sampling_policy(&self, fps: f64) -> SamplingPolicy {
        match self.sample_interval_secs {
            Some(interval) => SamplingPolicy::from_interval(interval, fps),
            None => SamplingPolicy::every_nth(self.sample_every),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunSummary {
    pub total_frames_seen: u64,
    pub sampled_frame_count: u64,
    /// 跳过总数 = 未检测到 + 格式无效
    pub skipped_count: u64,
    pub no_detection_count: u64,
    pub invalid_format_count: u64,
    pub frame_rate: f64,
}

impl RunSummary {
    /// 合并同一视频不相交区间的统计
    pub fn combine(self, other: RunSummary) -> RunSummary {
        RunSummary {
            total_frames_seen: self.total_frames_seen + other.total_frames_seen,
            sampled_frame_count: self.sampled_frame_count + other.sampled_frame_count,
            skipped_count: self.skipped_count + other.skipped_count,
            no_detection_count: self.no_detection_count + other.no_detection_count,
            invalid_format_count: self.invalid_format_count + other.invalid_format_count,
            frame_rate: if self.frame_rate > 0.0 {
                self.frame_rate
            } else {
                other.frame_rate
            },
        }
    }
}

/// 致命错误 + 出错前已收集的读数
#[derive(Debug)]
pub struct ExtractionFailure {
    pub error: ExtractionError,
    pub partial: Series,
}

impl ExtractionFailure {
    /// 尚未读取任何帧就失败（如打开视频源失败）
    pub fn before_start(error: ExtractionError) -> Self {
        let mut partial = Series::new();
        partial.mark_partial();
        Self { error, partial }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} readings kept)", self.error, self.partial.len())
    }
}

impl std::error::Error for ExtractionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// 数值提取流水线：采样 → 裁剪 → 识别 → 校验 → 记录
///
/// 每次运行一个实例，重复调用 `process` 返回
/// [`ExtractionError::AlreadyStarted`]。
pub struct ExtractionPipeline {
    roi: Roi,
    sampling: SamplingPolicy,
    preprocessor: FramePreprocessor,
    validator: ValueValidator,
    state: PipelineState,
    series: Series,
    total_frames_seen: u64,
    sampled_frame_count: u64,
    no_detection_count: u64,
    invalid_format_count: u64,
    frame_rate: f64,
    /// 运行开始时根据视频帧率解析
    interval_secs: Option<f64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExtractionPipeline {
    pub fn new(roi: Roi, sampling: SamplingPolicy) -> Self {
        Self {
            roi,
            sampling,
            preprocessor: FramePreprocessor::new(),
            validator: ValueValidator::new(),
            state: PipelineState::Idle,
            series: Series::new(),
            total_frames_seen: 0,
            sampled_frame_count: 0,
            no_detection_count: 0,
            invalid_format_count: 0,
            frame_rate: 0.0,
            interval_secs: None,
            cancel: None,
        }
    }

    /// 从配置创建；按秒间隔要等拿到帧率后才确定
    pub fn from_config(roi: Roi, config: &ExtractionConfig) -> Self {
        let mut pipeline = Self::new(roi, SamplingPolicy::every_nth(config.sample_every));
        pipeline.interval_secs = config.sample_interval_secs;
        pipeline
    }

    /// 取消标志，每取一帧前检查，置位后以 `Cancelled` 结束
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn into_series(self) -> Series {
        self.series
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_frames_seen: self.total_frames_seen,
            sampled_frame_count: self.sampled_frame_count,
            skipped_count: self.no_detection_count + self.invalid_format_count,
            no_detection_count: self.no_detection_count,
            invalid_format_count: self.invalid_format_count,
            frame_rate: self.frame_rate,
        }
    }

    /// 先用 `open` 打开视频源，再完整处理
    pub fn process_with<S, F>(
        &mut self,
        open: F,
        recognizer: &dyn Recognizer,
    ) -> Result<&Series, ExtractionFailure>
    where
        S: VideoSource,
        F: FnOnce() -> Result<S, ExtractionError>,
    {
        if self.state != PipelineState::Idle {
            return Err(self.reject_restart());
        }

        match open() {
            Ok(source) => self.process(source, recognizer),
            Err(e) => {
                error!("❌ Failed to open video source: {}", e);
                Err(self.fail(e))
            }
        }
    }

    /// 逐帧读取视频源，按配置采样并识别
    pub fn process<S: VideoSource>(
        &mut self,
        mut source: S,
        recognizer: &dyn Recognizer,
    ) -> Result<&Series, ExtractionFailure> {
        if self.state != PipelineState::Idle {
            return Err(self.reject_restart());
        }

        self.state = PipelineState::Running;
        self.frame_rate = source.frame_rate();
        if let Some(interval) = self.interval_secs {
            self.sampling = SamplingPolicy::from_interval(interval, self.frame_rate);
        }
        info!(
            "🎬 Extraction started: roi={}, every {} frames, recognizer={}",
            self.roi,
            self.sampling.every(),
            recognizer.name()
        );

        let result = self.run_frames(&mut source, recognizer);
        source.close();

        match result {
            Ok(()) => {
                self.frame_rate = source.frame_rate();
                self.state = PipelineState::Completed;
                let summary = self.summary();
                info!(
                    "✅ Extraction complete: {} frames seen, {} sampled, {} skipped",
                    summary.total_frames_seen, summary.sampled_frame_count, summary.skipped_count
                );
                Ok(&self.series)
            }
            Err(e) => {
                error!(
                    "❌ Extraction failed after {} frames: {}",
                    self.total_frames_seen, e
                );
                Err(self.fail(e))
            }
        }
    }

    fn run_frames<S: VideoSource>(
        &mut self,
        source: &mut S,
        recognizer: &dyn Recognizer,
    ) -> Result<(), ExtractionError> {
        loop {
            if self.is_cancelled() {
                return Err(ExtractionError::Cancelled);
            }

            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };
            self.total_frames_seen += 1;

            if !self.sampling.next_frame() {
                continue;
            }
            self.process_sample(&frame, recognizer)?;
        }
    }

    fn process_sample(
        &mut self,
        frame: &Frame,
        recognizer: &dyn Recognizer,
    ) -> Result<(), ExtractionError> {
        let crop = self.preprocessor.crop(frame, &self.roi)?;

        self.sampled_frame_count += 1;
        debug!(
            "Reading frame: {} (#{} at {:.3}s)",
            self.sampled_frame_count, frame.frame_number, frame.timestamp_secs
        );

        let candidates = recognizer.recognize(&crop)?;

        let value = match self.validator.classify(&candidates) {
            Validation::Accepted(value) => Some(value),
            Validation::NoDetection => {
                self.no_detection_count += 1;
                debug!("No text detected in frame #{}", frame.frame_number);
                None
            }
            Validation::InvalidFormat(text) => {
                self.invalid_format_count += 1;
                warn!(
                    "⚠️ Rejected non-numeric text {:?} in frame #{}",
                    text, frame.frame_number
                );
                None
            }
        };

        if let Some(last) = self.series.last_timestamp() {
            if frame.timestamp_secs < last {
                warn!(
                    "⚠️ Timestamp went backwards at frame #{}: {:.3}s < {:.3}s",
                    frame.frame_number, frame.timestamp_secs, last
                );
            }
        }

        self.series.push(Reading::new(frame.timestamp_secs, value));
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn fail(&mut self, error: ExtractionError) -> ExtractionFailure {
        self.state = PipelineState::Failed;
        self.series.mark_partial();
        ExtractionFailure {
            error,
            partial: self.series.clone(),
        }
    }

    fn reject_restart(&self) -> ExtractionFailure {
        ExtractionFailure {
            error: ExtractionError::AlreadyStarted,
            partial: self.series.clone(),
        }
    }
}
