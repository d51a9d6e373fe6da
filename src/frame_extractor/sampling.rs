//! 采样策略

/// 固定间隔帧采样
///
/// 每 `every` 帧取一帧，第一帧为 `every - 1`（默认即第 6 帧）。
/// 间隔按帧数计算而非时长，需要按秒采样时用
/// [`SamplingPolicy::from_interval`] 结合帧率换算。
#[derive(Debug, Clone)]
pub struct SamplingPolicy {
    every: u64,
    frame_counter: u64,
}

impl SamplingPolicy {
    pub const DEFAULT_EVERY: u64 = 6;

    pub fn new() -> Self {
        Self::every_nth(Self::DEFAULT_EVERY)
    }

    /// `every` 为 0 时按 1 处理（逐帧采样）
    pub fn every_nth(every: u64) -> Self {
        Self {
            every: every.max(1),
            frame_counter: 0,
        }
    }

    /// 间隔 `round(interval_secs * fps)` 帧，至少 1
    pub fn from_interval(interval_secs: f64, fps: f64) -> Self {
        let frames = (interval_secs * fps).round();
        let every = if frames.is_finite() && frames >= 1.0 {
            frames as u64
        } else {
            1
        };
        Self::every_nth(every)
    }

    /// 计数器从 `frame_index` 开始，用于分段提取的后续区间
    pub fn starting_at(mut self, frame_index: u64) -> Self {
        self.frame_counter = frame_index;
        self
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn should_sample(&self, frame_index: u64) -> bool {
        frame_index % self.every == self.every - 1
    }

    /// 计数加一，返回当前帧是否需要采样
    pub fn next_frame(&mut self) -> bool {
        let index = self.frame_counter;
        self.frame_counter += 1;
        self.should_sample(index)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::new()
    }
}
