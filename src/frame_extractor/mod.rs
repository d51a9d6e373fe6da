//! 数值帧提取器 - 从视频固定区域中提取数值时间序列
//!
//! 核心流程：
//! 1. 固定间隔采样 - 每 N 帧取一帧送识别（识别是最耗时的一步）
//! 2. 裁剪 + 灰度化 - 只把 ROI 交给识别器
//! 3. 数值校验 - 只接受数字和小数分隔符，其余记为缺失
//! 4. 序列统计 - 均值/最小/最大均忽略缺失值

pub mod partition;
pub mod pipeline;
pub mod sampling;
pub mod series;

pub use partition::{default_partitions, extract_partitioned, PartitionedRun};
pub use pipeline::{ExtractionConfig, ExtractionFailure, ExtractionPipeline, PipelineState, RunSummary};
pub use sampling::SamplingPolicy;
pub use series::{Reading, Series};
