//! 分段并行提取：每个不相交的帧区间一条流水线，结果按时间戳合并

use log::{info, warn};
use rayon::prelude::*;

use crate::core::ocr::Recognizer;
use crate::core::video::{Roi, VideoSource};
use crate::frame_extractor::pipeline::{ExtractionFailure, ExtractionPipeline, RunSummary};
use crate::frame_extractor::sampling::SamplingPolicy;
use crate::frame_extractor::series::Series;

/// 分段提取的合并结果
#[derive(Debug)]
pub struct PartitionedRun {
    pub series: Series,
    pub summary: RunSummary,
}

/// 默认区间数：CPU 核数
pub fn default_partitions() -> usize {
    num_cpus::get().max(1)
}

/// Run one pipeline per `(start_frame_index, source)` range in parallel.
///
/// Each range's sampling counter starts at its first global frame index, so the
/// sampled frames match a sequential run over the whole source. Ranges must be
/// disjoint and given in frame order. On failure the error of the earliest
/// failing range is returned; its partial series holds the ranges before it
/// plus what that range read, the same readings a sequential run would keep.
pub fn extract_partitioned<S>(
    roi: Roi,
    every: u64,
    ranges: Vec<(u64, S)>,
    recognizer: &dyn Recognizer,
) -> Result<PartitionedRun, ExtractionFailure>
where
    S: VideoSource,
{
    info!("🧵 Extracting {} frame ranges in parallel", ranges.len());

    let outcomes: Vec<(Series, RunSummary, Option<ExtractionFailure>)> = ranges
        .into_par_iter()
        .map(|(start, source)| {
            let sampling = SamplingPolicy::every_nth(every).starting_at(start);
            let mut pipeline = ExtractionPipeline::new(roi, sampling);
            let failure = pipeline.process(source, recognizer).err();
            let summary = pipeline.summary();
            (pipeline.into_series(), summary, failure)
        })
        .collect();

    let mut parts = Vec::with_capacity(outcomes.len());
    let mut summary = RunSummary::default();

    // 按区间顺序合并；第一个失败区间之后的结果全部丢弃
    for (series, part_summary, failure) in outcomes {
        parts.push(series);
        summary = summary.combine(part_summary);
        if let Some(failure) = failure {
            warn!("⚠️ Frame range failed, later ranges discarded: {}", failure.error);
            return Err(ExtractionFailure {
                error: failure.error,
                partial: Series::merge(parts),
            });
        }
    }

    Ok(PartitionedRun {
        series: Series::merge(parts),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ExtractionError;
    use crate::core::ocr::MockRecognizer;
    use crate::core::video::SyntheticVideoSource;

    fn ranges(total: u64, bounds: &[u64]) -> Vec<(u64, SyntheticVideoSource)> {
        let mut starts = vec![0];
        starts.extend_from_slice(bounds);
        let mut ends = bounds.to_vec();
        ends.push(total);

        starts
            .into_iter()
            .zip(ends)
            .map(|(start, end)| (start, SyntheticVideoSource::new(32, 32, total, 30.0).range(start, end)))
            .collect()
    }

    #[test]
    fn test_matches_sequential_run() {
        let roi = Roi::new(0, 0, 16, 16);
        let recognizer = MockRecognizer::constant("7");

        let mut sequential = ExtractionPipeline::new(roi, SamplingPolicy::default());
        let expected = sequential
            .process(SyntheticVideoSource::new(32, 32, 100, 30.0), &recognizer)
            .unwrap()
            .clone();

        let run = extract_partitioned(roi, 6, ranges(100, &[13, 50, 77]), &recognizer).unwrap();
        assert_eq!(run.series, expected);
        assert_eq!(run.summary.total_frames_seen, 100);
        assert_eq!(run.summary.sampled_frame_count, 16);
        assert_eq!(run.summary.frame_rate, 30.0);
    }

    #[test]
    fn test_failure_merges_partial() {
        let roi = Roi::new(0, 0, 16, 16);
        let mut parts = ranges(60, &[30]);
        parts[1].1 = SyntheticVideoSource::new(32, 32, 60, 30.0)
            .range(30, 60)
            .failing_at(45);

        let failure =
            extract_partitioned(roi, 6, parts, &MockRecognizer::constant("1")).unwrap_err();
        assert!(matches!(failure.error, ExtractionError::Source(_)));
        // 5 from the first range, 2 (frames 35 and 41) from the second
        assert_eq!(failure.partial.len(), 7);
        assert!(failure.partial.is_partial());
    }

    #[test]
    fn test_failure_drops_later_ranges() {
        let roi = Roi::new(0, 0, 16, 16);
        let recognizer = MockRecognizer::constant("2");

        let mut sequential = ExtractionPipeline::new(roi, SamplingPolicy::default());
        let expected = sequential
            .process(SyntheticVideoSource::new(32, 32, 60, 30.0).failing_at(8), &recognizer)
            .unwrap_err()
            .partial;
        assert_eq!(expected.len(), 1);

        let mut parts = ranges(60, &[30]);
        parts[0].1 = SyntheticVideoSource::new(32, 32, 60, 30.0)
            .range(0, 30)
            .failing_at(8);

        let failure = extract_partitioned(roi, 6, parts, &recognizer).unwrap_err();
        assert_eq!(failure.partial, expected);
        assert!(failure
            .partial
            .iter()
            .all(|r| r.timestamp_secs < 8.0 / 30.0));
    }

    #[test]
    fn test_default_partitions() {
        assert!(default_partitions() >= 1);
    }
}
