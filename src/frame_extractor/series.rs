//! 读数序列与统计（均值/最小/最大，忽略缺失值）

use serde::Serialize;

use crate::core::error::StatsError;

/// 单个采样帧的读数：时间戳 + 通过校验的文本，缺失为 `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp_secs: f64,
    pub value: Option<String>,
}

impl Reading {
    pub fn new(timestamp_secs: f64, value: Option<String>) -> Self {
        Self {
            timestamp_secs,
            value,
        }
    }

    pub fn missing(timestamp_secs: f64) -> Self {
        Self::new(timestamp_secs, None)
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// 统计用数值，无法解析的按缺失处理
    pub fn numeric(&self) -> Option<f64> {
        self.value.as_deref().and_then(parse_numeric)
    }

    /// 保留两位小数的时间戳（与导出一致）
    pub fn rounded_timestamp(&self) -> f64 {
        (self.timestamp_secs * 100.0).round() / 100.0
    }
}

/// 解析已校验的数值文本
///
/// 含 '.' 时逗号视为千分位；不含时单个逗号是小数点，多个逗号是千分位。
pub fn parse_numeric(token: &str) -> Option<f64> {
    let commas = token.matches(',').count();
    let normalized = if token.contains('.') || commas > 1 {
        token.replace(',', "")
    } else {
        token.replace(',', ".")
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 一次运行的有序读数序列
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    readings: Vec<Reading>,
    partial: bool,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            partial: false,
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.readings.last().map(|r| r.timestamp_secs)
    }

    /// 产生该序列的运行是否中途失败
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub(crate) fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn missing_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_missing()).count()
    }

    /// 合并不相交帧区间的序列，按时间戳排序
    pub fn merge(parts: Vec<Series>) -> Series {
        let partial = parts.iter().any(|s| s.partial);
        let mut readings: Vec<Reading> = parts.into_iter().flat_map(|s| s.readings).collect();
        readings.sort_by(|a, b| a.timestamp_secs.total_cmp(&b.timestamp_secs));
        Series { readings, partial }
    }

    fn numeric_values(&self) -> Result<Vec<(usize, f64)>, StatsError> {
        if self.readings.is_empty() {
            return Err(StatsError::EmptySeries);
        }
        let values: Vec<(usize, f64)> = self
            .readings
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.numeric().map(|v| (i, v)))
            .collect();
        if values.is_empty() {
            return Err(StatsError::AllMissing);
        }
        Ok(values)
    }

    /// 非缺失值的均值
    pub fn average(&self) -> Result<f64, StatsError> {
        let values = self.numeric_values()?;
        Ok(values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64)
    }

    /// 最小值，相同时取最先出现的
    pub fn min(&self) -> Result<&Reading, StatsError> {
        self.extreme(|candidate, current| candidate < current)
    }

    /// 最大值，相同时取最先出现的
    pub fn max(&self) -> Result<&Reading, StatsError> {
        self.extreme(|candidate, current| candidate > current)
    }

    fn extreme(&self, better: impl Fn(f64, f64) -> bool) -> Result<&Reading, StatsError> {
        let values = self.numeric_values()?;
        let (index, _) = values
            .into_iter()
            .reduce(|current, candidate| {
                if better(candidate.1, current.1) {
                    candidate
                } else {
                    current
                }
            })
            .ok_or(StatsError::AllMissing)?;
        Ok(&self.readings[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reading(t: f64, value: Option<&str>) -> Reading {
        Reading::new(t, value.map(str::to_string))
    }

    fn sample_series() -> Series {
        Series::from_readings(vec![
            reading(0.2, Some("10")),
            reading(0.4, None),
            reading(0.6, Some("20")),
        ])
    }

    #[test]
    fn test_average_skips_missing() {
        assert_relative_eq!(sample_series().average().unwrap(), 15.0);
    }

    #[test]
    fn test_min_max_skip_missing() {
        let series = sample_series();
        assert_eq!(series.min().unwrap().value.as_deref(), Some("10"));
        assert_eq!(series.max().unwrap().value.as_deref(), Some("20"));
    }

    #[test]
    fn test_stats_errors() {
        let empty = Series::new();
        assert_eq!(empty.average(), Err(StatsError::EmptySeries));
        assert_eq!(empty.min().unwrap_err(), StatsError::EmptySeries);

        let all_missing = Series::from_readings(vec![reading(0.1, None), reading(0.2, None)]);
        assert_eq!(all_missing.average(), Err(StatsError::AllMissing));
        assert_eq!(all_missing.max().unwrap_err(), StatsError::AllMissing);
    }

    #[test]
    fn test_ties_return_first_occurrence() {
        let series = Series::from_readings(vec![
            reading(0.1, Some("05")),
            reading(0.2, Some("9")),
            reading(0.3, Some("5")),
            reading(0.4, Some("09")),
        ]);
        let min = series.min().unwrap();
        assert_eq!(min.value.as_deref(), Some("05"));
        assert_eq!(min.timestamp_secs, 0.1);
        assert_eq!(series.max().unwrap().timestamp_secs, 0.2);
    }

    #[test]
    fn test_parse_numeric_separators() {
        assert_eq!(parse_numeric("045"), Some(45.0));
        assert_eq!(parse_numeric("12.5"), Some(12.5));
        assert_eq!(parse_numeric("12,5"), Some(12.5));
        assert_eq!(parse_numeric("1,250.5"), Some(1250.5));
        assert_eq!(parse_numeric("1,000,000"), Some(1_000_000.0));
        assert_eq!(parse_numeric("1.2.3"), None);
    }

    #[test]
    fn test_unparseable_tokens_are_missing_for_stats() {
        let series = Series::from_readings(vec![reading(0.1, Some("1.2.3")), reading(0.2, Some("4"))]);
        assert_relative_eq!(series.average().unwrap(), 4.0);

        let series = Series::from_readings(vec![reading(0.1, Some("1.2.3"))]);
        assert_eq!(series.average(), Err(StatsError::AllMissing));
    }

    #[test]
    fn test_rounded_timestamp() {
        assert_eq!(reading(0.166666, None).rounded_timestamp(), 0.17);
        assert_eq!(reading(1.0, None).rounded_timestamp(), 1.0);
    }

    #[test]
    fn test_merge_orders_by_timestamp() {
        let mut late = Series::from_readings(vec![reading(2.0, Some("3")), reading(3.0, None)]);
        late.mark_partial();
        let early = Series::from_readings(vec![reading(0.5, Some("1")), reading(1.0, Some("2"))]);

        let merged = Series::merge(vec![late, early]);
        let timestamps: Vec<f64> = merged.iter().map(|r| r.timestamp_secs).collect();
        assert_eq!(timestamps, vec![0.5, 1.0, 2.0, 3.0]);
        assert!(merged.is_partial());
        assert_eq!(merged.missing_count(), 1);
    }
}
