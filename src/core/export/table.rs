use std::io::Write;

use crate::frame_extractor::series::Series;

pub const TABLE_HEADER: [&str; 2] = ["time_stamp_in_sec", "value_per_frame"];

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Rounded to two decimals.
    pub timestamp_secs: f64,
    pub value: Option<String>,
}

/// 序列的两列表格视图，每个读数一行
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    pub rows: Vec<TableRow>,
}

impl SeriesTable {
    pub fn from_series(series: &Series) -> Self {
        let rows = series
            .iter()
            .map(|reading| TableRow {
                timestamp_secs: reading.rounded_timestamp(),
                value: reading.value.clone(),
            })
            .collect();
        Self { rows }
    }

    pub fn header(&self) -> [&'static str; 2] {
        TABLE_HEADER
    }

    /// 写出 CSV（`\n` 换行），缺失值写为 `missing_marker`
    pub fn write_csv<W: Write>(&self, writer: &mut W, missing_marker: &str) -> std::io::Result<()> {
        writeln!(writer, "{},{}", TABLE_HEADER[0], TABLE_HEADER[1])?;
        for row in &self.rows {
            let value = row.value.as_deref().unwrap_or(missing_marker);
            writeln!(writer, "{:.2},{}", row.timestamp_secs, escape_csv(value))?;
        }
        Ok(())
    }

    pub fn to_csv_string(&self, missing_marker: &str) -> String {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_csv(&mut buffer, missing_marker);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// 含分隔符或引号的字段加引号
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
