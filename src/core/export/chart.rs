use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::core::export::font::{self, draw_text};
use crate::frame_extractor::series::Series;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 24;
const MARGIN_TOP: u32 = 44;
const MARGIN_BOTTOM: u32 = 56;
const TICKS: u32 = 5;
const MIN_WIDTH: u32 = 240;
const MIN_HEIGHT: u32 = 180;

/// Line chart of values against 1-based sample index.
///
/// Missing values stay `None` and break the line; nothing is interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<Option<f64>>,
    pub grid: bool,
}

impl LineChart {
    pub fn from_series(series: &Series) -> Self {
        Self {
            title: "Values per Frame".to_string(),
            x_label: "Frame".to_string(),
            y_label: "Value".to_string(),
            points: series.iter().map(|r| r.numeric()).collect(),
            grid: true,
        }
    }

    /// Runs of consecutive present points as `(sample_index, value)`.
    pub fn segments(&self) -> Vec<Vec<(f64, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();

        for (i, point) in self.points.iter().enumerate() {
            match point {
                Some(v) => current.push(((i + 1) as f64, *v)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    fn x_range(&self) -> (f64, f64) {
        if self.points.len() <= 1 {
            (0.0, 2.0)
        } else {
            (1.0, self.points.len() as f64)
        }
    }

    /// x 轴刻度：整数样本序号，样本多时按步长抽稀
    pub fn x_ticks(&self) -> Vec<usize> {
        let n = self.points.len();
        if n <= 1 {
            return vec![1];
        }
        let step = (n - 1).div_ceil(TICKS as usize).max(1);
        (1..=n).step_by(step).collect()
    }

    fn y_range(&self) -> (f64, f64) {
        let values = self.points.iter().flatten();
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

        if !lo.is_finite() {
            return (0.0, 1.0);
        }
        if (hi - lo).abs() < f64::EPSILON {
            return (lo - 1.0, hi + 1.0);
        }
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    }

    pub fn render(&self, width: u32, height: u32) -> RgbImage {
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        let plot_w = width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = height - MARGIN_TOP - MARGIN_BOTTOM;
        let (x_min, x_max) = self.x_range();
        let (y_min, y_max) = self.y_range();

        let to_px = |x: f64, y: f64| -> (f32, f32) {
            let px = MARGIN_LEFT as f64 + (x - x_min) / (x_max - x_min) * plot_w as f64;
            let py = (MARGIN_TOP + plot_h) as f64 - (y - y_min) / (y_max - y_min) * plot_h as f64;
            (px as f32, py as f32)
        };

        let top = MARGIN_TOP as f32;
        let bottom = (MARGIN_TOP + plot_h) as f32;
        let left = MARGIN_LEFT as f32;
        let right = (MARGIN_LEFT + plot_w) as f32;

        for index in self.x_ticks() {
            let (gx, _) = to_px(index as f64, y_min);
            if self.grid {
                draw_line_segment_mut(&mut canvas, (gx, top), (gx, bottom), GRID);
            }
            let label = index.to_string();
            let label_x = gx as i32 - font::text_width(&label, 1) as i32 / 2;
            draw_text(&mut canvas, label_x, (MARGIN_TOP + plot_h + 6) as i32, &label, 1, AXIS);
        }

        for i in 0..=TICKS {
            let y_value = y_min + (i as f64 / TICKS as f64) * (y_max - y_min);
            let (_, gy) = to_px(x_min, y_value);
            if self.grid {
                draw_line_segment_mut(&mut canvas, (left, gy), (right, gy), GRID);
            }
            let label = format_tick(y_value, y_max - y_min);
            let label_x = MARGIN_LEFT as i32 - 6 - font::text_width(&label, 1) as i32;
            draw_text(&mut canvas, label_x, gy as i32 - 3, &label, 1, AXIS);
        }

        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(MARGIN_LEFT as i32, MARGIN_TOP as i32).of_size(plot_w, plot_h),
            AXIS,
        );

        for segment in self.segments() {
            if let [only] = segment.as_slice() {
                let (px, py) = to_px(only.0, only.1);
                draw_filled_circle_mut(&mut canvas, (px as i32, py as i32), 2, LINE);
                continue;
            }
            for pair in segment.windows(2) {
                let start = to_px(pair[0].0, pair[0].1);
                let end = to_px(pair[1].0, pair[1].1);
                draw_line_segment_mut(&mut canvas, start, end, LINE);
            }
        }

        self.draw_labels(&mut canvas, width, height);
        canvas
    }

    fn draw_labels(&self, canvas: &mut RgbImage, width: u32, height: u32) {
        let title_w = font::text_width(&self.title, 2);
        draw_text(canvas, (width.saturating_sub(title_w) / 2) as i32, 14, &self.title, 2, AXIS);

        let x_label_w = font::text_width(&self.x_label, 2);
        let x_label_x = MARGIN_LEFT + (width - MARGIN_LEFT - MARGIN_RIGHT).saturating_sub(x_label_w) / 2;
        draw_text(canvas, x_label_x as i32, (height - 22) as i32, &self.x_label, 2, AXIS);

        // y label stacked vertically, centred on the plot area
        let line_h = font::text_height(2) + 4;
        let label_h = line_h * self.y_label.chars().count() as u32;
        let mut y = MARGIN_TOP + (height - MARGIN_TOP - MARGIN_BOTTOM).saturating_sub(label_h) / 2;
        for c in self.y_label.chars() {
            draw_text(canvas, 10, y as i32, &c.to_string(), 2, AXIS);
            y += line_h;
        }
    }
}

fn format_tick(value: f64, span: f64) -> String {
    let text = if span >= 10.0 {
        format!("{:.0}", value)
    } else if span >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    };
    // avoid "-0"
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        text.trim_start_matches('-').to_string()
    } else {
        text
    }
}
