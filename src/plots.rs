//! PNG bar charts drawn with [`plotters`].
//!
//! Two chart shapes are provided:
//! - stacked horizontal bars of category percentages (0-100 axis) with a
//!   right-hand annotation per row and a category legend;
//! - plain horizontal bars with a per-bar colour and value label, used as
//!   the right panel of the choropleth figure.
//!
//! Inputs are validated before any drawing happens so bad tables fail
//! without leaving a half-written image behind.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::error::{ReportError, Result};

const FONT: &str = "sans-serif";

/// A chart category: legend label and fill colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub color: RGBColor,
}

/// One stacked bar: row label, one percentage per category, and the text
/// written to the right of the bar.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedRow {
    pub label: String,
    pub values: Vec<f64>,
    pub annotation: String,
}

#[derive(Debug, Clone)]
pub struct StackedChartStyle {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub legend_title: String,
    pub categories: Vec<Category>,
    /// Segments narrower than this (in percentage points) get no label.
    pub min_label_width: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for StackedChartStyle {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            legend_title: String::new(),
            categories: Vec::new(),
            min_label_width: 3.0,
            width: 1600,
            height: 900,
        }
    }
}

fn validate_stacked(rows: &[StackedRow], style: &StackedChartStyle) -> Result<()> {
    if rows.is_empty() {
        return Err(ReportError::InvalidData("no rows to plot".to_string()));
    }
    if style.categories.is_empty() {
        return Err(ReportError::InvalidData("no categories to plot".to_string()));
    }
    for row in rows {
        if row.values.len() != style.categories.len() {
            return Err(ReportError::Validation(format!(
                "row '{}' has {} values for {} categories",
                row.label,
                row.values.len(),
                style.categories.len()
            )));
        }
        if row.values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ReportError::InvalidData(format!(
                "row '{}' has a negative or undefined share",
                row.label
            )));
        }
    }
    Ok(())
}

/// Segment label positions for one row: `(centre, text)` for every segment
/// wider than `min_width`.
pub fn segment_labels(values: &[f64], min_width: f64) -> Vec<(f64, String)> {
    let mut left = 0.0;
    let mut labels = Vec::new();
    for &width in values {
        if width > min_width {
            labels.push((left + width / 2.0, format!("{:.1}%", width)));
        }
        left += width;
    }
    labels
}

/// Row `i` of `n` sits in segment `n - 1 - i` so the first row is drawn on top.
fn slot(i: usize, n: usize) -> usize {
    n - 1 - i
}

/// Render a stacked composition chart to a PNG file.
pub fn stacked_composition_chart(
    rows: &[StackedRow],
    style: &StackedChartStyle,
    output_path: &Path,
) -> Result<()> {
    validate_stacked(rows, style)?;

    let root = BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
    draw_stacked(&root, rows, style)?;
    root.present().map_err(ReportError::plot)?;
    Ok(())
}

fn draw_stacked<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[StackedRow],
    style: &StackedChartStyle,
) -> Result<()> {
    root.fill(&WHITE).map_err(ReportError::plot)?;

    let n = rows.len();
    let (body, footer) = root.split_vertically(style.height.saturating_sub(70));

    let mut chart = ChartBuilder::on(&body)
        .caption(&style.title, (FONT, 26))
        .margin(20)
        .margin_right(320)
        .x_label_area_size(50)
        .y_label_area_size(300)
        .build_cartesian_2d(0f64..100f64, (0..n).into_segmented())
        .map_err(ReportError::plot)?;

    let labels: Vec<&str> = rows.iter().rev().map(|r| r.label.as_str()).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(style.x_label.as_str())
        .y_desc(style.y_label.as_str())
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels.get(*i).map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        })
        .x_label_formatter(&|x| format!("{:.0}", x))
        .label_style((FONT, 16))
        .draw()
        .map_err(ReportError::plot)?;

    for (c, category) in style.categories.iter().enumerate() {
        let color = category.color;
        chart
            .draw_series(rows.iter().enumerate().map(|(i, row)| {
                let left: f64 = row.values[..c].iter().sum();
                let right = left + row.values[c];
                let s = slot(i, n);
                let mut bar = Rectangle::new(
                    [
                        (left, SegmentValue::Exact(s)),
                        (right, SegmentValue::Exact(s + 1)),
                    ],
                    color.filled(),
                );
                bar.set_margin(6, 6, 0, 0);
                bar
            }))
            .map_err(ReportError::plot)?;
    }

    let segment_style = TextStyle::from((FONT, 13).into_font())
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Center));
    for (i, row) in rows.iter().enumerate() {
        let s = slot(i, n);
        chart
            .draw_series(
                segment_labels(&row.values, style.min_label_width)
                    .into_iter()
                    .map(|(x, text)| Text::new(text, (x, SegmentValue::CenterOf(s)), segment_style.clone())),
            )
            .map_err(ReportError::plot)?;
    }

    // annotations sit in the right margin, outside the clipped plotting area
    let note_style = TextStyle::from((FONT, 15).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for (i, row) in rows.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(100.0, SegmentValue::CenterOf(slot(i, n))));
        root.draw(&Text::new(row.annotation.clone(), (x + 10, y), note_style.clone()))
            .map_err(ReportError::plot)?;
    }

    draw_legend(&footer, &style.legend_title, &style.categories)
}

/// Horizontal legend: title followed by one swatch per category.
pub fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    categories: &[Category],
) -> Result<()> {
    let text_style = TextStyle::from((FONT, 16).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    let y = 30;
    let mut x = 40;

    if !title.is_empty() {
        area.draw(&Text::new(format!("{title}:"), (x, y), text_style.clone()))
            .map_err(ReportError::plot)?;
        x += 12 * title.chars().count() as i32 + 20;
    }
    for category in categories {
        area.draw(&Rectangle::new([(x, y - 8), (x + 16, y + 8)], category.color.filled()))
            .map_err(ReportError::plot)?;
        area.draw(&Text::new(category.label.clone(), (x + 24, y), text_style.clone()))
            .map_err(ReportError::plot)?;
        x += 24 + 10 * category.label.chars().count() as i32 + 30;
    }
    Ok(())
}

// ── Plain horizontal bars ───────────────────────────────────────────────────

/// A single bar with its own colour.
#[derive(Debug, Clone, PartialEq)]
pub struct ColoredBar {
    pub label: String,
    pub value: f64,
    pub color: RGBColor,
}

pub fn validate_bars(bars: &[ColoredBar]) -> Result<()> {
    if bars.is_empty() {
        return Err(ReportError::InvalidData("no bars to plot".to_string()));
    }
    if let Some(bad) = bars.iter().find(|b| !b.value.is_finite()) {
        return Err(ReportError::InvalidData(format!(
            "bar '{}' has an undefined value",
            bad.label
        )));
    }
    Ok(())
}

/// Draw bars top to bottom in the given order, labelled `"{:.1}%"`.
///
/// The value axis runs five points past the largest bar to leave room for labels.
pub fn draw_bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    bars: &[ColoredBar],
    title: &str,
    x_label: &str,
) -> Result<()> {
    validate_bars(bars)?;

    let n = bars.len();
    let max = bars.iter().map(|b| b.value).fold(0.0, f64::max);
    let x_max = max.max(0.0) + 5.0;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(320)
        .build_cartesian_2d(0f64..x_max, (0..n).into_segmented())
        .map_err(ReportError::plot)?;

    let labels: Vec<&str> = bars.iter().rev().map(|b| b.label.as_str()).collect();
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(x_label)
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels.get(*i).map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        })
        .label_style((FONT, 15))
        .draw()
        .map_err(ReportError::plot)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            let s = slot(i, n);
            let mut rect = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(s)),
                    (bar.value.max(0.0), SegmentValue::Exact(s + 1)),
                ],
                bar.color.filled(),
            );
            rect.set_margin(5, 5, 0, 0);
            rect
        }))
        .map_err(ReportError::plot)?;

    let value_style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    let offset = 0.3;
    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            Text::new(
                format!("{:.1}%", bar.value),
                (bar.value.max(0.0) + offset, SegmentValue::CenterOf(slot(i, n))),
                value_style.clone(),
            )
        }))
        .map_err(ReportError::plot)?;

    Ok(())
}
