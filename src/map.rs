//! Two-panel choropleth figure: tier-coloured area map on the left, bar
//! chart of the leading regions on the right.

use std::ops::Range;
use std::path::Path;

use geo::Rect;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{ReportError, Result};
use crate::geometry::{self, AreaShape};
use crate::plots::{self, Category, ColoredBar};

/// An area and the tier it was classified into.
#[derive(Debug, Clone)]
pub struct TieredArea {
    pub shape: AreaShape,
    pub tier: String,
}

#[derive(Debug, Clone)]
pub struct ChoroplethStyle {
    pub map_title: String,
    pub legend_title: String,
    pub bar_title: String,
    pub bar_x_label: String,
    /// Tier labels and colours, in legend order.
    pub tiers: Vec<Category>,
    pub width: u32,
    pub height: u32,
    /// Share of the width given to the map panel.
    pub map_fraction: f64,
}

impl Default for ChoroplethStyle {
    fn default() -> Self {
        Self {
            map_title: String::new(),
            legend_title: String::new(),
            bar_title: String::new(),
            bar_x_label: String::new(),
            tiers: Vec::new(),
            width: 2400,
            height: 1300,
            map_fraction: 0.6,
        }
    }
}

pub fn tier_color(tiers: &[Category], tier: &str) -> Result<RGBColor> {
    tiers
        .iter()
        .find(|c| c.label == tier)
        .map(|c| c.color)
        .ok_or_else(|| ReportError::Validation(format!("no colour configured for tier '{tier}'")))
}

/// Grow `extent` along one axis so its aspect ratio matches a `width` x
/// `height` pixel panel, keeping it centred.
pub fn fit_extent(extent: Rect<f64>, width: u32, height: u32) -> (Range<f64>, Range<f64>) {
    let (min, max) = (extent.min(), extent.max());
    let mut dx = (max.x - min.x).max(f64::EPSILON);
    let mut dy = (max.y - min.y).max(f64::EPSILON);
    let panel = width.max(1) as f64 / height.max(1) as f64;

    if dx / dy < panel {
        dx = dy * panel;
    } else {
        dy = dx / panel;
    }
    let cx = (min.x + max.x) / 2.0;
    let cy = (min.y + max.y) / 2.0;
    (cx - dx / 2.0..cx + dx / 2.0, cy - dy / 2.0..cy + dy / 2.0)
}

/// Render the figure to a PNG file.
pub fn choropleth_figure(
    areas: &[TieredArea],
    bars: &[ColoredBar],
    style: &ChoroplethStyle,
    output_path: &Path,
) -> Result<()> {
    plots::validate_bars(bars)?;
    for area in areas {
        tier_color(&style.tiers, &area.tier)?;
    }
    let extent = geometry::extent(areas.iter().map(|a| &a.shape))
        .ok_or_else(|| ReportError::InvalidData("boundaries contain no coordinates".to_string()))?;

    let root = BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(ReportError::plot)?;

    let map_width = (style.width as f64 * style.map_fraction.clamp(0.1, 0.9)) as u32;
    let (left, right) = root.split_horizontally(map_width);

    draw_map(&left, areas, extent, style)?;
    plots::draw_bar_panel(&right, bars, &style.bar_title, &style.bar_x_label)?;

    root.present().map_err(ReportError::plot)?;
    Ok(())
}

fn draw_map<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    areas: &[TieredArea],
    extent: Rect<f64>,
    style: &ChoroplethStyle,
) -> Result<()> {
    let titled = area
        .titled(&style.map_title, ("sans-serif", 26))
        .map_err(ReportError::plot)?;
    let (legend, body) = titled.split_vertically(60);
    plots::draw_legend(&legend, &style.legend_title, &style.tiers)?;

    let (w, h) = body.dim_in_pixel();
    let margin = 20;
    let (x_range, y_range) = fit_extent(
        extent,
        w.saturating_sub(2 * margin),
        h.saturating_sub(2 * margin),
    );

    let mut chart = ChartBuilder::on(&body)
        .margin(margin)
        .build_cartesian_2d(x_range, y_range)
        .map_err(ReportError::plot)?;

    for tiered in areas {
        let color = tier_color(&style.tiers, &tiered.tier)?;
        for polygon in tiered.shape.polygons.iter() {
            let exterior: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
            if exterior.len() < 3 {
                continue;
            }
            chart
                .draw_series(std::iter::once(Polygon::new(exterior.clone(), color.filled())))
                .map_err(ReportError::plot)?;

            let outlines = std::iter::once(exterior).chain(
                polygon
                    .interiors()
                    .iter()
                    .map(|ring| ring.coords().map(|c| (c.x, c.y)).collect::<Vec<_>>()),
            );
            chart
                .draw_series(outlines.map(|ring| PathElement::new(ring, BLACK.stroke_width(1))))
                .map_err(ReportError::plot)?;
        }
    }
    Ok(())
}
