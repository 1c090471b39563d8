/// Visualization module: interactive horizontal bar chart.
///
/// Produces a self-contained HTML document with:
/// - One bar per region, largest first, filled on a continuous colour scale
/// - Value labels at the end of each bar
/// - A colour bar legend with low/high captions
/// - Hover tooltips driven by a small inline script
///
/// The SVG is laid out here; the script only positions the tooltip, so the
/// file renders without JavaScript as well.
use std::fmt::Write as FmtWrite;

use plotters::style::RGBColor;

use crate::error::{ReportError, Result};
use crate::palette;

const TOOLTIP_JS: &str = r##"(function () {
  var tip = document.getElementById("ca-tooltip");
  var data = JSON.parse(document.getElementById("ca-data").textContent);
  document.querySelectorAll("#ca-svg .bar").forEach(function (el) {
    el.addEventListener("mousemove", function (ev) {
      var d = data[+el.dataset.index];
      tip.textContent = d.label + ": " + d.text;
      tip.style.left = (ev.pageX + 12) + "px";
      tip.style.top = (ev.pageY + 12) + "px";
      tip.style.display = "block";
    });
    el.addEventListener("mouseleave", function () { tip.style.display = "none"; });
  });
})();"##;

// ── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the bar chart.
#[derive(Debug, Clone)]
pub struct BarChartConfig {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    /// Caption above the colour bar
    pub legend_title: String,
    /// Colour for the smallest value
    pub low_color: RGBColor,
    /// Colour for the largest value
    pub high_color: RGBColor,
    pub low_caption: String,
    pub high_caption: String,
    /// Appended to every value label
    pub value_suffix: String,
    pub decimals: usize,
    /// Fixed pixel height per bar
    pub bar_height_px: u32,
    /// Pixel width of the plotting area
    pub plot_width_px: u32,
}

impl Default for BarChartConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_title: String::new(),
            y_title: String::new(),
            legend_title: String::new(),
            low_color: RGBColor(0xde, 0xeb, 0xf7),
            high_color: RGBColor(0x08, 0x30, 0x6b),
            low_caption: "Low".to_string(),
            high_caption: "High".to_string(),
            value_suffix: "%".to_string(),
            decimals: 2,
            bar_height_px: 24,
            plot_width_px: 640,
        }
    }
}

/// One bar: category label and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

// ── Layout ──────────────────────────────────────────────────────────────────

const MARGIN_LEFT: u32 = 280;
const MARGIN_TOP: u32 = 70;
const MARGIN_RIGHT: u32 = 220;
const MARGIN_BOTTOM: u32 = 70;
const BAR_GAP: u32 = 6;
const TICKS: usize = 5;

struct LaidOutBar<'a> {
    bar: &'a Bar,
    y: u32,
    width: f64,
    fill: RGBColor,
    text: String,
}

fn format_value(value: f64, config: &BarChartConfig) -> String {
    format!("{:.*}{}", config.decimals, value, config.value_suffix)
}

fn layout<'a>(bars: &'a [Bar], config: &BarChartConfig, x_max: f64) -> Vec<LaidOutBar<'a>> {
    let min = bars.iter().map(|b| b.value).fold(f64::INFINITY, f64::min);
    let max = bars.iter().map(|b| b.value).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let t = if span > 0.0 { (bar.value - min) / span } else { 1.0 };
            LaidOutBar {
                bar,
                y: MARGIN_TOP + i as u32 * (config.bar_height_px + BAR_GAP),
                width: bar.value.max(0.0) / x_max * config.plot_width_px as f64,
                fill: palette::lerp(&config.low_color, &config.high_color, t),
                text: format_value(bar.value, config),
            }
        })
        .collect()
}

/// Axis maximum: the largest value with headroom for the labels.
fn axis_max(bars: &[Bar]) -> f64 {
    let max = bars.iter().map(|b| b.value).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.15
    } else {
        1.0
    }
}

// ── HTML generation ─────────────────────────────────────────────────────────

/// Main entry point: generates a self-contained HTML document.
///
/// Bars are drawn in the order given, top to bottom.
pub fn generate_bar_chart_html(bars: &[Bar], config: &BarChartConfig) -> Result<String> {
    if bars.is_empty() {
        return Err(ReportError::InvalidData("no bars to draw".to_string()));
    }
    if let Some(bad) = bars.iter().find(|b| !b.value.is_finite()) {
        return Err(ReportError::InvalidData(format!(
            "bar '{}' has a non-finite value",
            bad.label
        )));
    }

    let x_max = axis_max(bars);
    let laid_out = layout(bars, config, x_max);

    let plot_height = bars.len() as u32 * (config.bar_height_px + BAR_GAP);
    let width = MARGIN_LEFT + config.plot_width_px + MARGIN_RIGHT;
    let height = MARGIN_TOP + plot_height + MARGIN_BOTTOM;
    let axis_y = MARGIN_TOP + plot_height;

    let mut svg = String::new();
    write_bars(&mut svg, &laid_out, config);
    write_axis(&mut svg, config, x_max, axis_y, plot_height);
    write_colorbar(&mut svg, bars, config, plot_height);

    let html = format!(
        r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{ font-family: sans-serif; margin: 16px; color: #212529; }}
  .bar {{ cursor: pointer; }}
  .bar:hover {{ stroke: #212529; stroke-width: 1.5; }}
  .bar-label {{ font-size: 12px; fill: #495057; text-anchor: end; }}
  .value-label {{ font-size: 11px; fill: #212529; }}
  .tick-label {{ font-size: 10px; fill: #868e96; text-anchor: middle; }}
  .axis-title {{ font-size: 13px; fill: #212529; text-anchor: middle; }}
  #ca-tooltip {{ position: absolute; display: none; padding: 4px 8px; background: #fff;
                border: 1px solid #adb5bd; border-radius: 4px; font-size: 12px; pointer-events: none; }}
</style>
</head>
<body>
<svg id="ca-svg" xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">
  <text x="{title_x}" y="30" class="axis-title" style="font-size:18px;">{title}</text>
{svg}</svg>
<div id="ca-tooltip"></div>
<script type="application/json" id="ca-data">{data_json}</script>
<script>
{tooltip_js}
</script>
</body>
</html>
"##,
        title = escape_html(&config.title),
        width = width,
        height = height,
        title_x = width / 2,
        svg = svg,
        data_json = bars_to_json(&laid_out),
        tooltip_js = TOOLTIP_JS,
    );

    Ok(html)
}

fn write_bars(svg: &mut String, bars: &[LaidOutBar], config: &BarChartConfig) {
    let text_dy = config.bar_height_px / 2 + 4;
    for (i, b) in bars.iter().enumerate() {
        let label = escape_html(&b.bar.label);
        write!(
            svg,
            r##"  <text x="{lx}" y="{ty}" class="bar-label">{label}</text>
  <rect class="bar" data-index="{i}" x="{x}" y="{y}" width="{w:.2}" height="{h}" fill="{fill}"><title>{label}: {text}</title></rect>
  <text x="{vx:.2}" y="{ty}" class="value-label">{text}</text>
"##,
            lx = MARGIN_LEFT - 8,
            ty = b.y + text_dy,
            x = MARGIN_LEFT,
            y = b.y,
            w = b.width,
            h = config.bar_height_px,
            fill = palette::to_hex(&b.fill),
            vx = MARGIN_LEFT as f64 + b.width + 6.0,
            text = escape_html(&b.text),
        )
        .unwrap();
    }
}

fn write_axis(svg: &mut String, config: &BarChartConfig, x_max: f64, axis_y: u32, plot_height: u32) {
    let plot_w = config.plot_width_px as f64;
    write!(
        svg,
        r##"  <line x1="{x0}" y1="{y}" x2="{x1}" y2="{y}" stroke="#adb5bd"/>
"##,
        x0 = MARGIN_LEFT,
        x1 = MARGIN_LEFT + config.plot_width_px,
        y = axis_y,
    )
    .unwrap();

    for i in 0..=TICKS {
        let value = x_max * i as f64 / TICKS as f64;
        let x = MARGIN_LEFT as f64 + plot_w * i as f64 / TICKS as f64;
        write!(
            svg,
            r##"  <line x1="{x:.2}" y1="{y0}" x2="{x:.2}" y2="{y1}" stroke="#e9ecef"/>
  <text x="{x:.2}" y="{ty}" class="tick-label">{label}</text>
"##,
            y0 = MARGIN_TOP,
            y1 = axis_y,
            ty = axis_y + 16,
            label = escape_html(&format!("{:.0}{}", value, config.value_suffix)),
        )
        .unwrap();
    }

    write!(
        svg,
        r##"  <text x="{xt:.2}" y="{yt}" class="axis-title">{x_title}</text>
  <text x="20" y="{ym}" class="axis-title" transform="rotate(-90 20 {ym})">{y_title}</text>
"##,
        xt = MARGIN_LEFT as f64 + plot_w / 2.0,
        yt = axis_y + 44,
        ym = MARGIN_TOP + plot_height / 2,
        x_title = escape_html(&config.x_title),
        y_title = escape_html(&config.y_title),
    )
    .unwrap();
}

fn write_colorbar(svg: &mut String, bars: &[Bar], config: &BarChartConfig, plot_height: u32) {
    let x = MARGIN_LEFT + config.plot_width_px + 60;
    let bar_h = (plot_height * 3 / 4).max(60);
    let y = MARGIN_TOP + (plot_height - bar_h.min(plot_height)) / 2;
    let min = bars.iter().map(|b| b.value).fold(f64::INFINITY, f64::min);
    let max = bars.iter().map(|b| b.value).fold(f64::NEG_INFINITY, f64::max);

    write!(
        svg,
        r##"  <defs>
    <linearGradient id="ca-scale" x1="0" y1="1" x2="0" y2="0">
      <stop offset="0%" stop-color="{low}"/>
      <stop offset="100%" stop-color="{high}"/>
    </linearGradient>
  </defs>
  <text x="{x}" y="{ty}" class="value-label">{legend}</text>
  <rect x="{x}" y="{y}" width="15" height="{h}" fill="url(#ca-scale)" stroke="#adb5bd"/>
  <text x="{lx}" y="{y_hi}" class="value-label">{high_caption} ({max})</text>
  <text x="{lx}" y="{y_lo}" class="value-label">{low_caption} ({min})</text>
"##,
        low = palette::to_hex(&config.low_color),
        high = palette::to_hex(&config.high_color),
        ty = y.saturating_sub(10),
        legend = escape_html(&config.legend_title),
        h = bar_h,
        lx = x + 22,
        y_hi = y + 10,
        y_lo = y + bar_h,
        high_caption = escape_html(&config.high_caption),
        low_caption = escape_html(&config.low_caption),
        max = escape_html(&format_value(max, config)),
        min = escape_html(&format_value(min, config)),
    )
    .unwrap();
}

// ── Serialization helpers ───────────────────────────────────────────────────

fn bars_to_json(bars: &[LaidOutBar]) -> String {
    let mut s = String::from("[");
    for (i, b) in bars.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        write!(
            s,
            r##"{{"label":"{}","value":{},"text":"{}"}}"##,
            escape_json(&b.bar.label),
            b.bar.value,
            escape_json(&b.text),
        )
        .unwrap();
    }
    s.push(']');
    s
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('<', "\\u003c")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
