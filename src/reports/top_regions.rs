//! Top regions by share of recent immigrants, rendered as an HTML bar chart.

use polars::prelude::*;
use tracing::info;

use super::{ReportContext, ReportOutput, SummaryRow};
use crate::aggregation::{aggregate, drop_undefined_rows};
use crate::config::TopRegionsConfig;
use crate::error::Result;
use crate::filter::{drop_undefined, with_share};
use crate::palette;
use crate::schema::derived;
use crate::tiers::select_extremes;
use crate::visualization::{generate_bar_chart_html, Bar, BarChartConfig};

/// Region and its percentage share, highest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionShare {
    pub region: String,
    pub share: f64,
}

/// Regional shares of recent immigrants, top `cfg.top_n` only.
///
/// Rows whose own share is undefined are dropped before summing, then
/// regions with an undefined total share are dropped too.
pub fn build(df: &DataFrame, cfg: &TopRegionsConfig) -> Result<Vec<RegionShare>> {
    let non = cfg.non_immigrants_column.as_str();
    let recent = cfg.recent_immigrants_column.as_str();

    let rows = with_share(df.clone(), recent, non, derived::PCT_RECENT_IMMIGRANTS)?;
    let rows = drop_undefined(rows, derived::PCT_RECENT_IMMIGRANTS)?;

    let totals = aggregate(&rows, &cfg.region_column, &[non, recent])?;
    let totals = with_share(totals, recent, non, derived::PCT_RECENT_IMMIGRANTS)?;
    let totals = drop_undefined_rows(totals, &[derived::PCT_RECENT_IMMIGRANTS])?;

    let regions = totals.column(&cfg.region_column)?.str()?;
    let shares = totals.column(derived::PCT_RECENT_IMMIGRANTS)?.f64()?;
    let pairs: Vec<(String, f64)> = regions
        .into_iter()
        .zip(shares)
        .filter_map(|(r, s)| Some((r?.to_string(), s?)))
        .collect();

    let top = select_extremes(&pairs, cfg.top_n).top;
    info!(regions = pairs.len(), selected = top.len(), "ranked regions");

    Ok(top
        .into_iter()
        .map(|(region, share)| RegionShare { region, share })
        .collect())
}

pub fn to_table(shares: &[RegionShare], region_column: &str) -> Result<DataFrame> {
    let regions: Vec<&str> = shares.iter().map(|s| s.region.as_str()).collect();
    let values: Vec<f64> = shares.iter().map(|s| s.share).collect();
    Ok(DataFrame::new(vec![
        Column::new(region_column.into(), regions),
        Column::new(derived::PCT_RECENT_IMMIGRANTS.into(), values),
    ])?)
}

pub fn chart_config(cfg: &TopRegionsConfig) -> Result<BarChartConfig> {
    Ok(BarChartConfig {
        title: cfg.title.clone(),
        x_title: cfg.x_title.clone(),
        y_title: cfg.y_title.clone(),
        legend_title: cfg.legend_title.clone(),
        low_color: palette::parse_color(&cfg.low_color)?,
        high_color: palette::parse_color(&cfg.high_color)?,
        low_caption: cfg.low_caption.clone(),
        high_caption: cfg.high_caption.clone(),
        ..BarChartConfig::default()
    })
}

pub fn run(ctx: &ReportContext, cfg: &TopRegionsConfig) -> Result<ReportOutput> {
    let observations = ctx.model.load_observations(
        &cfg.input,
        &[cfg.region_column.as_str()],
        &[cfg.non_immigrants_column.as_str(), cfg.recent_immigrants_column.as_str()],
    )?;

    let shares = build(&observations, cfg)?;
    let bars: Vec<Bar> = shares
        .iter()
        .map(|s| Bar {
            label: s.region.clone(),
            value: s.share,
        })
        .collect();
    let html = generate_bar_chart_html(&bars, &chart_config(cfg)?)?;

    let chart = ctx.output_path(&cfg.output)?;
    std::fs::write(&chart, html)?;
    info!(path = %chart.display(), bars = bars.len(), "wrote chart");

    let table = ctx.export_table(&chart, &mut to_table(&shares, &cfg.region_column)?)?;

    let summary = shares
        .iter()
        .enumerate()
        .map(|(i, s)| SummaryRow {
            rank: i + 1,
            label: s.region.clone(),
            tier: String::new(),
            value: format!("{:.2}%", s.share),
        })
        .collect();

    Ok(ReportOutput {
        name: "top-regions".to_string(),
        chart,
        table,
        summary,
    })
}
