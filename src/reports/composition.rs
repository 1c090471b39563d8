//! Category composition of the highest- and lowest-access regions.

use std::collections::HashSet;

use polars::prelude::*;
use tracing::{info, warn};

use super::{ReportContext, ReportOutput, SummaryRow};
use crate::aggregation::{
    aggregate, composition_rows, drop_undefined_rows, group_mean, normalize_to_percentage,
};
use crate::config::{CompositionConfig, ExcludeOn, ScoreFormat};
use crate::error::{ReportError, Result};
use crate::filter::{with_region_label, RegionFilter};
use crate::palette;
use crate::plots::{stacked_composition_chart, Category, StackedChartStyle, StackedRow};
use crate::schema::derived;
use crate::tiers::select_extremes;

/// One bar of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionEntry {
    pub label: String,
    pub tier: String,
    /// Mean access score; `None` for the reference row.
    pub score: Option<f64>,
    /// One percentage per category, summing to 100.
    pub percentages: Vec<f64>,
}

impl CompositionEntry {
    /// Text drawn to the right of the bar.
    pub fn annotation(&self, format: ScoreFormat) -> String {
        match self.score {
            Some(score) => format.annotate(&self.tier, score),
            None => self.tier.clone(),
        }
    }
}

fn category_columns(cfg: &CompositionConfig) -> Vec<&str> {
    cfg.categories.iter().map(|c| c.column.as_str()).collect()
}

/// Keep only rows whose region label is in `keep`.
fn restrict_to(df: &DataFrame, keep: &HashSet<&str>) -> Result<DataFrame> {
    let labels = df.column(derived::REGION)?.str()?;
    let mask: BooleanChunked = labels
        .into_iter()
        .map(|v| Some(v.is_some_and(|l| keep.contains(l))))
        .collect();
    Ok(df.filter(&mask)?)
}

/// Selected regions in display order followed by the reference row.
///
/// Top-tier regions come first, then bottom-tier regions, each by mean
/// score descending. A region chosen as both top and bottom appears twice.
/// Regions whose category total is zero are left out.
pub fn build(df: &DataFrame, cfg: &CompositionConfig) -> Result<Vec<CompositionEntry>> {
    let filter = RegionFilter::new(&cfg.exclude);
    let labelled = match cfg.exclude_on {
        ExcludeOn::RegionName => {
            let kept = filter.apply(df, &cfg.region_column)?;
            with_region_label(kept, &cfg.region_column, &cfg.province_column, derived::REGION)?
        }
        ExcludeOn::RegionLabel => {
            let labelled =
                with_region_label(df.clone(), &cfg.region_column, &cfg.province_column, derived::REGION)?;
            filter.apply(&labelled, derived::REGION)?
        }
    };

    let means = group_mean(&labelled, derived::REGION, &cfg.metric)?;
    let ranked = select_extremes(&means, cfg.n);
    if ranked.overlaps() {
        warn!(
            regions = means.len(),
            n = cfg.n,
            "fewer regions than requested; top and bottom selections overlap"
        );
    }
    let ranked = ranked.labelled(&cfg.high_tier, &cfg.low_tier);

    let selected: HashSet<&str> = ranked.iter().map(|r| r.group.as_str()).collect();
    let rows = restrict_to(&labelled, &selected)?;

    let columns = category_columns(cfg);
    let totals = aggregate(&rows, derived::REGION, &columns)?;
    let shares = normalize_to_percentage(totals, &columns)?;
    let shares = drop_undefined_rows(shares, &columns)?;
    let compositions = composition_rows(&shares, derived::REGION, &columns)?;

    let mut entries: Vec<CompositionEntry> = ranked
        .into_iter()
        .filter_map(|r| {
            let row = compositions.iter().find(|c| c.group == r.group)?;
            Some(CompositionEntry {
                label: r.group,
                tier: r.tier,
                score: Some(r.score),
                percentages: row.percentages.clone(),
            })
        })
        .collect();

    if let Some(reference) = &cfg.reference {
        if reference.values.len() != cfg.categories.len() {
            return Err(ReportError::Validation(format!(
                "reference row '{}' has {} values for {} categories",
                reference.label,
                reference.values.len(),
                cfg.categories.len()
            )));
        }
        entries.push(CompositionEntry {
            label: reference.label.clone(),
            tier: reference.label.clone(),
            score: None,
            percentages: reference.values.clone(),
        });
    }

    info!(metric = %cfg.metric, rows = entries.len(), "built composition");
    Ok(entries)
}

pub fn to_table(entries: &[CompositionEntry], cfg: &CompositionConfig) -> Result<DataFrame> {
    let mut columns = vec![
        Column::new(
            derived::REGION.into(),
            entries.iter().map(|e| e.label.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            derived::TIER.into(),
            entries.iter().map(|e| e.tier.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            derived::SCORE.into(),
            entries.iter().map(|e| e.score).collect::<Vec<_>>(),
        ),
    ];
    for (i, category) in cfg.categories.iter().enumerate() {
        columns.push(Column::new(
            category.label.as_str().into(),
            entries.iter().map(|e| e.percentages[i]).collect::<Vec<_>>(),
        ));
    }
    Ok(DataFrame::new(columns)?)
}

pub fn chart_style(cfg: &CompositionConfig) -> Result<StackedChartStyle> {
    let categories = cfg
        .categories
        .iter()
        .map(|c| {
            Ok(Category {
                label: c.label.clone(),
                color: palette::parse_color(&c.color)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StackedChartStyle {
        title: cfg.title.clone(),
        x_label: cfg.x_label.clone(),
        y_label: cfg.y_label.clone(),
        legend_title: cfg.legend_title.clone(),
        categories,
        min_label_width: cfg.min_label_width,
        ..StackedChartStyle::default()
    })
}

pub fn run(ctx: &ReportContext, name: &str) -> Result<ReportOutput> {
    let cfg = ctx.config.composition(name)?;
    info!(preset = name, input = %cfg.input, "composition report");

    let mut numeric = vec![cfg.metric.as_str()];
    numeric.extend(category_columns(cfg));
    let observations = ctx.model.load_observations(
        &cfg.input,
        &[cfg.region_column.as_str(), cfg.province_column.as_str()],
        &numeric,
    )?;

    let entries = build(&observations, cfg)?;
    let rows: Vec<StackedRow> = entries
        .iter()
        .map(|e| StackedRow {
            label: e.label.clone(),
            values: e.percentages.clone(),
            annotation: e.annotation(cfg.score_format),
        })
        .collect();

    let chart = ctx.output_path(&cfg.output)?;
    stacked_composition_chart(&rows, &chart_style(cfg)?, &chart)?;
    info!(path = %chart.display(), rows = rows.len(), "wrote chart");

    let table = ctx.export_table(&chart, &mut to_table(&entries, cfg)?)?;

    let summary = entries
        .iter()
        .enumerate()
        .map(|(i, e)| SummaryRow {
            rank: i + 1,
            label: e.label.clone(),
            tier: e.tier.clone(),
            value: e
                .percentages
                .iter()
                .map(|p| format!("{p:.1}"))
                .collect::<Vec<_>>()
                .join(" / "),
        })
        .collect();

    Ok(ReportOutput {
        name: format!("composition {name}"),
        chart,
        table,
        summary,
    })
}
