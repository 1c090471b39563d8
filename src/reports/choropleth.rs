//! Area choropleth by quantile tier plus the leading regions as bars.

use polars::prelude::*;
use tracing::{info, warn};

use super::{ReportContext, ReportOutput, SummaryRow};
use crate::aggregation::{aggregate_by, drop_undefined_rows, Aggregation};
use crate::config::ChoroplethConfig;
use crate::error::{ReportError, Result};
use crate::filter::{region_label, with_share};
use crate::geometry::{self, AreaShape};
use crate::map::{choropleth_figure, tier_color, ChoroplethStyle, TieredArea};
use crate::palette;
use crate::plots::{Category, ColoredBar};
use crate::schema::{derived, tier};
use crate::tiers::{select_extremes, QuantileCut, QuantileTiers, Threshold};

const AREA_INDEX: &str = "area_index";
const MATCHED: &str = "matched";

/// Region-level share with the tier it falls in under the area thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTier {
    pub label: String,
    pub share: f64,
    pub tier: String,
}

#[derive(Debug, Clone)]
pub struct ChoroplethTable {
    /// Tier per boundary area, same order as the input shapes.
    pub area_tiers: Vec<String>,
    pub thresholds: Vec<Threshold>,
    /// Top regions, highest share first.
    pub regions: Vec<RegionTier>,
}

fn cuts(cfg: &ChoroplethConfig) -> Vec<QuantileCut> {
    cfg.tiers
        .iter()
        .map(|t| QuantileCut::new(t.quantile, &t.label))
        .collect()
}

/// Left join every area to the observations by code.
///
/// Output rows follow boundary order. Areas without a matching row keep null
/// data columns; duplicate codes in the observations repeat the area.
fn join_areas(data: &DataFrame, areas: &[AreaShape], cfg: &ChoroplethConfig) -> Result<DataFrame> {
    let codes: Vec<&str> = areas.iter().map(|a| a.code.as_str()).collect();
    let index: Vec<u32> = (0..areas.len() as u32).collect();
    let boundaries = DataFrame::new(vec![
        Column::new(cfg.boundary_key.as_str().into(), codes),
        Column::new(AREA_INDEX.into(), index),
    ])?;

    let data = data
        .clone()
        .lazy()
        .with_column(col(cfg.code_column.as_str()).str().strip_chars(lit(" ")))
        .with_column(lit(true).alias(MATCHED));

    let joined = boundaries
        .lazy()
        .join(
            data,
            [col(cfg.boundary_key.as_str())],
            [col(cfg.code_column.as_str())],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(
            [col(AREA_INDEX)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let matched = joined.column(MATCHED)?.len() - joined.column(MATCHED)?.null_count();
    if matched == 0 {
        return Err(ReportError::Validation(format!(
            "no boundary {} matched any {} in the table",
            cfg.boundary_key, cfg.code_column
        )));
    }
    let unmatched = joined.height() - matched;
    if unmatched > 0 {
        warn!(unmatched, "areas without data are drawn as no data");
    }
    info!(areas = areas.len(), rows = joined.height(), matched, "joined boundaries");
    Ok(joined)
}

/// Classify areas and regions.
///
/// Thresholds come from the area shares; regional shares are the summed
/// counts of their matched areas, classified with the same thresholds.
pub fn build(data: &DataFrame, areas: &[AreaShape], cfg: &ChoroplethConfig) -> Result<ChoroplethTable> {
    let non = cfg.non_immigrants_column.as_str();
    let recent = cfg.recent_immigrants_column.as_str();

    let data = with_share(data.clone(), recent, non, derived::PCT_RECENT_IMMIGRANTS)?;
    let joined = join_areas(&data, areas, cfg)?;

    let shares: Vec<Option<f64>> = joined
        .column(derived::PCT_RECENT_IMMIGRANTS)?
        .f64()?
        .into_iter()
        .collect();
    let tiers = QuantileTiers::from_values(&shares, &cuts(cfg), tier::OTHER, tier::NO_DATA);

    // one tier per area; a repeated code keeps its last row, as drawing order would
    let mut area_tiers = vec![tier::NO_DATA.to_string(); areas.len()];
    let index = joined.column(AREA_INDEX)?.u32()?;
    for (i, share) in index.into_iter().zip(&shares) {
        if let Some(i) = i {
            area_tiers[i as usize] = tiers.classify(*share).to_string();
        }
    }

    let totals = aggregate_by(
        &joined,
        &cfg.region_column,
        &[
            Aggregation::sum(&[non, recent]),
            Aggregation::first(&cfg.province_column, None),
        ],
    )?;
    let totals = with_share(totals, recent, non, derived::PCT_RECENT_IMMIGRANTS)?;
    let totals = drop_undefined_rows(totals, &[derived::PCT_RECENT_IMMIGRANTS])?;

    let names = totals.column(&cfg.region_column)?.str()?;
    let provinces = totals.column(&cfg.province_column)?.str()?;
    let region_shares = totals.column(derived::PCT_RECENT_IMMIGRANTS)?.f64()?;
    let ranked: Vec<(String, f64)> = names
        .into_iter()
        .zip(provinces)
        .zip(region_shares)
        .filter_map(|((name, province), share)| Some((region_label(name?, province?), share?)))
        .collect();

    let regions = select_extremes(&ranked, cfg.top_n)
        .top
        .into_iter()
        .map(|(label, share)| RegionTier {
            tier: tiers.classify(Some(share)).to_string(),
            label,
            share,
        })
        .collect();

    Ok(ChoroplethTable {
        area_tiers,
        thresholds: tiers.thresholds().to_vec(),
        regions,
    })
}

pub fn to_table(regions: &[RegionTier]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            derived::LABEL.into(),
            regions.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            derived::PCT_RECENT_IMMIGRANTS.into(),
            regions.iter().map(|r| r.share).collect::<Vec<_>>(),
        ),
        Column::new(
            derived::TIER.into(),
            regions.iter().map(|r| r.tier.as_str()).collect::<Vec<_>>(),
        ),
    ])?)
}

/// Tier legend: configured cut tiers, then "Other", then "No data".
pub fn tier_categories(cfg: &ChoroplethConfig) -> Result<Vec<Category>> {
    let mut ordered: Vec<_> = cfg.tiers.iter().collect();
    ordered.sort_by(|a, b| b.quantile.total_cmp(&a.quantile));

    let mut categories = ordered
        .into_iter()
        .map(|t| {
            Ok(Category {
                label: t.label.clone(),
                color: palette::parse_color(&t.color)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    categories.push(Category {
        label: tier::OTHER.to_string(),
        color: palette::parse_color(&cfg.other_color)?,
    });
    categories.push(Category {
        label: tier::NO_DATA.to_string(),
        color: palette::parse_color(&cfg.no_data_color)?,
    });
    Ok(categories)
}

pub fn run(ctx: &ReportContext, cfg: &ChoroplethConfig) -> Result<ReportOutput> {
    let data = ctx.model.load_observations(
        &cfg.input,
        &[
            cfg.code_column.as_str(),
            cfg.region_column.as_str(),
            cfg.province_column.as_str(),
        ],
        &[cfg.non_immigrants_column.as_str(), cfg.recent_immigrants_column.as_str()],
    )?;
    let shapes = geometry::load_boundaries(&ctx.model.resolve(&cfg.boundaries), &cfg.boundary_key)?;

    let table = build(&data, &shapes, cfg)?;
    for t in &table.thresholds {
        info!(tier = %t.label, threshold = t.value, "tier threshold");
    }

    let categories = tier_categories(cfg)?;
    let bars = table
        .regions
        .iter()
        .map(|r| {
            Ok(ColoredBar {
                label: r.label.clone(),
                value: r.share,
                color: tier_color(&categories, &r.tier)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let areas: Vec<TieredArea> = shapes
        .into_iter()
        .zip(&table.area_tiers)
        .map(|(shape, tier)| TieredArea {
            shape,
            tier: tier.clone(),
        })
        .collect();

    let style = ChoroplethStyle {
        map_title: cfg.map_title.clone(),
        legend_title: cfg.legend_title.clone(),
        bar_title: cfg.bar_title.clone(),
        bar_x_label: cfg.bar_x_label.clone(),
        tiers: categories,
        ..ChoroplethStyle::default()
    };

    let chart = ctx.output_path(&cfg.output)?;
    choropleth_figure(&areas, &bars, &style, &chart)?;
    info!(path = %chart.display(), areas = areas.len(), "wrote map");

    let exported = ctx.export_table(&chart, &mut to_table(&table.regions)?)?;

    let summary = table
        .regions
        .iter()
        .enumerate()
        .map(|(i, r)| SummaryRow {
            rank: i + 1,
            label: r.label.clone(),
            tier: r.tier.clone(),
            value: format!("{:.1}%", r.share),
        })
        .collect();

    Ok(ReportOutput {
        name: "choropleth".to_string(),
        chart,
        table: exported,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{geography, immigration};
    use geo::MultiPolygon;

    fn area(code: &str) -> AreaShape {
        AreaShape {
            code: code.to_string(),
            polygons: MultiPolygon::new(vec![]),
        }
    }

    /// Ten areas with shares 1..=10 %, plus one boundary with no row.
    fn fixture() -> (DataFrame, Vec<AreaShape>) {
        let codes: Vec<String> = (1..=10).map(|i| format!("100{i:02}")).collect();
        let cmas: Vec<&str> = (1..=10).map(|i| if i <= 5 { "Low" } else { "High" }).collect();
        let provinces: Vec<&str> = (1..=10).map(|_| "Ontario").collect();
        let recent: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let non: Vec<f64> = (1..=10).map(|i| 100.0 - i as f64).collect();

        let df = df!(
            geography::ADA_CODE => codes.clone(),
            geography::CMA_NAME => cmas,
            geography::PROVINCE_NAME => provinces,
            immigration::NON_IMMIGRANTS => non,
            immigration::RECENT_IMMIGRANTS => recent
        )
        .unwrap();

        let mut areas: Vec<AreaShape> = codes.iter().rev().map(|c| area(c)).collect();
        areas.push(area("99999"));
        (df, areas)
    }

    #[test]
    fn test_area_tiers_follow_quantiles() {
        let (df, areas) = fixture();
        let table = build(&df, &areas, &ChoroplethConfig::default()).unwrap();

        // areas are in reverse code order: shares 10, 9, ..., 1 then the unmatched one
        assert_eq!(table.area_tiers[0], tier::TOP_10);
        assert_eq!(table.area_tiers[1], tier::NEXT_10);
        assert_eq!(table.area_tiers[2], tier::NEXT_20);
        assert_eq!(table.area_tiers[3], tier::OTHER);
        assert_eq!(table.area_tiers[9], tier::OTHER);
        assert_eq!(table.area_tiers[10], tier::NO_DATA);
        assert!((table.thresholds[0].value - 9.1).abs() < 1e-9);
    }

    #[test]
    fn test_regions_use_summed_counts_and_area_thresholds() {
        let (df, areas) = fixture();
        let table = build(&df, &areas, &ChoroplethConfig::default()).unwrap();

        let labels: Vec<&str> = table.regions.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["High (Ontario)", "Low (Ontario)"]);
        // (6+7+8+9+10) / 500
        assert!((table.regions[0].share - 8.0).abs() < 1e-9);
        assert_eq!(table.regions[0].tier, tier::NEXT_20);
        assert_eq!(table.regions[1].tier, tier::OTHER);
    }

    #[test]
    fn test_region_without_province_is_unlabelled() {
        let (mut df, areas) = fixture();
        let provinces: Vec<Option<&str>> =
            (1..=10).map(|i| if i <= 5 { Some("Ontario") } else { None }).collect();
        df.with_column(Column::new(geography::PROVINCE_NAME.into(), provinces))
            .unwrap();

        let table = build(&df, &areas, &ChoroplethConfig::default()).unwrap();
        let labels: Vec<&str> = table.regions.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Low (Ontario)"]);
        // the areas themselves are still tiered
        assert_eq!(table.area_tiers[0], tier::TOP_10);
    }

    #[test]
    fn test_no_match_is_fatal() {
        let (df, _) = fixture();
        let areas = vec![area("1"), area("2")];
        assert!(matches!(
            build(&df, &areas, &ChoroplethConfig::default()),
            Err(ReportError::Validation(_))
        ));
    }

    #[test]
    fn test_tier_categories_order() {
        let categories = tier_categories(&ChoroplethConfig::default()).unwrap();
        let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![tier::TOP_10, tier::NEXT_10, tier::NEXT_20, tier::OTHER, tier::NO_DATA]
        );
        assert_eq!(categories[0].color, plotters::style::RGBColor(255, 0, 0));
    }

    #[test]
    fn test_to_table_shape() {
        let regions = vec![RegionTier {
            label: "High (Ontario)".to_string(),
            share: 8.0,
            tier: tier::NEXT_20.to_string(),
        }];
        assert_eq!(to_table(&regions).unwrap().shape(), (1, 3));
    }
}
