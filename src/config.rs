use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReportError, Result};
use crate::schema::{access, admission, generation, geography, immigration, tier};

/// Read when `--config` is not given; absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "census-access.toml";

// ── Top regions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopRegionsConfig {
    #[serde(default = "TopRegionsConfig::default_input")]
    pub input: String,
    #[serde(default = "TopRegionsConfig::default_output")]
    pub output: String,
    #[serde(default = "TopRegionsConfig::default_top_n")]
    pub top_n: usize,
    #[serde(default = "TopRegionsConfig::default_region_column")]
    pub region_column: String,
    #[serde(default = "TopRegionsConfig::default_non_immigrants")]
    pub non_immigrants_column: String,
    #[serde(default = "TopRegionsConfig::default_recent_immigrants")]
    pub recent_immigrants_column: String,
    #[serde(default = "TopRegionsConfig::default_title")]
    pub title: String,
    #[serde(default = "TopRegionsConfig::default_x_title")]
    pub x_title: String,
    #[serde(default = "TopRegionsConfig::default_y_title")]
    pub y_title: String,
    #[serde(default = "TopRegionsConfig::default_legend_title")]
    pub legend_title: String,
    #[serde(default = "TopRegionsConfig::default_low_color")]
    pub low_color: String,
    #[serde(default = "TopRegionsConfig::default_high_color")]
    pub high_color: String,
    #[serde(default = "TopRegionsConfig::default_low_caption")]
    pub low_caption: String,
    #[serde(default = "TopRegionsConfig::default_high_caption")]
    pub high_caption: String,
}

impl TopRegionsConfig {
    fn default_input() -> String {
        "RQ1_What is the density of non-immigrants and recent immigrants (2016–2021) in each ADA - \
         RQ1_What is the density of non-immigrants and recent immigrants (2016–2021) in each ADA.csv"
            .to_string()
    }
    fn default_output() -> String {
        "top20_recent_immigrants.html".to_string()
    }
    fn default_top_n() -> usize {
        20
    }
    fn default_region_column() -> String {
        geography::CMA_NAME.to_string()
    }
    fn default_non_immigrants() -> String {
        immigration::SUM_NON_IMMIGRANTS.to_string()
    }
    fn default_recent_immigrants() -> String {
        immigration::SUM_RECENT_IMMIGRANTS.to_string()
    }
    fn default_title() -> String {
        "Top 20 CMAs by % of Recent Immigrants (2016–2021)".to_string()
    }
    fn default_x_title() -> String {
        "% Recent Immigrants".to_string()
    }
    fn default_y_title() -> String {
        "Census Metropolitan Area".to_string()
    }
    fn default_legend_title() -> String {
        "Color Scale: % of Recent Immigrants".to_string()
    }
    fn default_low_color() -> String {
        "#deebf7".to_string()
    }
    fn default_high_color() -> String {
        "#08306b".to_string()
    }
    fn default_low_caption() -> String {
        "Light Blue = Low".to_string()
    }
    fn default_high_caption() -> String {
        "Dark Blue = High".to_string()
    }
}

impl Default for TopRegionsConfig {
    fn default() -> Self {
        Self {
            input: Self::default_input(),
            output: Self::default_output(),
            top_n: Self::default_top_n(),
            region_column: Self::default_region_column(),
            non_immigrants_column: Self::default_non_immigrants(),
            recent_immigrants_column: Self::default_recent_immigrants(),
            title: Self::default_title(),
            x_title: Self::default_x_title(),
            y_title: Self::default_y_title(),
            legend_title: Self::default_legend_title(),
            low_color: Self::default_low_color(),
            high_color: Self::default_high_color(),
            low_caption: Self::default_low_caption(),
            high_caption: Self::default_high_caption(),
        }
    }
}

// ── Choropleth ──────────────────────────────────────────────────────────────

/// A quantile cut point with its tier label and map colour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierConfig {
    pub quantile: f64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoroplethConfig {
    #[serde(default = "ChoroplethConfig::default_input")]
    pub input: String,
    #[serde(default = "ChoroplethConfig::default_boundaries")]
    pub boundaries: String,
    #[serde(default = "ChoroplethConfig::default_output")]
    pub output: String,
    #[serde(default = "ChoroplethConfig::default_boundary_key")]
    pub boundary_key: String,
    #[serde(default = "ChoroplethConfig::default_code_column")]
    pub code_column: String,
    #[serde(default = "ChoroplethConfig::default_region_column")]
    pub region_column: String,
    #[serde(default = "ChoroplethConfig::default_province_column")]
    pub province_column: String,
    #[serde(default = "ChoroplethConfig::default_non_immigrants")]
    pub non_immigrants_column: String,
    #[serde(default = "ChoroplethConfig::default_recent_immigrants")]
    pub recent_immigrants_column: String,
    #[serde(default = "ChoroplethConfig::default_top_n")]
    pub top_n: usize,
    /// Highest quantile first is conventional; order does not matter.
    #[serde(default = "ChoroplethConfig::default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default = "ChoroplethConfig::default_other_color")]
    pub other_color: String,
    #[serde(default = "ChoroplethConfig::default_no_data_color")]
    pub no_data_color: String,
    #[serde(default = "ChoroplethConfig::default_map_title")]
    pub map_title: String,
    #[serde(default = "ChoroplethConfig::default_legend_title")]
    pub legend_title: String,
    #[serde(default = "ChoroplethConfig::default_bar_title")]
    pub bar_title: String,
    #[serde(default = "ChoroplethConfig::default_bar_x_label")]
    pub bar_x_label: String,
}

impl ChoroplethConfig {
    fn default_input() -> String {
        "merged_access_immigration2.csv".to_string()
    }
    fn default_boundaries() -> String {
        "lada000b21a_e.shp".to_string()
    }
    fn default_output() -> String {
        "choropleth_with_top_legend_and_CMANAME_bar_corrected.png".to_string()
    }
    fn default_boundary_key() -> String {
        geography::BOUNDARY_ADA_CODE.to_string()
    }
    fn default_code_column() -> String {
        geography::ADA_CODE.to_string()
    }
    fn default_region_column() -> String {
        geography::CMA_NAME.to_string()
    }
    fn default_province_column() -> String {
        geography::PROVINCE_NAME.to_string()
    }
    fn default_non_immigrants() -> String {
        immigration::NON_IMMIGRANTS.to_string()
    }
    fn default_recent_immigrants() -> String {
        immigration::RECENT_IMMIGRANTS.to_string()
    }
    fn default_top_n() -> usize {
        10
    }
    fn default_tiers() -> Vec<TierConfig> {
        [(0.9, tier::TOP_10, "red"), (0.8, tier::NEXT_10, "blue"), (0.7, tier::NEXT_20, "green")]
            .into_iter()
            .map(|(quantile, label, color)| TierConfig {
                quantile,
                label: label.to_string(),
                color: color.to_string(),
            })
            .collect()
    }
    fn default_other_color() -> String {
        "beige".to_string()
    }
    fn default_no_data_color() -> String {
        "lightgrey".to_string()
    }
    fn default_map_title() -> String {
        "% of Recent Immigrants by ADA (2016–2021)".to_string()
    }
    fn default_legend_title() -> String {
        "% Recent Immigrants".to_string()
    }
    fn default_bar_title() -> String {
        "Top CMAs by % Recent Immigrants (with Province)".to_string()
    }
    fn default_bar_x_label() -> String {
        "% Recent Immigrants".to_string()
    }
}

impl Default for ChoroplethConfig {
    fn default() -> Self {
        Self {
            input: Self::default_input(),
            boundaries: Self::default_boundaries(),
            output: Self::default_output(),
            boundary_key: Self::default_boundary_key(),
            code_column: Self::default_code_column(),
            region_column: Self::default_region_column(),
            province_column: Self::default_province_column(),
            non_immigrants_column: Self::default_non_immigrants(),
            recent_immigrants_column: Self::default_recent_immigrants(),
            top_n: Self::default_top_n(),
            tiers: Self::default_tiers(),
            other_color: Self::default_other_color(),
            no_data_color: Self::default_no_data_color(),
            map_title: Self::default_map_title(),
            legend_title: Self::default_legend_title(),
            bar_title: Self::default_bar_title(),
            bar_x_label: Self::default_bar_x_label(),
        }
    }
}

// ── Composition ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    pub column: String,
    pub label: String,
    pub color: String,
}

/// Which name the exclusion substrings are matched against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExcludeOn {
    /// The raw region column (e.g. `CMANAME`).
    #[default]
    RegionName,
    /// The derived `"<name> (<province>)"` label.
    RegionLabel,
}

/// How a row's access score is printed next to its bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreFormat {
    /// `High Access (42.5%)`
    #[default]
    Percent,
    /// `High Walk (43%)`
    WholePercent,
}

impl ScoreFormat {
    /// `score` is a 0-1 ratio.
    pub fn annotate(self, tier: &str, score: f64) -> String {
        match self {
            Self::Percent => format!("{tier} ({:.1}%)", score * 100.0),
            Self::WholePercent => format!("{tier} ({}%)", (score * 100.0).round() as i64),
        }
    }
}

/// Fixed comparison row appended after the selected regions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceRow {
    pub label: String,
    /// Percentages, one per category in category order.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionConfig {
    pub input: String,
    pub output: String,
    pub metric: String,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub exclude_on: ExcludeOn,
    #[serde(default = "CompositionConfig::default_region_column")]
    pub region_column: String,
    #[serde(default = "CompositionConfig::default_province_column")]
    pub province_column: String,
    #[serde(default = "CompositionConfig::default_n")]
    pub n: usize,
    pub high_tier: String,
    pub low_tier: String,
    #[serde(default)]
    pub score_format: ScoreFormat,
    #[serde(default)]
    pub reference: Option<ReferenceRow>,
    pub title: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub legend_title: String,
    #[serde(default = "CompositionConfig::default_min_label_width")]
    pub min_label_width: f64,
}

impl CompositionConfig {
    fn default_region_column() -> String {
        geography::CMA_NAME.to_string()
    }
    fn default_province_column() -> String {
        geography::PROVINCE_NAME.to_string()
    }
    fn default_n() -> usize {
        3
    }
    fn default_min_label_width() -> f64 {
        3.0
    }

    fn categories(columns: &[&str], labels: &[&str], colors: &[&str]) -> Vec<CategoryConfig> {
        columns
            .iter()
            .zip(labels)
            .zip(colors)
            .map(|((column, label), color)| CategoryConfig {
                column: column.to_string(),
                label: label.to_string(),
                color: color.to_string(),
            })
            .collect()
    }

    fn immigration_class(input: &str, output: &str, metric: &str, title: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            metric: metric.to_string(),
            categories: Self::categories(
                &admission::ALL,
                &admission::LABELS,
                &["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"],
            ),
            exclude: Vec::new(),
            exclude_on: ExcludeOn::RegionName,
            region_column: Self::default_region_column(),
            province_column: Self::default_province_column(),
            n: Self::default_n(),
            high_tier: tier::HIGH_ACCESS.to_string(),
            low_tier: tier::LOW_ACCESS.to_string(),
            score_format: ScoreFormat::Percent,
            reference: Some(ReferenceRow {
                label: tier::NATIONAL_CENSUS_2021.to_string(),
                values: admission::NATIONAL_2021.to_vec(),
            }),
            title: title.to_string(),
            x_label: "% Immigration Class Composition".to_string(),
            y_label: String::new(),
            legend_title: "Immigration Class".to_string(),
            min_label_width: Self::default_min_label_width(),
        }
    }

    pub fn public_transit() -> Self {
        Self {
            exclude: [
                "No metropolitan influenced zone",
                "Strong metropolitan influenced zone",
                "Moderate metropolitan influenced zone",
            ]
            .map(String::from)
            .to_vec(),
            ..Self::immigration_class(
                "merged_access_immigration_RQ2.csv",
                "Public_Transit_Immigration_Class_Composition_Horizontal_Cleaned.png",
                access::PUBLIC_TRANSIT_EMPLOYMENT,
                "Immigration Class Composition by Public Transit Access to Employment",
            )
        }
    }

    pub fn walk() -> Self {
        Self {
            exclude: [
                "No metropolitan influenced zone",
                "Strong metropolitan influenced zone",
                "Moderate metropolitan influenced zone",
                "Weak metropolitan influenced zone",
                "Outside CAs",
                "Territories",
            ]
            .map(String::from)
            .to_vec(),
            ..Self::immigration_class(
                "merged_access_immigration_RQ2.csv",
                "Walk_Immigration_Class_Composition_Horizontal_Cleaned.png",
                access::WALK_EMPLOYMENT,
                "Immigration Class Composition by Walking Access to Employment",
            )
        }
    }

    pub fn generations() -> Self {
        Self {
            input: "merged_access_immigration_RQ3.csv".to_string(),
            output: "Generational_Composition_Walk_with_Census.png".to_string(),
            metric: access::WALK_EDUCATION.to_string(),
            categories: Self::categories(
                &generation::ALL,
                &generation::LABELS,
                &["#4c72b0", "#dd8452", "#55a868"],
            ),
            exclude: ["No metropolitan", "Zone d'influence", "Outside CAs", "Territories"]
                .map(String::from)
                .to_vec(),
            exclude_on: ExcludeOn::RegionLabel,
            region_column: Self::default_region_column(),
            province_column: Self::default_province_column(),
            n: Self::default_n(),
            high_tier: tier::HIGH_WALK.to_string(),
            low_tier: tier::LOW_WALK.to_string(),
            score_format: ScoreFormat::WholePercent,
            reference: Some(ReferenceRow {
                label: tier::NATIONAL_CENSUS_2021.to_string(),
                values: generation::NATIONAL_2021.to_vec(),
            }),
            title: "Generational Composition in Regions by Walk Access to Primary and Secondary \
                    Educational Facilities"
                .to_string(),
            x_label: "% of Generational Composition".to_string(),
            y_label: "Region".to_string(),
            legend_title: "Generation".to_string(),
            min_label_width: 10.0,
        }
    }
}

// ── Root ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Input file names are resolved against this directory.
    #[serde(default = "ReportConfig::default_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "ReportConfig::default_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub top_regions: TopRegionsConfig,
    #[serde(default)]
    pub choropleth: ChoroplethConfig,
    #[serde(default = "ReportConfig::default_composition")]
    pub composition: BTreeMap<String, CompositionConfig>,
}

impl ReportConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_composition() -> BTreeMap<String, CompositionConfig> {
        BTreeMap::from([
            ("public-transit".to_string(), CompositionConfig::public_transit()),
            ("walk".to_string(), CompositionConfig::walk()),
            ("generations".to_string(), CompositionConfig::generations()),
        ])
    }

    /// Parse a TOML document layered over the defaults.
    ///
    /// Tables merge key by key, so `[composition.walk]` with only `n = 5`
    /// keeps every other field of the shipped `walk` preset. Arrays and
    /// scalars replace the default outright.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let overrides: toml::Table = toml::from_str(text)?;
        let defaults = toml::Value::try_from(Self::default())
            .map_err(|e| ReportError::General(format!("serialising default config: {e}")))?;
        let toml::Value::Table(mut merged) = defaults else {
            return Err(ReportError::General("default config is not a table".to_string()));
        };
        merge_tables(&mut merged, overrides);
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Without one, the default path is
    /// used when present and the built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if !fallback.exists() {
                    info!("no config file, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let text = fs::read_to_string(path).map_err(|e| {
            ReportError::Io(std::io::Error::new(
                e.kind(),
                format!("reading config {}: {e}", path.display()),
            ))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), presets = config.composition.len(), "loaded config");
        Ok(config)
    }

    pub fn composition(&self, name: &str) -> Result<&CompositionConfig> {
        self.composition.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.composition.keys().map(String::as_str).collect();
            ReportError::Validation(format!(
                "unknown composition preset '{name}' (known: {})",
                known.join(", ")
            ))
        })
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_dir(),
            out_dir: Self::default_dir(),
            top_regions: TopRegionsConfig::default(),
            choropleth: ChoroplethConfig::default(),
            composition: Self::default_composition(),
        }
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let cfg = ReportConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ReportConfig::default());
        assert_eq!(cfg.top_regions.top_n, 20);
        assert_eq!(cfg.choropleth.top_n, 10);
        assert_eq!(cfg.composition.len(), 3);
    }

    #[test]
    fn test_partial_preset_keeps_other_fields() {
        let cfg = ReportConfig::from_toml_str(
            r#"
            out_dir = "charts"

            [composition.walk]
            n = 5
            score_format = "whole-percent"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.out_dir, PathBuf::from("charts"));
        let walk = cfg.composition("walk").unwrap();
        assert_eq!(walk.n, 5);
        assert_eq!(walk.score_format, ScoreFormat::WholePercent);
        assert_eq!(walk.metric, access::WALK_EMPLOYMENT);
        assert_eq!(walk.exclude.len(), 6);
        assert_eq!(cfg.composition("generations").unwrap().min_label_width, 10.0);
    }

    #[test]
    fn test_new_preset_can_be_declared() {
        let cfg = ReportConfig::from_toml_str(
            r##"
            [composition.cycling]
            input = "cycle.csv"
            output = "cycle.png"
            metric = "cycle_emp"
            high_tier = "High Cycle"
            low_tier = "Low Cycle"
            title = "Cycling"
            categories = [
                { column = "T1670", label = "Economic", color = "#1f77b4" },
            ]
            "##,
        )
        .unwrap();

        let cycling = cfg.composition("cycling").unwrap();
        assert_eq!(cycling.n, 3);
        assert_eq!(cycling.exclude_on, ExcludeOn::RegionName);
        assert!(cycling.reference.is_none());
        assert_eq!(cfg.composition.len(), 4);
    }

    #[test]
    fn test_unknown_preset_lists_known_names() {
        let cfg = ReportConfig::default();
        let err = cfg.composition("bus").unwrap_err().to_string();
        assert!(err.contains("generations"));
        assert!(err.contains("public-transit"));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(matches!(
            ReportConfig::from_toml_str("top_regions = ["),
            Err(ReportError::Config(_))
        ));
        assert!(ReportConfig::from_toml_str("[top_regions]\ntop_n = \"many\"").is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ReportConfig::load(Some(&missing)),
            Err(ReportError::Io(_))
        ));
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census-access.toml");
        fs::write(&path, "[top_regions]\ntop_n = 7\n").unwrap();
        let cfg = ReportConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.top_regions.top_n, 7);
    }

    #[test]
    fn test_score_formats() {
        assert_eq!(ScoreFormat::Percent.annotate("High Access", 0.4253), "High Access (42.5%)");
        assert_eq!(ScoreFormat::WholePercent.annotate("Low Walk", 0.127), "Low Walk (13%)");
    }
}
