use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::ReportConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML (default: census-access.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory input files are read from (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory charts are written to (overrides config)
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    /// Also write each charted table as CSV next to the chart
    #[arg(long, global = true, default_value_t = false)]
    pub write_tables: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive HTML bar chart of the top regions by share of recent immigrants
    TopRegions {
        #[command(flatten)]
        io: IoOverrides,
        /// Number of regions to draw
        #[arg(long)]
        top: Option<usize>,
    },
    /// Area choropleth by quantile tier with a bar chart of the leading regions
    Choropleth {
        #[command(flatten)]
        io: IoOverrides,
        /// Boundary file (.shp or .geojson)
        #[arg(long)]
        boundaries: Option<String>,
        /// Number of regions in the bar panel
        #[arg(long)]
        top: Option<usize>,
    },
    /// Stacked composition chart for one configured preset
    Composition {
        /// Preset name, e.g. public-transit, walk, generations
        name: String,
        #[command(flatten)]
        io: IoOverrides,
        /// Regions per tier
        #[arg(long)]
        top: Option<usize>,
    },
    /// Run every report
    All,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct IoOverrides {
    /// Input CSV (relative to the data directory)
    #[arg(long)]
    pub input: Option<String>,
    /// Output file name (relative to the output directory)
    #[arg(long)]
    pub output: Option<String>,
}

fn set<T>(slot: &mut T, value: &Option<T>)
where
    T: Clone,
{
    if let Some(v) = value {
        *slot = v.clone();
    }
}

impl Args {
    /// Fold command-line overrides into a loaded config.
    ///
    /// Unknown composition presets are left for the report to reject.
    pub fn apply_overrides(&self, config: &mut ReportConfig) {
        set(&mut config.data_dir, &self.data_dir);
        set(&mut config.out_dir, &self.out_dir);

        match &self.command {
            Command::TopRegions { io, top } => {
                let cfg = &mut config.top_regions;
                set(&mut cfg.input, &io.input);
                set(&mut cfg.output, &io.output);
                set(&mut cfg.top_n, top);
            }
            Command::Choropleth { io, boundaries, top } => {
                let cfg = &mut config.choropleth;
                set(&mut cfg.input, &io.input);
                set(&mut cfg.output, &io.output);
                set(&mut cfg.boundaries, boundaries);
                set(&mut cfg.top_n, top);
            }
            Command::Composition { name, io, top } => {
                if let Some(cfg) = config.composition.get_mut(name) {
                    set(&mut cfg.input, &io.input);
                    set(&mut cfg.output, &io.output);
                    set(&mut cfg.n, top);
                }
            }
            Command::All => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_composition_with_overrides() {
        let args = Args::try_parse_from([
            "census-access",
            "--out-dir",
            "charts",
            "composition",
            "walk",
            "--top",
            "5",
            "--write-tables",
        ])
        .unwrap();
        assert!(args.write_tables);

        let mut config = ReportConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.out_dir, PathBuf::from("charts"));
        assert_eq!(config.composition["walk"].n, 5);
        assert_eq!(config.composition["generations"].n, 3);
    }

    #[test]
    fn test_parses_top_regions() {
        let args = Args::try_parse_from([
            "census-access",
            "top-regions",
            "--input",
            "rq1.csv",
            "--top",
            "10",
        ])
        .unwrap();
        let mut config = ReportConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.top_regions.input, "rq1.csv");
        assert_eq!(config.top_regions.top_n, 10);
        assert_eq!(config.top_regions.output, "top20_recent_immigrants.html");
    }

    #[test]
    fn test_parses_choropleth_boundaries() {
        let args = Args::try_parse_from([
            "census-access",
            "choropleth",
            "--boundaries",
            "ada.geojson",
        ])
        .unwrap();
        let mut config = ReportConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.choropleth.boundaries, "ada.geojson");
    }

    #[test]
    fn test_requires_a_command() {
        assert!(Args::try_parse_from(["census-access"]).is_err());
        assert!(Args::try_parse_from(["census-access", "composition"]).is_err());
    }
}
