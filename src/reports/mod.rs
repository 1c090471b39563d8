//! Report pipelines: load, filter, aggregate, select, render.
//!
//! Each report exposes a pure `build` step returning the finalised table,
//! tested without touching the filesystem, and a `run` step that loads the
//! inputs, renders the chart and optionally exports the table.

pub mod choropleth;
pub mod composition;
pub mod top_regions;

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use tabled::{Table, Tabled};
use tracing::info;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::model::CensusModel;

/// Shared state for one invocation.
pub struct ReportContext {
    pub config: ReportConfig,
    pub model: CensusModel,
    pub write_tables: bool,
}

impl ReportContext {
    pub fn new(config: ReportConfig, write_tables: bool) -> Self {
        let model = CensusModel::new(config.data_dir.clone());
        Self {
            config,
            model,
            write_tables,
        }
    }

    /// Path under the output directory, creating the directory on first use.
    pub fn output_path(&self, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.out_dir)?;
        Ok(self.config.out_dir.join(filename))
    }

    /// Export `table` beside `chart` as CSV when `--write-tables` is on.
    fn export_table(&self, chart: &Path, table: &mut DataFrame) -> Result<Option<PathBuf>> {
        if !self.write_tables {
            return Ok(None);
        }
        let path = chart.with_extension("csv");
        CensusModel::write_table(&path, table)?;
        info!(path = %path.display(), "wrote table");
        Ok(Some(path))
    }
}

/// One line of the console summary.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Region")]
    pub label: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// What a report produced.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub name: String,
    pub chart: PathBuf,
    pub table: Option<PathBuf>,
    pub summary: Vec<SummaryRow>,
}

impl ReportOutput {
    /// Title, underline and an ASCII table of the summary rows.
    pub fn format_summary(&self) -> String {
        let title = format!("{} -> {}", self.name, self.chart.display());
        if self.summary.is_empty() {
            return format!("{title}\nNo rows");
        }
        let table = Table::new(&self.summary).to_string();
        format!("{}\n{}\n{}", title, "=".repeat(title.chars().count()), table)
    }
}

/// Run every configured report in a fixed order, stopping at the first failure.
pub fn run_all(ctx: &ReportContext) -> Result<Vec<ReportOutput>> {
    let mut outputs = vec![
        top_regions::run(ctx, &ctx.config.top_regions)?,
        choropleth::run(ctx, &ctx.config.choropleth)?,
    ];
    for name in ctx.config.composition.keys() {
        outputs.push(composition::run(ctx, name)?);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let output = ReportOutput {
            name: "top-regions".to_string(),
            chart: PathBuf::from("out/top.html"),
            table: None,
            summary: vec![SummaryRow {
                rank: 1,
                label: "Toronto".to_string(),
                tier: String::new(),
                value: "12.34%".to_string(),
            }],
        };
        let text = output.format_summary();
        assert!(text.starts_with("top-regions -> out/top.html\n"));
        assert!(text.contains("Toronto"));
        assert!(text.contains("12.34%"));
    }

    #[test]
    fn test_export_table_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            out_dir: dir.path().join("out"),
            ..ReportConfig::default()
        };
        let mut df = polars::df!("a" => [1.0, 2.0]).unwrap();

        let ctx = ReportContext::new(config.clone(), false);
        let chart = ctx.output_path("chart.png").unwrap();
        assert!(dir.path().join("out").is_dir());
        assert_eq!(ctx.export_table(&chart, &mut df).unwrap(), None);

        let ctx = ReportContext::new(config, true);
        let written = ctx.export_table(&chart, &mut df).unwrap().unwrap();
        assert_eq!(written, dir.path().join("out").join("chart.csv"));
        assert!(written.is_file());
    }
}
