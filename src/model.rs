use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{ReportError, Result};

/// Loads census tables from a data directory.
///
/// Every CSV is read with all columns as strings; the columns a report does
/// arithmetic on are parsed to `Float64` afterwards so that area codes and
/// names keep their text form.
pub struct CensusModel {
    base_path: PathBuf,
}

impl CensusModel {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a file name against the data directory. Absolute paths pass through.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load an observation table.
    ///
    /// `required` columns must exist; `numeric` columns (which must also be
    /// present) are parsed to Float64, with unparsable cells becoming null.
    /// All other columns stay strings.
    pub fn load_observations(
        &self,
        filename: &str,
        required: &[&str],
        numeric: &[&str],
    ) -> Result<DataFrame> {
        let raw = self.read_csv_as_strings(filename)?;

        Self::require_columns(&raw, required)?;
        Self::require_columns(&raw, numeric)?;

        let df = Self::parse_float_columns(raw, numeric)?;
        info!(
            file = filename,
            rows = df.height(),
            columns = df.width(),
            "loaded observations"
        );
        Ok(df)
    }

    // ── Parse helpers ───────────────────────────────────────────────────────

    /// Parse several string columns to Float64 in one pass.
    ///
    /// A literal `NaN` cell counts as missing, like an empty or unparsable one.
    pub fn parse_float_columns(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
        if columns.is_empty() {
            return Ok(df);
        }
        let exprs: Vec<Expr> = columns
            .iter()
            .map(|c| {
                col(*c)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .cast(DataType::Float64)
                    .fill_nan(lit(NULL))
            })
            .collect();
        let result = df.lazy().with_columns(exprs).collect()?;
        Ok(result)
    }

    pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
        for &col_name in required {
            if df.column(col_name).is_err() {
                return Err(ReportError::MissingColumn(col_name.to_string()));
            }
        }
        Ok(())
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Write a finalised table next to the chart it feeds.
    pub fn write_table(path: &Path, df: &mut DataFrame) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(df)?;
        debug!(path = %path.display(), rows = df.height(), "wrote table");
        Ok(())
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl CensusModel {
    /// Read a CSV file with all columns as String dtype, trimming header names.
    fn read_csv_as_strings(&self, filename: &str) -> Result<DataFrame> {
        let path = self.resolve(filename);
        if !path.is_file() {
            return Err(ReportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;

        // Trim whitespace from column names
        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;
        Ok(df)
    }
}
