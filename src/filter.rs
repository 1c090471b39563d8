//! Row exclusion by region name and derived label columns.

use polars::prelude::*;
use tracing::info;

use crate::error::Result;

/// Case-insensitive substring blacklist for region names.
///
/// Used to drop non-metropolitan categories ("No metropolitan influenced
/// zone", "Outside CAs", ...) before regions are compared.
#[derive(Debug, Clone, Default)]
pub struct RegionFilter {
    needles: Vec<String>,
}

impl RegionFilter {
    pub fn new<S: AsRef<str>>(excluded: &[S]) -> Self {
        let needles = excluded
            .iter()
            .map(|s| s.as_ref().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { needles }
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }

    /// True when `name` contains any excluded substring.
    pub fn is_excluded(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.needles.iter().any(|n| name.contains(n.as_str()))
    }

    /// Drop every row whose `column` value is excluded. Null names are kept.
    pub fn apply(&self, df: &DataFrame, column: &str) -> Result<DataFrame> {
        if self.is_empty() {
            return Ok(df.clone());
        }
        let names = df.column(column)?.str()?;
        let mask: BooleanChunked = names
            .into_iter()
            .map(|v| Some(v.map_or(true, |name| !self.is_excluded(name))))
            .collect();
        let kept = df.filter(&mask)?;
        info!(
            column,
            removed = df.height() - kept.height(),
            kept = kept.height(),
            "applied region exclusions"
        );
        Ok(kept)
    }
}

/// `"<name> (<province>)"`.
pub fn region_label(name: &str, province: &str) -> String {
    format!("{name} ({province})")
}

/// Add a `"<name> (<province>)"` column; null when either part is null.
pub fn with_region_label(
    df: DataFrame,
    name_col: &str,
    province_col: &str,
    alias: &str,
) -> Result<DataFrame> {
    let labels: StringChunked = {
        let names = df.column(name_col)?.str()?;
        let provinces = df.column(province_col)?.str()?;
        names
            .into_iter()
            .zip(provinces)
            .map(|(n, p)| match (n, p) {
                (Some(n), Some(p)) => Some(region_label(n, p)),
                _ => None,
            })
            .collect()
    };
    let mut df = df;
    df.with_column(labels.with_name(alias.into()).into_series())?;
    Ok(df)
}

/// Append `numerator / (numerator + other) * 100` as `alias`.
///
/// A zero denominator yields NaN; nulls propagate.
pub fn with_share(df: DataFrame, numerator: &str, other: &str, alias: &str) -> Result<DataFrame> {
    let df = df
        .lazy()
        .with_column(
            (col(numerator) / (col(numerator) + col(other)) * lit(100.0)).alias(alias),
        )
        .collect()?;
    Ok(df)
}

/// Keep rows where `column` is neither null nor NaN.
pub fn drop_undefined(df: DataFrame, column: &str) -> Result<DataFrame> {
    let df = df
        .lazy()
        .filter(col(column).is_not_null().and(col(column).is_not_nan()))
        .collect()?;
    Ok(df)
}
