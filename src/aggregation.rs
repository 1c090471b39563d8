use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{ReportError, Result};

/// Declarative per-group aggregation.
///
/// Reports build a list of these; `aggregate_by` turns them into one
/// polars group-by.
#[derive(Debug, Clone)]
pub enum Aggregation {
    /// Sum each column, keeping the column name.
    Sum { columns: Vec<String> },
    /// Mean of one column, nulls skipped.
    Mean { column: String, alias: Option<String> },
    /// First value seen in the group.
    First { column: String, alias: Option<String> },
}

impl Aggregation {
    pub fn sum<S: AsRef<str>>(columns: &[S]) -> Self {
        Self::Sum {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn mean(column: &str, alias: Option<&str>) -> Self {
        Self::Mean {
            column: column.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    pub fn first(column: &str, alias: Option<&str>) -> Self {
        Self::First {
            column: column.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    fn exprs(&self) -> Vec<Expr> {
        match self {
            Self::Sum { columns } => columns
                .iter()
                .map(|c| col(c.as_str()).sum().alias(c.as_str()))
                .collect(),
            Self::Mean { column, alias } => {
                let name = alias.clone().unwrap_or_else(|| column.clone());
                vec![col(column.as_str()).mean().alias(name)]
            }
            Self::First { column, alias } => {
                let name = alias.clone().unwrap_or_else(|| column.clone());
                vec![col(column.as_str()).first().alias(name)]
            }
        }
    }

    fn columns(&self) -> Vec<&str> {
        match self {
            Self::Sum { columns } => columns.iter().map(String::as_str).collect(),
            Self::Mean { column, .. } | Self::First { column, .. } => vec![column.as_str()],
        }
    }
}

/// Apply aggregations per value of `group_key`.
///
/// Rows with a null key are ignored. Groups come out in order of first
/// appearance, so downstream tie-breaking follows input order.
pub fn aggregate_by(
    df: &DataFrame,
    group_key: &str,
    aggregations: &[Aggregation],
) -> Result<DataFrame> {
    if df.column(group_key).is_err() {
        return Err(ReportError::ColumnNotFound(group_key.to_string()));
    }
    for agg in aggregations {
        for c in agg.columns() {
            if df.column(c).is_err() {
                return Err(ReportError::ColumnNotFound(c.to_string()));
            }
        }
    }

    let exprs: Vec<Expr> = aggregations.iter().flat_map(|a| a.exprs()).collect();
    let result = df
        .clone()
        .lazy()
        .filter(col(group_key).is_not_null())
        .group_by_stable([col(group_key)])
        .agg(exprs)
        .collect()?;

    debug!(group_key, groups = result.height(), "aggregated");
    Ok(result)
}

/// Sum each measure column per group.
pub fn aggregate<S: AsRef<str>>(
    df: &DataFrame,
    group_key: &str,
    measure_cols: &[S],
) -> Result<DataFrame> {
    aggregate_by(df, group_key, &[Aggregation::sum(measure_cols)])
}

/// Mean of `metric` per group as `(group, mean)` pairs, first-seen order.
///
/// Groups whose metric is entirely null get NaN.
pub fn group_mean(df: &DataFrame, group_key: &str, metric: &str) -> Result<Vec<(String, f64)>> {
    let means = aggregate_by(df, group_key, &[Aggregation::mean(metric, None)])?;
    let keys = means.column(group_key)?.str()?;
    let values = means.column(metric)?.f64()?;

    Ok(keys
        .into_iter()
        .zip(values)
        .filter_map(|(k, v)| k.map(|k| (k.to_string(), v.unwrap_or(f64::NAN))))
        .collect())
}

/// Replace each measure with its percentage of the row total.
///
/// A zero total produces NaN in every measure of that row; callers drop
/// those rows with [`drop_undefined_rows`] before using the table.
pub fn normalize_to_percentage<S: AsRef<str>>(
    totals: DataFrame,
    measure_cols: &[S],
) -> Result<DataFrame> {
    let Some(total) = measure_cols
        .iter()
        .map(|c| col(c.as_ref()))
        .reduce(|acc, e| acc + e)
    else {
        return Ok(totals);
    };

    let exprs: Vec<Expr> = measure_cols
        .iter()
        .map(|c| (col(c.as_ref()) / total.clone() * lit(100.0)).alias(c.as_ref()))
        .collect();

    Ok(totals.lazy().with_columns(exprs).collect()?)
}

/// Drop rows where any of `columns` is null or NaN.
pub fn drop_undefined_rows<S: AsRef<str>>(df: DataFrame, columns: &[S]) -> Result<DataFrame> {
    let Some(defined) = columns
        .iter()
        .map(|c| col(c.as_ref()).is_not_null().and(col(c.as_ref()).is_not_nan()))
        .reduce(|acc, e| acc.and(e))
    else {
        return Ok(df);
    };

    let before = df.height();
    let kept = df.lazy().filter(defined).collect()?;
    if kept.height() < before {
        warn!(
            dropped = before - kept.height(),
            "dropped rows with undefined ratios"
        );
    }
    Ok(kept)
}

/// One group's composition vector.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionRow {
    pub group: String,
    pub percentages: Vec<f64>,
}

impl CompositionRow {
    pub fn total(&self) -> f64 {
        self.percentages.iter().sum()
    }
}

/// Read a normalised table back into plain rows.
pub fn composition_rows<S: AsRef<str>>(
    df: &DataFrame,
    group_key: &str,
    measure_cols: &[S],
) -> Result<Vec<CompositionRow>> {
    let keys = df.column(group_key)?.str()?;
    let measures: Vec<&Float64Chunked> = measure_cols
        .iter()
        .map(|c| df.column(c.as_ref()).and_then(|s| s.f64()))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let group = keys
            .get(i)
            .ok_or_else(|| ReportError::General(format!("Null {group_key} at row {i}")))?;
        let percentages = measures
            .iter()
            .map(|m| m.get(i).unwrap_or(f64::NAN))
            .collect();
        rows.push(CompositionRow {
            group: group.to_string(),
            percentages,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations() -> DataFrame {
        df!(
            "region" => [Some("B"), Some("A"), Some("B"), None, Some("C")],
            "x" => [Some(10.0), Some(30.0), Some(20.0), Some(99.0), Some(0.0)],
            "y" => [Some(40.0), Some(70.0), None, Some(1.0), Some(0.0)],
            "score" => [Some(0.2), Some(0.5), Some(0.4), Some(1.0), None]
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_sums_in_first_seen_order() {
        let totals = aggregate(&observations(), "region", &["x", "y"]).unwrap();
        let keys: Vec<&str> = totals.column("region").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(keys, vec!["B", "A", "C"]);

        let x = totals.column("x").unwrap().f64().unwrap();
        let y = totals.column("y").unwrap().f64().unwrap();
        assert_eq!(x.get(0), Some(30.0));
        assert_eq!(y.get(0), Some(40.0));
        assert_eq!(x.get(1), Some(30.0));
        assert_eq!(y.get(1), Some(70.0));
    }

    #[test]
    fn test_aggregate_unknown_column() {
        let err = aggregate(&observations(), "region", &["nope"]).unwrap_err();
        assert!(matches!(err, ReportError::ColumnNotFound(c) if c == "nope"));
    }

    #[test]
    fn test_normalize_sums_to_hundred_and_zero_total_is_dropped() {
        let totals = aggregate(&observations(), "region", &["x", "y"]).unwrap();
        let pct = normalize_to_percentage(totals, &["x", "y"]).unwrap();
        let pct = drop_undefined_rows(pct, &["x", "y"]).unwrap();

        let rows = composition_rows(&pct, "region", &["x", "y"]).unwrap();
        assert_eq!(rows.len(), 2, "C has a zero total");
        for row in &rows {
            assert!((row.total() - 100.0).abs() < 1e-6);
        }
        let a = rows.iter().find(|r| r.group == "A").unwrap();
        assert!((a.percentages[0] - 30.0).abs() < 1e-9);
        assert!((a.percentages[1] - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_mean_skips_nulls() {
        let means = group_mean(&observations(), "region", "score").unwrap();
        assert_eq!(means.len(), 3);
        assert_eq!(means[0].0, "B");
        assert!((means[0].1 - 0.3).abs() < 1e-9);
        assert!(means[2].1.is_nan());
    }

    #[test]
    fn test_first_keeps_first_seen_value() {
        let df = df!(
            "CMANAME" => ["Halifax", "Halifax", "Moncton"],
            "PRNAME" => ["Nova Scotia", "Elsewhere", "New Brunswick"]
        )
        .unwrap();
        let firsts = aggregate_by(&df, "CMANAME", &[Aggregation::first("PRNAME", None)]).unwrap();
        let provinces: Vec<&str> = firsts.column("PRNAME").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(provinces, vec!["Nova Scotia", "New Brunswick"]);
    }
}
