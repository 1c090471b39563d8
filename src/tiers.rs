//! Rank and quantile based tier selection.

use std::cmp::Ordering;

use tracing::debug;

/// Top and bottom `n` groups by a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Extremes<K> {
    /// Highest first.
    pub top: Vec<(K, f64)>,
    /// Lowest first.
    pub bottom: Vec<(K, f64)>,
}

impl<K: PartialEq> Extremes<K> {
    /// True when a group was picked as both top and bottom (fewer than `2n` groups).
    pub fn overlaps(&self) -> bool {
        self.top
            .iter()
            .any(|(k, _)| self.bottom.iter().any(|(b, _)| b == k))
    }
}

impl<K: Clone> Extremes<K> {
    /// Flatten into display order: top groups then bottom groups, each by metric descending.
    pub fn labelled(&self, high: &str, low: &str) -> Vec<RankedGroup<K>> {
        let mut bottom = self.bottom.clone();
        bottom.sort_by(|a, b| descending(a.1, b.1));

        self.top
            .iter()
            .map(|(k, v)| RankedGroup {
                group: k.clone(),
                score: *v,
                tier: high.to_string(),
            })
            .chain(bottom.into_iter().map(|(k, v)| RankedGroup {
                group: k,
                score: v,
                tier: low.to_string(),
            }))
            .collect()
    }
}

/// A selected group with its tier label.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGroup<K> {
    pub group: K,
    pub score: f64,
    pub tier: String,
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Pick the `n` highest and `n` lowest groups.
///
/// Sorting is stable, so ties keep input order. NaN metrics are never
/// selected. With fewer than `2n` groups the two lists may share members.
pub fn select_extremes<K: Clone>(metric: &[(K, f64)], n: usize) -> Extremes<K> {
    let mut defined: Vec<(K, f64)> = metric
        .iter()
        .filter(|(_, v)| !v.is_nan())
        .cloned()
        .collect();

    defined.sort_by(|a, b| descending(a.1, b.1));
    let top = defined.iter().take(n).cloned().collect();

    defined.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    let bottom = defined.into_iter().take(n).collect();

    Extremes { top, bottom }
}

/// Linear-interpolated quantile of the defined values, `q` in `[0, 1]`.
///
/// NaN values are skipped; `None` when nothing is left.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// A quantile level and the tier label for values at or above it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileCut {
    pub quantile: f64,
    pub label: String,
}

impl QuantileCut {
    pub fn new(quantile: f64, label: &str) -> Self {
        Self {
            quantile,
            label: label.to_string(),
        }
    }
}

/// Resolved cut: the value threshold a quantile level maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub value: f64,
    pub label: String,
}

/// Quantile classification with thresholds fixed from one value set.
///
/// The thresholds can then be applied to other values, e.g. area-level cut
/// points reused for regional shares.
#[derive(Debug, Clone)]
pub struct QuantileTiers {
    thresholds: Vec<Threshold>,
    other: String,
    no_data: String,
}

impl QuantileTiers {
    pub fn from_values(
        values: &[Option<f64>],
        cuts: &[QuantileCut],
        other: &str,
        no_data: &str,
    ) -> Self {
        let defined: Vec<f64> = values.iter().flatten().copied().collect();

        let mut ordered: Vec<&QuantileCut> = cuts.iter().collect();
        ordered.sort_by(|a, b| descending(a.quantile, b.quantile));

        let thresholds: Vec<Threshold> = ordered
            .into_iter()
            .filter_map(|c| {
                quantile(&defined, c.quantile).map(|value| Threshold {
                    value,
                    label: c.label.clone(),
                })
            })
            .collect();

        for t in &thresholds {
            debug!(tier = %t.label, threshold = t.value, "quantile threshold");
        }

        Self {
            thresholds,
            other: other.to_string(),
            no_data: no_data.to_string(),
        }
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Missing values first, then the highest threshold met (inclusive).
    pub fn classify(&self, value: Option<f64>) -> &str {
        let Some(v) = value.filter(|v| !v.is_nan()) else {
            return &self.no_data;
        };
        self.thresholds
            .iter()
            .find(|t| v >= t.value)
            .map(|t| t.label.as_str())
            .unwrap_or(self.other.as_str())
    }

    /// Every label this classifier can produce, highest tier first.
    pub fn labels(&self) -> Vec<&str> {
        self.thresholds
            .iter()
            .map(|t| t.label.as_str())
            .chain([self.other.as_str(), self.no_data.as_str()])
            .collect()
    }
}

/// Classify `values` against quantile cut points derived from the values themselves.
pub fn quantile_tier(
    values: &[Option<f64>],
    cuts: &[QuantileCut],
    other: &str,
    no_data: &str,
) -> Vec<String> {
    let tiers = QuantileTiers::from_values(values, cuts, other, no_data);
    values
        .iter()
        .map(|v| tiers.classify(*v).to_string())
        .collect()
}
