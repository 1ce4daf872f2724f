// Analyzer module: support tracking, clustering, statistics and the per-security pipeline.

pub mod clusters;
pub mod metrics;
pub mod portfolio;
pub mod price_analysis;
pub mod statistics;
pub mod support;

// Re-export the main Analyzer implementation for ease of use.
pub use price_analysis::{Analyzer, AnalyzerImpl};

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; even-length input averages the two middle values.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
