use crate::model::{AnalysisError, PricePoint, PriceSeries, RawPricePoint};
use crate::utils::{approx_eq, parse_date};
use tracing::debug;

/// Relative tolerance under which two points for the same date count as identical.
pub const DUPLICATE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub series: PriceSeries,
    /// Malformed points dropped (bad date, missing or non-positive low/close).
    pub skipped: usize,
    /// Identical duplicates collapsed into their first occurrence.
    pub duplicates: usize,
}

/// Validates, sorts and de-duplicates raw points into a [`PriceSeries`].
pub fn normalize(raw: &[RawPricePoint]) -> Result<NormalizedSeries, AnalysisError> {
    let mut points: Vec<PricePoint> = raw.iter().filter_map(normalize_point).collect();
    let skipped = raw.len() - points.len();

    // stable: among equal dates the first input occurrence stays first
    points.sort_by_key(|p| p.date);

    let mut unique: Vec<PricePoint> = Vec::with_capacity(points.len());
    let mut duplicates = 0;
    for point in points {
        match unique.last() {
            Some(kept) if kept.date == point.date => {
                if !same_values(kept, &point) {
                    return Err(AnalysisError::DataIntegrity { date: point.date });
                }
                duplicates += 1;
            }
            _ => unique.push(point),
        }
    }

    if skipped > 0 || duplicates > 0 {
        debug!("Normalized {} points: {} skipped, {} duplicates", raw.len(), skipped, duplicates);
    }

    Ok(NormalizedSeries {
        series: PriceSeries::from_sorted(unique),
        skipped,
        duplicates,
    })
}

fn normalize_point(raw: &RawPricePoint) -> Option<PricePoint> {
    let date = parse_date(&raw.date)?;
    let low = positive(raw.low)?;
    let close = positive(raw.close)?;

    Some(PricePoint {
        date,
        open: finite(raw.open).unwrap_or(close),
        high: finite(raw.high).unwrap_or(close),
        low,
        close,
        volume: finite(raw.volume).unwrap_or(0.0),
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn positive(value: Option<f64>) -> Option<f64> {
    finite(value).filter(|v| *v > 0.0)
}

fn same_values(a: &PricePoint, b: &PricePoint) -> bool {
    [
        (a.open, b.open),
        (a.high, b.high),
        (a.low, b.low),
        (a.close, b.close),
        (a.volume, b.volume),
    ]
    .iter()
    .all(|&(x, y)| approx_eq(x, y, DUPLICATE_TOLERANCE))
}
