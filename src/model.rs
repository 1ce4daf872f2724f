// Core structs: price points, support breaks, clusters, analysis records and errors
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A price point as received from a price-history provider, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPricePoint {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily prices of one security, strictly ascending by date.
///
/// Only the normalizer builds a series from scratch, so every instance holds
/// unique, ordered dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub(crate) fn from_sorted(points: Vec<PricePoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        Self { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Restricts the series to the inclusive `[from, to]` window. Open bounds keep everything on that side.
    pub fn window(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> PriceSeries {
        let points = self
            .points
            .iter()
            .filter(|p| from.is_none_or(|f| p.date >= f) && to.is_none_or(|t| p.date <= t))
            .copied()
            .collect();
        PriceSeries { points }
    }
}

/// One input day annotated with the support level in force on that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingLowPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rolling_low: f64,
    pub last_break_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportBreak {
    pub date: NaiveDate,
    pub prev_support: f64,
    pub new_support: f64,
    /// Fractional decline, `(prev_support - new_support) / prev_support`.
    pub drop_pct: f64,
    /// Calendar days since the previous break, `None` for the first one.
    pub days_since: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakCluster {
    pub id: usize,
    pub breaks: Vec<SupportBreak>,
    pub num_breaks: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_gap: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gap: Option<i64>,
    pub total_drop: f64,
    pub avg_drop: f64,
    pub median_drop: f64,
}

/// Series-wide aggregates over every break of one security.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakStatistics {
    pub total_breaks: usize,
    pub stability: f64,
    pub avg_drop: f64,
    pub max_drop: f64,
    pub avg_days_between: Option<f64>,
    pub median_days_between: Option<f64>,
    pub min_days_between: Option<i64>,
    pub max_days_between: Option<i64>,
    pub days_since_last_break: i64,
    pub days_before_first_break: i64,
    pub trading_days_per_break: f64,
    pub first_break_date: NaiveDate,
    pub last_break_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsecutiveBreaksAnalysis {
    pub stock_name: String,
    pub data: Vec<RollingLowPoint>,
    pub breaks: Vec<SupportBreak>,
    pub clusters: Vec<BreakCluster>,
    pub stats: Option<BreakStatistics>,
    /// Input points dropped as malformed during normalization.
    pub skipped_points: usize,
}

/// Direction of support stability between the first and second half of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityTrend {
    Improving,
    Stable,
    Weakening,
}

/// Coarse classification of how a security's support tends to behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    NeverBreaks,
    ExhaustedCascade,
    ShallowBreaker,
    Volatile,
    Stable,
    PredictableCycles,
}

/// Derived support-level indicators for one analyzed security.
///
/// Percent-named fields are fractions like `drop_pct`; the strength score is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportMetrics {
    pub stock_name: String,
    pub current_price: Option<f64>,
    pub rolling_low: Option<f64>,
    /// `(rolling_low - close) / close` on the last day; negative while price sits above support.
    pub distance_to_support_pct: Option<f64>,
    pub total_breaks: usize,
    pub days_since_last_break: Option<i64>,
    pub stability: f64,
    pub stability_trend: StabilityTrend,
    pub drop_std_dev: f64,
    pub num_clusters: usize,
    pub max_consecutive_breaks: usize,
    pub current_consecutive_breaks: usize,
    pub support_strength_score: f64,
    pub pattern_type: PatternType,
    pub break_probability_30d: f64,
    pub break_probability_60d: f64,
    pub data_through_date: Option<NaiveDate>,
}

/// Tuning for one analysis run. Every value is supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    pub min_drop_threshold: f64,
    pub max_gap_days: u32,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl AnalysisParams {
    pub fn new(min_drop_threshold: f64, max_gap_days: u32) -> Result<Self, AnalysisError> {
        let params = Self {
            min_drop_threshold,
            max_gap_days,
            date_from: None,
            date_to: None,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_date_range(
        mut self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<Self, AnalysisError> {
        self.date_from = date_from;
        self.date_to = date_to;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let t = self.min_drop_threshold;
        if !(t.is_finite() && t > 0.0 && t < 1.0) {
            return Err(AnalysisError::InvalidParameters(format!(
                "min_drop_threshold must lie in (0, 1), got {}",
                t
            )));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(AnalysisError::InvalidParameters(format!(
                    "date_from {} is after date_to {}",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("conflicting price points for date {date}")]
    DataIntegrity { date: NaiveDate },

    #[error("invalid analysis parameters: {0}")]
    InvalidParameters(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column: {0}")]
    MissingColumn(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response status: {0}")]
    InvalidResponse(u16),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
