use crate::analyzer::{mean, median};
use crate::model::{
    BreakCluster, ConsecutiveBreaksAnalysis, PatternType, RollingLowPoint, StabilityTrend, SupportBreak,
    SupportMetrics,
};
use crate::utils::days_between;
use chrono::NaiveDate;

/// Fewer days than this and the half-vs-half comparison is reported as stable.
const TREND_MIN_DAYS: usize = 10;
/// Stability difference between halves that counts as a trend.
const TREND_THRESHOLD: f64 = 0.05;
/// Days over which the recency and frequency components of the strength score saturate.
const SCORE_HORIZON_DAYS: f64 = 365.0;

/// Derives the support-level indicators of one analysis.
///
/// `max_gap_days` decides whether the most recent cluster is still running.
pub fn support_metrics(analysis: &ConsecutiveBreaksAnalysis, max_gap_days: u32) -> SupportMetrics {
    let last_day = analysis.data.last();
    let latest_date = last_day.map(|d| d.date);
    let total_days = analysis.data.len();
    let total_breaks = analysis.breaks.len();

    let stability = if total_days == 0 {
        1.0
    } else {
        (1.0 - total_breaks as f64 / total_days as f64).clamp(0.0, 1.0)
    };

    let drops: Vec<f64> = analysis.breaks.iter().map(|b| b.drop_pct).collect();
    let gaps: Vec<f64> = analysis.breaks.iter().filter_map(|b| b.days_since).map(|g| g as f64).collect();
    let drop_std_dev = std_dev(&drops);
    let avg_days_between = mean(&gaps);

    let days_since_last_break = match (analysis.breaks.last(), latest_date) {
        (Some(brk), Some(latest)) => Some(days_between(brk.date, latest)),
        _ => None,
    };
    let trading_days_per_break = if total_breaks > 0 {
        total_days as f64 / total_breaks as f64
    } else {
        total_days as f64
    };

    let max_consecutive_breaks = analysis.clusters.iter().map(|c| c.num_breaks).max().unwrap_or(0);
    let current_consecutive_breaks = current_consecutive_breaks(&analysis.clusters, latest_date, max_gap_days);

    let distance_to_support_pct = last_day
        .filter(|d| d.close > 0.0)
        .map(|d| (d.rolling_low - d.close) / d.close);

    SupportMetrics {
        stock_name: analysis.stock_name.clone(),
        current_price: last_day.map(|d| d.close),
        rolling_low: last_day.map(|d| d.rolling_low),
        distance_to_support_pct,
        total_breaks,
        days_since_last_break,
        stability,
        stability_trend: stability_trend(&analysis.data, &analysis.breaks),
        drop_std_dev,
        num_clusters: analysis.clusters.len(),
        max_consecutive_breaks,
        current_consecutive_breaks,
        support_strength_score: support_strength_score(
            stability,
            days_since_last_break,
            trading_days_per_break,
            drop_std_dev,
        ),
        pattern_type: classify_pattern(
            stability,
            max_consecutive_breaks,
            current_consecutive_breaks,
            median(&drops),
            total_breaks,
        ),
        break_probability_30d: break_probability(days_since_last_break, avg_days_between, stability, 30),
        break_probability_60d: break_probability(days_since_last_break, avg_days_between, stability, 60),
        data_through_date: latest_date,
    }
}

/// Compares break density of the first and second half of the history.
pub fn stability_trend(data: &[RollingLowPoint], breaks: &[SupportBreak]) -> StabilityTrend {
    if data.len() < TREND_MIN_DAYS {
        return StabilityTrend::Stable;
    }

    let mid = data.len() / 2;
    let split = data[mid].date;
    let first_breaks = breaks.iter().filter(|b| b.date < split).count();
    let second_breaks = breaks.len() - first_breaks;

    let first = 1.0 - first_breaks as f64 / mid as f64;
    let second = 1.0 - second_breaks as f64 / (data.len() - mid) as f64;
    let diff = second - first;

    if diff > TREND_THRESHOLD {
        StabilityTrend::Improving
    } else if diff < -TREND_THRESHOLD {
        StabilityTrend::Weakening
    } else {
        StabilityTrend::Stable
    }
}

/// First matching rule wins; anything unmatched is a predictable cycle.
pub fn classify_pattern(
    stability: f64,
    max_consecutive: usize,
    current_consecutive: usize,
    median_drop: Option<f64>,
    total_breaks: usize,
) -> PatternType {
    if stability >= 0.995 {
        return PatternType::NeverBreaks;
    }
    if max_consecutive > 0 && current_consecutive as f64 >= 0.8 * max_consecutive as f64 {
        return PatternType::ExhaustedCascade;
    }
    if median_drop.is_some_and(|d| d < 0.02) {
        return PatternType::ShallowBreaker;
    }
    if stability < 0.70 && median_drop.is_some_and(|d| d > 0.05) {
        return PatternType::Volatile;
    }
    if stability >= 0.85 && total_breaks < 10 {
        return PatternType::Stable;
    }
    PatternType::PredictableCycles
}

/// Composite 0-100 score: stability 30%, recency 25%, frequency 25%, drop consistency 20%.
pub fn support_strength_score(
    stability: f64,
    days_since_break: Option<i64>,
    trading_days_per_break: f64,
    drop_std_dev: f64,
) -> f64 {
    let stability_score = stability * 100.0;
    let recency_score = match days_since_break {
        None => 100.0,
        Some(days) => (days as f64 / SCORE_HORIZON_DAYS * 100.0).min(100.0),
    };
    let frequency_score = (trading_days_per_break / SCORE_HORIZON_DAYS * 100.0).min(100.0);
    // a 10 percentage-point spread in drops scores zero
    let consistency_score = (100.0 - drop_std_dev * 100.0 * 10.0).max(0.0);

    round_to(
        stability_score * 0.30 + recency_score * 0.25 + frequency_score * 0.25 + consistency_score * 0.20,
        2,
    )
}

/// Rough chance of a break within `days_ahead` days.
///
/// Without a gap history the break rate `1 - stability` stands in. Otherwise
/// the rate is scaled up as the time since the last break approaches (and
/// passes, capped at twice) the average gap, then scaled down when the
/// average gap is longer than the horizon. Always within `[0, 1]`.
pub fn break_probability(
    days_since_break: Option<i64>,
    avg_days_between: Option<f64>,
    stability: f64,
    days_ahead: u32,
) -> f64 {
    let base = (1.0 - stability).clamp(0.0, 1.0);
    let (Some(days_since), Some(avg_gap)) = (days_since_break, avg_days_between) else {
        return base;
    };
    if avg_gap <= 0.0 {
        return base;
    }

    let time_factor = (days_since as f64 / avg_gap).clamp(0.0, 2.0);
    let probability = (base * (1.0 + time_factor) / 2.0).min(1.0);
    let horizon_factor = (f64::from(days_ahead) / avg_gap).min(1.0);

    round_to(probability * horizon_factor, 4)
}

/// Breaks in the last cluster if it ended within `max_gap_days` of the latest date.
fn current_consecutive_breaks(
    clusters: &[BreakCluster],
    latest_date: Option<NaiveDate>,
    max_gap_days: u32,
) -> usize {
    match (clusters.last(), latest_date) {
        (Some(last), Some(latest)) if days_between(last.end_date, latest) <= i64::from(max_gap_days) => {
            last.num_breaks
        }
        _ => 0,
    }
}

/// Population standard deviation, `0` for an empty slice.
fn std_dev(values: &[f64]) -> f64 {
    let Some(avg) = mean(values) else {
        return 0.0;
    };
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
