use crate::analyzer::{mean, median};
use crate::model::{BreakStatistics, PriceSeries, SupportBreak};
use crate::utils::days_between;

/// Aggregates every break of a security against its full price history.
///
/// Returns `None` when there are no breaks (or no history to measure them against).
pub fn aggregate(breaks: &[SupportBreak], series: &PriceSeries) -> Option<BreakStatistics> {
    let (first_break, last_break) = (breaks.first()?, breaks.last()?);
    let (first_day, last_day) = (series.first()?, series.last()?);

    let total_breaks = breaks.len();
    let trading_days = series.len();

    let drops: Vec<f64> = breaks.iter().map(|b| b.drop_pct).collect();
    let gaps: Vec<i64> = breaks.iter().filter_map(|b| b.days_since).collect();
    let gap_values: Vec<f64> = gaps.iter().map(|&g| g as f64).collect();

    let stability = (1.0 - total_breaks as f64 / trading_days as f64).clamp(0.0, 1.0);

    Some(BreakStatistics {
        total_breaks,
        stability,
        avg_drop: mean(&drops).unwrap_or(0.0),
        max_drop: drops.iter().copied().fold(f64::MIN, f64::max),
        avg_days_between: mean(&gap_values),
        median_days_between: median(&gap_values),
        min_days_between: gaps.iter().copied().min(),
        max_days_between: gaps.iter().copied().max(),
        days_since_last_break: days_between(last_break.date, last_day.date),
        days_before_first_break: days_between(first_day.date, first_break.date),
        trading_days_per_break: trading_days as f64 / total_breaks as f64,
        first_break_date: first_break.date,
        last_break_date: last_break.date,
    })
}
