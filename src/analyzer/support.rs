use crate::model::{PricePoint, PriceSeries, RollingLowPoint, SupportBreak};
use crate::utils::days_between;
use chrono::NaiveDate;

/// Output of one pass over a series: the annotated days and the breaks found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportTrack {
    pub data: Vec<RollingLowPoint>,
    pub breaks: Vec<SupportBreak>,
}

/// Accumulator threaded through the fold.
#[derive(Debug, Clone, Copy)]
struct TrackerState {
    support: f64,
    last_break_date: Option<NaiveDate>,
}

impl TrackerState {
    /// Advances the state by one day, returning the break it caused, if any.
    ///
    /// A new low within `threshold` of the support leaves the support pinned.
    fn step(&mut self, point: &PricePoint, threshold: f64) -> Option<SupportBreak> {
        if point.low >= self.support * (1.0 - threshold) {
            return None;
        }

        let brk = SupportBreak {
            date: point.date,
            prev_support: self.support,
            new_support: point.low,
            drop_pct: (self.support - point.low) / self.support,
            days_since: self.last_break_date.map(|last| days_between(last, point.date)),
        };
        self.support = point.low;
        self.last_break_date = Some(point.date);
        Some(brk)
    }

    fn annotate(&self, point: &PricePoint) -> RollingLowPoint {
        RollingLowPoint {
            date: point.date,
            open: point.open,
            high: point.high,
            low: point.low,
            close: point.close,
            volume: point.volume,
            rolling_low: self.support,
            last_break_date: self.last_break_date,
        }
    }
}

/// Walks `series` once, tracking the support level and recording every decisive break.
///
/// `min_drop_threshold` is the fractional decline below the current support a
/// new low must reach to count as a break.
pub fn track(series: &PriceSeries, min_drop_threshold: f64) -> SupportTrack {
    let Some(first) = series.first() else {
        return SupportTrack::default();
    };

    let initial = TrackerState {
        support: first.low,
        last_break_date: None,
    };
    let mut track = SupportTrack {
        data: Vec::with_capacity(series.len()),
        breaks: Vec::new(),
    };
    track.data.push(initial.annotate(first));

    let (_, track) = series.points()[1..].iter().fold(
        (initial, track),
        |(mut state, mut track), point| {
            if let Some(brk) = state.step(point, min_drop_threshold) {
                track.breaks.push(brk);
            }
            track.data.push(state.annotate(point));
            (state, track)
        },
    );
    track
}
