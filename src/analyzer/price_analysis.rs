use crate::analyzer::clusters::cluster;
use crate::analyzer::statistics::aggregate;
use crate::analyzer::support::track;
use crate::model::{AnalysisError, AnalysisParams, ConsecutiveBreaksAnalysis, RawPricePoint};
use crate::normalizer::normalize;
use tracing::{debug, warn};

/// Trait defining the interface for a support-break analyzer.
pub trait Analyzer: Send + Sync {
    /// Runs the full pipeline for one security.
    ///
    /// Malformed points are skipped and counted; conflicting duplicate dates
    /// fail with [`AnalysisError::DataIntegrity`].
    fn analyze(
        &self,
        stock_name: &str,
        raw_points: &[RawPricePoint],
        params: &AnalysisParams,
    ) -> Result<ConsecutiveBreaksAnalysis, AnalysisError>;
}

/// Implementation of the support-break analyzer. Holds no state between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyzerImpl;

impl AnalyzerImpl {
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for AnalyzerImpl {
    fn analyze(
        &self,
        stock_name: &str,
        raw_points: &[RawPricePoint],
        params: &AnalysisParams,
    ) -> Result<ConsecutiveBreaksAnalysis, AnalysisError> {
        params.validate()?;

        let normalized = normalize(raw_points)?;
        if normalized.skipped > 0 {
            warn!(
                "{}: skipped {} malformed price points",
                stock_name, normalized.skipped
            );
        }

        let series = normalized.series.window(params.date_from, params.date_to);
        let support = track(&series, params.min_drop_threshold);
        let clusters = cluster(&support.breaks, params.max_gap_days);
        let stats = aggregate(&support.breaks, &series);

        debug!(
            "{}: {} days, {} breaks, {} clusters",
            stock_name,
            series.len(),
            support.breaks.len(),
            clusters.len()
        );

        Ok(ConsecutiveBreaksAnalysis {
            stock_name: stock_name.to_string(),
            data: support.data,
            breaks: support.breaks,
            clusters,
            stats,
            skipped_points: normalized.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn raw(offset: i64, low: f64, close: f64) -> RawPricePoint {
        RawPricePoint {
            date: (start() + Duration::days(offset)).to_string(),
            open: Some(close),
            high: Some(close.max(low)),
            low: Some(low),
            close: Some(close),
            volume: Some(10_000.0),
        }
    }

    fn params(threshold: f64, max_gap: u32) -> AnalysisParams {
        AnalysisParams::new(threshold, max_gap).unwrap()
    }

    #[test]
    fn empty_input_gives_sparse_result() {
        let analysis = AnalyzerImpl::new().analyze("EMPTY", &[], &params(0.02, 10)).unwrap();
        assert_eq!(analysis.stock_name, "EMPTY");
        assert!(analysis.data.is_empty());
        assert!(analysis.breaks.is_empty());
        assert!(analysis.clusters.is_empty());
        assert!(analysis.stats.is_none());
    }

    #[test]
    fn declining_path_records_each_crossing_once() {
        // 100 -> 50 in ten days
        let points: Vec<RawPricePoint> = (0..10)
            .map(|i| {
                let low = 100.0 - 50.0 * i as f64 / 9.0;
                raw(i, low, low + 0.5)
            })
            .collect();
        let analysis = AnalyzerImpl::new().analyze("DECL", &points, &params(0.02, 10)).unwrap();

        assert_eq!(analysis.breaks.len(), 9);
        let mut dates: Vec<_> = analysis.breaks.iter().map(|b| b.date).collect();
        dates.dedup();
        assert_eq!(dates.len(), 9);
        assert_eq!(analysis.clusters.len(), 1);
        assert_eq!(analysis.stats.as_ref().unwrap().total_breaks, 9);
    }

    #[test]
    fn distant_third_break_forms_its_own_cluster() {
        let points = vec![
            raw(0, 100.0, 101.0),
            raw(1, 95.0, 96.0),
            raw(4, 90.0, 91.0),
            raw(10, 92.0, 93.0),
            raw(34, 85.0, 86.0),
            raw(35, 86.0, 87.0),
        ];
        let analysis = AnalyzerImpl::new().analyze("GAPS", &points, &params(0.02, 10)).unwrap();

        assert_eq!(analysis.breaks.len(), 3);
        assert_eq!(analysis.breaks[1].days_since, Some(3));
        assert_eq!(analysis.breaks[2].days_since, Some(30));
        assert_eq!(analysis.clusters.len(), 2);
        assert_eq!(analysis.clusters[0].num_breaks, 2);
        assert_eq!(analysis.clusters[1].num_breaks, 1);
        assert_eq!(analysis.clusters[1].breaks[0], analysis.breaks[2]);
    }

    #[test]
    fn floor_never_broken_has_no_statistics() {
        let points: Vec<RawPricePoint> = (0..20)
            .map(|i| raw(i, 50.0 + (i % 3) as f64, 55.0))
            .collect();
        let analysis = AnalyzerImpl::new().analyze("FLAT", &points, &params(0.02, 10)).unwrap();
        assert!(analysis.breaks.is_empty());
        assert!(analysis.stats.is_none());
        assert_eq!(analysis.data.len(), 20);
    }

    #[test]
    fn duplicate_dates_collapse_or_fail() {
        let analyzer = AnalyzerImpl::new();
        let same = vec![raw(0, 10.0, 11.0), raw(1, 9.0, 10.0), raw(1, 9.0, 10.0)];
        let analysis = analyzer.analyze("DUP", &same, &params(0.02, 10)).unwrap();
        assert_eq!(analysis.data.len(), 2);

        let conflicting = vec![raw(0, 10.0, 11.0), raw(1, 9.0, 10.0), raw(1, 9.0, 12.0)];
        let err = analyzer.analyze("DUP", &conflicting, &params(0.02, 10)).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DataIntegrity {
                date: start() + Duration::days(1)
            }
        );
    }

    #[test]
    fn skipped_points_are_reported() {
        let mut bad = raw(1, 9.0, 10.0);
        bad.close = None;
        let points = vec![raw(0, 10.0, 11.0), bad, raw(2, 9.5, 10.0)];
        let analysis = AnalyzerImpl::new().analyze("SKIP", &points, &params(0.02, 10)).unwrap();
        assert_eq!(analysis.skipped_points, 1);
        assert_eq!(analysis.data.len(), 2);
    }

    #[test]
    fn date_window_limits_the_series() {
        let points: Vec<RawPricePoint> = (0..10).map(|i| raw(i, 100.0 - 5.0 * i as f64, 100.0)).collect();
        let windowed = params(0.02, 10)
            .with_date_range(Some(start() + Duration::days(5)), Some(start() + Duration::days(7)))
            .unwrap();
        let analysis = AnalyzerImpl::new().analyze("WIN", &points, &windowed).unwrap();

        assert_eq!(analysis.data.len(), 3);
        assert_eq!(analysis.data[0].rolling_low, 75.0);
        assert_eq!(analysis.breaks.len(), 2);
        assert_eq!(analysis.stats.unwrap().days_before_first_break, 1);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad = AnalysisParams {
            min_drop_threshold: 1.5,
            max_gap_days: 10,
            date_from: None,
            date_to: None,
        };
        let err = AnalyzerImpl::new().analyze("X", &[raw(0, 1.0, 1.0)], &bad).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameters(_)));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let points = vec![
            raw(3, 90.0, 91.0),
            raw(0, 100.0, 101.0),
            raw(8, 70.0, 72.0),
            raw(5, 95.0, 96.0),
        ];
        let analyzer = AnalyzerImpl::new();
        let a = analyzer.analyze("REP", &points, &params(0.02, 4)).unwrap();
        let b = analyzer.analyze("REP", &points, &params(0.02, 4)).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn serializes_in_presentation_shape() {
        let points = vec![raw(0, 100.0, 101.0), raw(1, 90.0, 91.0)];
        let analysis = AnalyzerImpl::new().analyze("JSON", &points, &params(0.02, 10)).unwrap();
        let json = serde_json::to_value(&analysis).unwrap();

        assert_eq!(json["stockName"], "JSON");
        assert_eq!(json["data"][0]["rolling_low"], 100.0);
        assert!(json["data"][0]["last_break_date"].is_null());
        assert_eq!(json["breaks"][0]["date"], "2024-01-02");
        assert!(json["breaks"][0]["days_since"].is_null());
        assert!(json["clusters"][0].get("avg_gap").is_none());
        assert_eq!(json["stats"]["totalBreaks"], 1);
    }
}
