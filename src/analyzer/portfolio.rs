use crate::analyzer::Analyzer;
use crate::model::{AnalysisParams, ConsecutiveBreaksAnalysis, RawPricePoint};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A security whose analysis could not be completed.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityFailure {
    pub stock_name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct PortfolioReport {
    /// Successful analyses, ordered by stock name.
    pub analyses: Vec<ConsecutiveBreaksAnalysis>,
    pub failures: Vec<SecurityFailure>,
}

/// Analyzes every security on the blocking pool, one task per security.
///
/// A failure in one security is recorded in the report and never stops the others.
pub async fn analyze_portfolio<A>(
    analyzer: Arc<A>,
    histories: BTreeMap<String, Vec<RawPricePoint>>,
    params: AnalysisParams,
) -> PortfolioReport
where
    A: Analyzer + 'static,
{
    info!("Analyzing {} securities...", histories.len());

    let tasks: Vec<_> = histories
        .into_iter()
        .map(|(stock_name, points)| {
            let analyzer = analyzer.clone();
            let name = stock_name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                analyzer.analyze(&name, &points, &params)
            });
            async move { (stock_name, handle.await) }
        })
        .collect();

    let mut report = PortfolioReport::default();
    for (stock_name, outcome) in join_all(tasks).await {
        match outcome {
            Ok(Ok(analysis)) => report.analyses.push(analysis),
            Ok(Err(e)) => {
                warn!("Analysis failed for {}: {}", stock_name, e);
                report.failures.push(SecurityFailure {
                    stock_name,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Analysis task for {} did not complete: {}", stock_name, e);
                report.failures.push(SecurityFailure {
                    stock_name,
                    reason: format!("worker failed: {}", e),
                });
            }
        }
    }

    info!(
        "Portfolio done: {} analyzed, {} failed",
        report.analyses.len(),
        report.failures.len()
    );
    report
}
