use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use support_breaks::analyzer::AnalyzerImpl;
use support_breaks::analyzer::metrics::support_metrics;
use support_breaks::analyzer::portfolio::{PortfolioReport, analyze_portfolio};
use support_breaks::config::{AppConfig, SourceConfig, load_config};
use support_breaks::model::{ConsecutiveBreaksAnalysis, RawPricePoint, SupportMetrics};
use support_breaks::parser::{Parser, StockDataParser};
use support_breaks::source::{FileSource, HttpSource, PriceSource};
use support_breaks::storage::SqliteStorage;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let (config, params) = match load_config(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    let Some(histories) = load_histories(&config).await else {
        error!("No price history available, nothing to analyze");
        return;
    };
    let histories = select_securities(histories, &config.securities);

    info!(
        "Running analysis: min_drop_threshold = {}, max_gap_days = {}",
        params.min_drop_threshold, params.max_gap_days
    );
    let report = analyze_portfolio(Arc::new(AnalyzerImpl::new()), histories, params).await;
    report_results(&report, params.max_gap_days, config.print_json);
}

/// Fetches and parses the export, refreshing the SQLite cache when one is configured.
/// Falls back to the cache if the source cannot be read.
async fn load_histories(config: &AppConfig) -> Option<BTreeMap<String, Vec<RawPricePoint>>> {
    let fetched = match fetch_histories(&config.source).await {
        Ok(h) => Some(h),
        Err(e) => {
            warn!("Price source unavailable: {}", e);
            None
        }
    };

    let Some(db_path) = &config.database_path else {
        return fetched;
    };

    let mut storage = match SqliteStorage::new(db_path) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to open price cache {}: {}", db_path.display(), e);
            return fetched;
        }
    };

    if let Some(histories) = fetched {
        if let Err(e) = storage.replace_all(&histories) {
            warn!("Price cache update failed: {}", e);
        }
        return Some(histories);
    }

    info!("Loading price history from cache {}", db_path.display());
    let names = match storage.list_securities() {
        Ok(names) => names,
        Err(e) => {
            warn!("Price cache read failed: {}", e);
            return None;
        }
    };
    let mut cached = BTreeMap::new();
    for name in names {
        match storage.load_points(&name) {
            Ok(points) => {
                cached.insert(name, points);
            }
            Err(e) => warn!("Failed to load cached history for {}: {}", name, e),
        }
    }
    Some(cached)
}

async fn fetch_histories(
    source: &SourceConfig,
) -> Result<BTreeMap<String, Vec<RawPricePoint>>, Box<dyn std::error::Error>> {
    let source: Box<dyn PriceSource> = match source {
        SourceConfig::File { path } => Box::new(FileSource::new(path.clone())),
        SourceConfig::Http { url, timeout_seconds } => {
            Box::new(HttpSource::new(url.clone(), Duration::from_secs(*timeout_seconds))?)
        }
    };

    let text = source.fetch().await?;
    let histories = StockDataParser::new().parse(&text)?;
    info!("Loaded price history for {} securities", histories.len());
    Ok(histories)
}

/// Keeps only the configured securities; an empty selection keeps all of them.
fn select_securities(
    mut histories: BTreeMap<String, Vec<RawPricePoint>>,
    selected: &[String],
) -> BTreeMap<String, Vec<RawPricePoint>> {
    if selected.is_empty() {
        return histories;
    }

    let mut picked = BTreeMap::new();
    for name in selected {
        match histories.remove(name) {
            Some(points) => {
                picked.insert(name.clone(), points);
            }
            None => warn!("No price history for configured security {}", name),
        }
    }
    picked
}

fn report_results(report: &PortfolioReport, max_gap_days: u32, print_json: bool) {
    for analysis in &report.analyses {
        let metrics = support_metrics(analysis, max_gap_days);
        log_summary(analysis, &metrics);
        if print_json {
            let record = serde_json::json!({ "analysis": analysis, "metrics": metrics });
            match serde_json::to_string(&record) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize {}: {}", analysis.stock_name, e),
            }
        }
    }

    for failure in &report.failures {
        warn!("{}: unavailable ({})", failure.stock_name, failure.reason);
    }
}

fn log_summary(analysis: &ConsecutiveBreaksAnalysis, metrics: &SupportMetrics) {
    match &analysis.stats {
        Some(stats) => info!(
            "{}: {} breaks in {} clusters | stability {:.1}% | avg drop {:.2}% | last break {} ({} days ago)",
            analysis.stock_name,
            stats.total_breaks,
            analysis.clusters.len(),
            stats.stability * 100.0,
            stats.avg_drop * 100.0,
            stats.last_break_date,
            stats.days_since_last_break
        ),
        None => info!(
            "{}: support held over {} trading days",
            analysis.stock_name,
            analysis.data.len()
        ),
    }
    info!(
        "{}: pattern {:?}, trend {:?}, strength {:.1} | break odds 30d {:.1}% / 60d {:.1}%",
        analysis.stock_name,
        metrics.pattern_type,
        metrics.stability_trend,
        metrics.support_strength_score,
        metrics.break_probability_30d * 100.0,
        metrics.break_probability_60d * 100.0
    );
}
