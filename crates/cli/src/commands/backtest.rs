//! Backtest CLI command.
//!
//! Replays one strategy over yearly windows of CSV bars and prints the
//! aggregated report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use optdesk_core::config::AppConfig;
use optdesk_core::traits::ReportSink;
use optdesk_core::{LogReportSink, MetricsFormatter};

use super::common::{build_engine, lookback_windows};

/// Arguments for the backtest command.
#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Strategy name or alias (e.g. "cpr_breakout", "EMA_Cross_RSI")
    #[arg(short, long)]
    pub strategy: String,

    /// Directory holding `{symbol}_{interval}.csv` bar files
    #[arg(long, default_value = "data")]
    pub data: PathBuf,

    /// Last session of the lookback (YYYY-MM-DD); defaults to yesterday
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Years of lookback, overriding backtest.backtest_years
    #[arg(long)]
    pub years: Option<u32>,

    /// Windows in flight at once, overriding backtest.concurrency_level (0 = all cores)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Underlying symbol, overriding backtest.symbol
    #[arg(long)]
    pub symbol: Option<String>,
}

/// Runs the backtest command.
///
/// # Errors
/// Returns an error if the strategy is unknown, the windows are invalid, or
/// every window failed.
pub async fn run_backtest(args: BacktestArgs, config: &AppConfig) -> Result<()> {
    let engine = build_engine(&args.data, config);
    let evaluator = engine
        .library()
        .resolve(&args.strategy)
        .context("resolving strategy")?;
    let descriptor = evaluator.descriptor().clone();

    let windows = lookback_windows(config, args.symbol.as_deref(), args.end, args.years)?;
    let concurrency = args.concurrency.unwrap_or(config.backtest.concurrency_level);

    tracing::info!(
        strategy = %descriptor.id(),
        windows = windows.len(),
        data = %args.data.display(),
        "Running backtest"
    );

    let report = engine
        .run(&descriptor, &windows, concurrency)
        .await
        .with_context(|| format!("backtest of {} failed", descriptor.id()))?;

    println!("{}", MetricsFormatter::format(&report));
    for window in &windows {
        println!("  window {} .. {} ({})", window.start, window.end, window.symbol);
    }

    let criteria = &config.selection;
    if report.meets(criteria.win_rate_threshold, criteria.min_trades) {
        println!("Qualifies for selection");
    } else {
        println!(
            "Does not qualify (needs win rate >= {:.2}% over at least {} trades)",
            criteria.win_rate_threshold * 100.0,
            criteria.min_trades
        );
    }

    LogReportSink.backtest_completed(&report).await;
    Ok(())
}
