//! Pre-market selection CLI command.
//!
//! Backtests the recommended strategy together with the configured
//! competitors and prints today's trade or no-trade decision.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use clap::Args;
use optdesk_core::config::AppConfig;
use optdesk_core::context::{DailyContext, Recommendation};
use optdesk_core::descriptor::StrategyDescriptor;
use optdesk_core::traits::{RecommendationAgent, ReportSink};
use optdesk_core::{LogReportSink, SizingParams, StaticRecommendationAgent};
use optdesk_selection::{Candidate, DailyPlan, SelectionCriteria, SelectionPolicy};
use optdesk_strategy::StrategyLibrary;
use tracing::{info, warn};

use super::common::{build_engine, lookback_windows};

/// Arguments for the select command.
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Recommended strategy; without it the recommendation is treated as unavailable
    #[arg(short, long)]
    pub recommend: Option<String>,

    /// Confidence attached to the recommendation, in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub confidence: f64,

    /// Free-text rationale attached to the recommendation
    #[arg(long, default_value = "manual")]
    pub rationale: String,

    /// Directory holding `{symbol}_{interval}.csv` bar files
    #[arg(long, default_value = "data")]
    pub data: PathBuf,

    /// Trading day (YYYY-MM-DD); the lookback ends the day before. Defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Print the full plan as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

/// Runs the select command.
///
/// # Errors
/// Returns an error if the lookback windows are invalid or the plan cannot be
/// serialized. An unknown or malformed recommendation is not an error: the
/// day is planned as having no recommendation.
pub async fn run_select(args: SelectArgs, config: &AppConfig) -> Result<()> {
    let date = match args.date {
        Some(date) => date,
        None => Utc::now().with_timezone(&config.trading.offset()?).date_naive(),
    };
    let context = DailyContext::new(date, config.backtest.symbol.clone());

    let engine = build_engine(&args.data, config);
    let agent = recommendation_agent(engine.library(), &args);

    let recommendation = agent.recommend(&context).await;
    match &recommendation {
        Some(rec) => info!(
            strategy = %rec.descriptor().id(),
            confidence = rec.confidence(),
            rationale = rec.rationale(),
            "Recommendation received"
        ),
        None => warn!("No recommendation available"),
    }
    let mut plan = DailyPlan::new(context, recommendation);

    let competitors = resolve_competitors(engine.library(), &config.selection.competitors);
    let strategies = plan.backtest_set(&competitors);

    let end = date.checked_sub_days(Days::new(1)).context("date out of range")?;
    let windows = lookback_windows(config, None, Some(end), None)?;
    let mut results = engine
        .run_many(&strategies, &windows, config.backtest.concurrency_level)
        .await;

    let mut candidates = Vec::with_capacity(strategies.len());
    for descriptor in &strategies {
        match results.remove(descriptor.id()) {
            Some(Ok(report)) => {
                LogReportSink.backtest_completed(&report).await;
                candidates.push(Candidate::new(descriptor.clone(), report));
            }
            Some(Err(e)) => warn!(strategy = %descriptor.id(), error = %e, "Backtest failed"),
            None => warn!(strategy = %descriptor.id(), "Backtest produced no result"),
        }
    }

    let policy = SelectionPolicy::new(
        SelectionCriteria::from(&config.selection),
        SizingParams::from(&config.risk),
    );
    plan.decide(&policy, &candidates);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_candidates(&candidates, &policy);
        println!("{}", plan.summary());
    }
    Ok(())
}

/// Agent answering with the `--recommend` strategy. A name the library does
/// not know, or an out-of-range confidence, leaves the agent unavailable.
fn recommendation_agent(library: &StrategyLibrary, args: &SelectArgs) -> StaticRecommendationAgent {
    let Some(name) = &args.recommend else {
        return StaticRecommendationAgent::unavailable();
    };
    let descriptor = match library.resolve(name) {
        Ok(evaluator) => evaluator.descriptor().clone(),
        Err(e) => {
            warn!(recommended = %name, error = %e, "Recommendation not in the library");
            return StaticRecommendationAgent::unavailable();
        }
    };
    match Recommendation::new(descriptor, args.rationale.clone(), args.confidence) {
        Ok(recommendation) => StaticRecommendationAgent::new(recommendation),
        Err(e) => {
            warn!(recommended = %name, error = %e, "Malformed recommendation");
            StaticRecommendationAgent::unavailable()
        }
    }
}

/// Competitors named in configuration; unknown names are skipped.
fn resolve_competitors(library: &StrategyLibrary, names: &[String]) -> Vec<StrategyDescriptor> {
    names
        .iter()
        .filter_map(|name| match library.resolve(name) {
            Ok(evaluator) => Some(evaluator.descriptor().clone()),
            Err(e) => {
                warn!(competitor = %name, error = %e, "Skipping unknown competitor");
                None
            }
        })
        .collect()
}

fn print_candidates(candidates: &[Candidate], policy: &SelectionPolicy) {
    println!("\n{}", "=".repeat(80));
    println!(
        "{:<24} {:>8} {:>10} {:>12} {:>12} {:>10}",
        "Strategy", "Trades", "Win rate", "Total P/L", "Drawdown", "Qualifies"
    );
    println!("{}", "-".repeat(80));
    for candidate in candidates {
        let report = &candidate.report;
        println!(
            "{:<24} {:>8} {:>9.2}% {:>12} {:>12} {:>10}",
            candidate.id().as_str(),
            report.trade_count,
            report.win_rate * 100.0,
            report.total_pnl.round_dp(2).to_string(),
            report.max_drawdown.round_dp(2).to_string(),
            if policy.qualifies(report) { "yes" } else { "no" }
        );
    }
    println!("{}", "=".repeat(80));
}
