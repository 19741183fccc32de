//! Helpers shared by the commands: configuration, engine wiring and windows.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate, Utc};
use optdesk_backtest::{BacktestEngine, BacktestWindow, CsvDataProvider};
use optdesk_broker::PaperBroker;
use optdesk_core::config::AppConfig;
use optdesk_core::ConfigLoader;
use optdesk_strategy::StrategyLibrary;
use tracing::info;

/// Loads configuration from an explicit file, a profile, or the default
/// `config/Config.toml`.
///
/// # Errors
/// Returns an error if the configuration cannot be read or fails validation.
pub fn load_config(path: Option<&Path>, profile: Option<&str>) -> Result<AppConfig> {
    let config = match (path, profile) {
        (Some(path), _) => ConfigLoader::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(profile)) => ConfigLoader::load_with_profile(profile)
            .with_context(|| format!("loading profile {profile}"))?,
        (None, None) => ConfigLoader::load().context("loading config/Config.toml")?,
    };
    info!(
        symbol = %config.backtest.symbol,
        years = config.backtest.backtest_years,
        paper = config.trading.paper_trading,
        "Configuration loaded"
    );
    Ok(config)
}

/// Broker for commands that place orders. Only paper trading is available,
/// so a configuration asking for live trading is refused.
///
/// # Errors
/// Returns an error when `trading.paper_trading` is false.
pub fn paper_broker(config: &AppConfig) -> Result<Arc<PaperBroker>> {
    if !config.trading.paper_trading {
        bail!("trading.paper_trading is false but no live broker is available; refusing to place orders");
    }
    Ok(Arc::new(PaperBroker::new()))
}

/// Engine over CSV bars in `data_dir` with the built-in strategies.
pub fn build_engine(data_dir: &Path, config: &AppConfig) -> BacktestEngine {
    let provider = Arc::new(CsvDataProvider::new(data_dir));
    BacktestEngine::new(provider, Arc::new(StrategyLibrary::with_builtins()))
        .with_overlap(config.backtest.allow_overlap)
}

/// Yearly lookback windows ending at `end`, or yesterday in exchange time.
///
/// # Errors
/// Returns an error if the configured timezone offset is invalid.
pub fn lookback_windows(
    config: &AppConfig,
    symbol: Option<&str>,
    end: Option<NaiveDate>,
    years: Option<u32>,
) -> Result<Vec<BacktestWindow>> {
    let end = match end {
        Some(end) => end,
        None => {
            let offset = config.trading.offset()?;
            let today = Utc::now().with_timezone(&offset).date_naive();
            today
                .checked_sub_days(Days::new(1))
                .context("date out of range")?
        }
    };
    let symbol = symbol.unwrap_or(&config.backtest.symbol);
    let years = years.unwrap_or(config.backtest.backtest_years);

    Ok(BacktestWindow::split_years(
        symbol,
        end,
        years,
        config.backtest.bar_interval,
    ))
}
