//! Quote-tape replay CLI command.
//!
//! Opens one position on the paper broker and drives it with premiums read
//! from a CSV tape (`timestamp,instrument,premium`, RFC 3339 timestamps).
//! Ticks at or after the configured flatten time are withheld, so the
//! position is force-closed at the cutoff if no stop or target hits first.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use optdesk_core::config::AppConfig;
use optdesk_core::events::{QuoteTick, Side};
use optdesk_core::position::Position;
use optdesk_core::LogReportSink;
use optdesk_options_manager::{
    flatten_deadline, EntryRequest, ExitRules, PositionService, RetryPolicy,
};
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{info, warn};

use super::common::paper_broker;

/// Arguments for the replay command.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// CSV quote tape
    #[arg(short, long)]
    pub quotes: PathBuf,

    /// Option contract to trade (e.g. "NIFTY24JUL24000CE")
    #[arg(short, long)]
    pub instrument: String,

    /// Position side: long or short
    #[arg(long, default_value = "long", value_parser = parse_side)]
    pub side: Side,

    /// Lots to trade; contracts are lots times risk.lot_size
    #[arg(long, default_value_t = 1)]
    pub lots: u32,

    /// Entry limit premium; market entry when omitted
    #[arg(long)]
    pub limit: Option<Decimal>,

    /// Wall-clock milliseconds between replayed ticks
    #[arg(long, default_value_t = 20)]
    pub tick_ms: u64,
}

fn parse_side(value: &str) -> Result<Side, String> {
    match value.trim().to_lowercase().as_str() {
        "long" | "buy" => Ok(Side::Long),
        "short" | "sell" => Ok(Side::Short),
        other => Err(format!("unknown side '{other}', expected long or short")),
    }
}

/// Reads the tape, ascending by timestamp.
fn read_tape(path: &Path) -> Result<Vec<QuoteTick>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut ticks = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("row {line}"))?;
        if record.len() < 3 {
            bail!("row {line}: expected 3 columns, got {}", record.len());
        }
        let timestamp: DateTime<Utc> = record[0]
            .trim()
            .parse()
            .with_context(|| format!("row {line}: timestamp"))?;
        let premium = Decimal::from_str(record[2].trim())
            .with_context(|| format!("row {line}: premium"))?;
        ticks.push(QuoteTick::new(record[1].trim(), premium, timestamp));
    }
    ticks.sort_by_key(|tick| tick.timestamp);
    Ok(ticks)
}

/// Runs the replay command.
///
/// # Errors
/// Returns an error if live trading is configured, if the tape cannot be
/// read or has no ticks for the instrument, or if the position cannot be managed to a terminal state.
pub async fn run_replay(args: ReplayArgs, config: &AppConfig) -> Result<()> {
    let broker = paper_broker(config)?;
    let tape = read_tape(&args.quotes)?;
    let Some(first) = tape.iter().position(|tick| tick.instrument == args.instrument) else {
        bail!("no ticks for {} in {}", args.instrument, args.quotes.display());
    };

    let cutoff = flatten_deadline(
        tape[first].timestamp,
        config.trading.flatten_time()?,
        config.trading.offset()?,
    );
    let live: Vec<QuoteTick> = tape[first + 1..]
        .iter()
        .take_while(|tick| tick.timestamp < cutoff)
        .cloned()
        .collect();
    info!(
        instrument = %args.instrument,
        ticks = live.len(),
        cutoff = %cutoff,
        "Replaying quote tape"
    );

    broker.publish_quote(tape[first].clone()).await;

    let service = PositionService::new(
        broker.clone(),
        Arc::new(LogReportSink),
        ExitRules::from(&config.trading),
        RetryPolicy::from(&config.execution),
    );
    let entry = EntryRequest {
        instrument: args.instrument.clone(),
        side: args.side,
        quantity: args.lots * config.risk.lot_size,
        limit_price: args.limit,
    };

    let step = Duration::from_millis(args.tick_ms.max(1));
    let tape_len = u32::try_from(live.len()).unwrap_or(u32::MAX);
    let deadline = Instant::now() + step * tape_len.saturating_add(1) + step / 2;
    let handle = tokio::spawn(async move { service.run(entry, deadline).await });

    for tick in live {
        tokio::time::sleep(step).await;
        if handle.is_finished() {
            break;
        }
        broker.publish_quote(tick).await;
    }

    let position = handle.await.context("position task failed")??;
    if position.exit_remaining() > 0 {
        warn!(remaining = position.exit_remaining(), "Position not fully closed");
    }
    print_position(&position);
    Ok(())
}

fn print_position(position: &Position) {
    let show = |value: Option<Decimal>| value.map_or_else(|| "N/A".to_string(), |v| v.round_dp(2).to_string());

    println!("\n{}", "=".repeat(60));
    println!("POSITION {} ({})", position.instrument, position.side);
    println!("{}", "=".repeat(60));
    println!("State:          {}", position.state);
    println!("Filled:         {} / {}", position.filled_quantity, position.quantity);
    println!("Entry premium:  {}", show(position.entry_premium));
    println!("Exit premium:   {}", show(position.exit_premium));
    println!("Stop loss:      {}", show(position.stop_loss_premium));
    println!("Target:         {}", show(position.target_premium));
    println!("Commissions:    {}", position.commissions.round_dp(2));
    println!("Realized P/L:   {}", show(position.realized_pnl));
    if let Some(reason) = &position.close_reason {
        println!("Close reason:   {reason}");
    }
    println!("{}", "=".repeat(60));
}
