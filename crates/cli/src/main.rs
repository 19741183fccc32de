use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "optdesk")]
#[command(about = "Daily options desk: backtest, select and manage one intraday position", long_about = None)]
struct Cli {
    /// Configuration file replacing config/Config.toml
    #[arg(long, global = true, env = "OPTDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Profile layered over the base configuration (config/Config.{profile}.toml)
    #[arg(long, global = true, env = "OPTDESK_PROFILE", conflicts_with = "config")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy over the configured lookback
    Backtest(commands::BacktestArgs),

    /// Run the pre-market selection: backtest recommendation and competitors, then decide
    Select(commands::SelectArgs),

    /// Manage one position against a recorded quote tape on the paper broker
    Replay(commands::ReplayArgs),

    /// List registered strategies and their default parameters
    Strategies(commands::StrategiesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.profile.as_deref())?;

    match cli.command {
        Commands::Backtest(args) => commands::run_backtest(args, &config).await?,
        Commands::Select(args) => commands::run_select(args, &config).await?,
        Commands::Replay(args) => commands::run_replay(args, &config).await?,
        Commands::Strategies(args) => commands::run_strategies(&args),
    }

    Ok(())
}
