//! CLI commands for the daily options desk.

pub mod backtest;
pub mod common;
pub mod replay;
pub mod select;
pub mod strategies;

pub use backtest::{run_backtest, BacktestArgs};
pub use common::load_config;
pub use replay::{run_replay, ReplayArgs};
pub use select::{run_select, SelectArgs};
pub use strategies::{run_strategies, StrategiesArgs};
