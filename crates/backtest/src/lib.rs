pub mod data_provider;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod replay;
pub mod window;

pub use data_provider::{CsvDataProvider, InMemoryDataProvider};
pub use engine::BacktestEngine;
pub use error::BacktestError;
pub use metrics::{aggregate, canonical_order, MetricsCalculator, WindowOutcome};
pub use replay::{replay_window, validate_bars};
pub use window::{validate_windows, BacktestWindow};
