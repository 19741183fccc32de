//! Deterministic options position management.
//!
//! One position at a time is driven from entry to close by a pure state
//! machine:
//! - stop-loss and target levels derived from the average entry premium
//! - partial and duplicate fill handling
//! - forced flatten at the session cutoff
//! - bounded entry retries and persistent exit retries
//!
//! No I/O happens inside the machine; `PositionService` carries out its
//! actions against a `Broker`.

pub mod machine;
pub mod service;
pub mod stops;
pub mod targets;
pub mod types;

pub use machine::PositionMachine;
pub use service::{deadline_instant, flatten_deadline, PositionCommand, PositionService};
pub use types::{EntryRequest, ExitRules, PositionAction, PositionError, PositionEvent, RetryPolicy};
