use chrono::{Days, Months, NaiveDate};
use optdesk_core::events::BarInterval;
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// One contiguous date range of one symbol; the unit of parallel work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BacktestWindow {
    pub symbol: String,
    /// Inclusive.
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub interval: BarInterval,
}

impl BacktestWindow {
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        interval: BarInterval,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            interval,
        }
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.start <= other.end && other.start <= self.end
    }

    /// `years` consecutive one-year windows ending at `end`, oldest first.
    #[must_use]
    pub fn split_years(
        symbol: &str,
        end: NaiveDate,
        years: u32,
        interval: BarInterval,
    ) -> Vec<Self> {
        let mut windows = Vec::with_capacity(years as usize);
        let mut window_end = end;
        for _ in 0..years {
            let Some(year_before) = window_end.checked_sub_months(Months::new(12)) else {
                break;
            };
            let Some(start) = year_before.checked_add_days(Days::new(1)) else {
                break;
            };
            windows.push(Self::new(symbol, start, window_end, interval));
            window_end = year_before;
        }
        windows.reverse();
        windows
    }
}

/// Checks that every window has `start <= end` and, unless `allow_overlap`,
/// that no two windows of the same symbol overlap.
///
/// # Errors
///
/// Returns `InvalidWindow` or `OverlappingWindows` for the first offending
/// window.
pub fn validate_windows(windows: &[BacktestWindow], allow_overlap: bool) -> Result<(), BacktestError> {
    for (index, window) in windows.iter().enumerate() {
        if window.start > window.end {
            return Err(BacktestError::InvalidWindow {
                index,
                reason: format!("start {} is after end {}", window.start, window.end),
            });
        }
        if window.symbol.trim().is_empty() {
            return Err(BacktestError::InvalidWindow {
                index,
                reason: "empty symbol".to_string(),
            });
        }
    }

    if !allow_overlap {
        for (i, a) in windows.iter().enumerate() {
            if let Some(j) = windows[i + 1..].iter().position(|b| a.overlaps(b)) {
                return Err(BacktestError::OverlappingWindows {
                    symbol: a.symbol.clone(),
                    first: i,
                    second: i + 1 + j,
                });
            }
        }
    }
    Ok(())
}
