use chrono::{Duration, NaiveDate, TimeZone, Utc};
use optdesk_core::events::Bar;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::session::{CprLevels, SessionContext, Sentiment};

pub fn d(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap().round_dp(4)
}

/// Five-minute bars from 09:15 IST on 2024-01-03.
pub fn bars(rows: &[(f64, f64, f64, f64, u64)]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 3, 3, 45, 0).unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| {
            Bar::new(
                start + Duration::minutes(5 * i as i64),
                d(open),
                d(high),
                d(low),
                d(close),
                volume,
            )
        })
        .collect()
}

/// Bars whose open equals close with a one-point range around it.
pub fn closes(values: &[f64]) -> Vec<Bar> {
    let rows: Vec<_> = values
        .iter()
        .map(|&c| (c, c + 0.5, c - 0.5, c, 1_000))
        .collect();
    bars(&rows)
}

/// Previous session H 110, L 90, C 107: pivot 102.33, tc 104.67, bc 100.
pub fn bullish() -> SessionContext {
    SessionContext {
        date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        levels: CprLevels::from_hlc(dec!(110), dec!(90), dec!(107)),
        sentiment: Sentiment::Bullish,
    }
}

/// Same levels with a bearish bias.
pub fn bearish() -> SessionContext {
    SessionContext {
        sentiment: Sentiment::Bearish,
        ..bullish()
    }
}
