//! Trading sessions: previous-day pivots, sentiment, and the per-session
//! indicator frame evaluators read from.

use chrono::NaiveDate;
use optdesk_core::events::{Bar, Side};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::indicators;

/// Day bias derived from the previous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
}

impl Sentiment {
    /// The only side evaluators may enter on this day.
    #[must_use]
    pub const fn side(self) -> Side {
        match self {
            Self::Bullish => Side::Long,
            Self::Bearish => Side::Short,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Central pivot range and classic floor pivots of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CprLevels {
    pub pivot: Decimal,
    /// Bottom central pivot; always `<= tc`.
    pub bc: Decimal,
    /// Top central pivot.
    pub tc: Decimal,
    pub r1: Decimal,
    pub r2: Decimal,
    pub r3: Decimal,
    pub s1: Decimal,
    pub s2: Decimal,
    pub s3: Decimal,
    pub prev_high: Decimal,
    pub prev_low: Decimal,
    pub prev_close: Decimal,
}

impl CprLevels {
    #[must_use]
    pub fn from_hlc(high: Decimal, low: Decimal, close: Decimal) -> Self {
        let three = Decimal::from(3);
        let two = Decimal::TWO;

        let pivot = (high + low + close) / three;
        let mut bc = (high + low) / two;
        let mut tc = (pivot - bc) + pivot;
        if tc < bc {
            std::mem::swap(&mut tc, &mut bc);
        }

        Self {
            pivot,
            bc,
            tc,
            r1: two * pivot - low,
            r2: pivot + (high - low),
            r3: high + two * (pivot - low),
            s1: two * pivot - high,
            s2: pivot - (high - low),
            s3: low - two * (high - pivot),
            prev_high: high,
            prev_low: low,
            prev_close: close,
        }
    }
}

/// What a session knows before its first bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub date: NaiveDate,
    pub levels: CprLevels,
    pub sentiment: Sentiment,
}

impl SessionContext {
    /// Builds the context for `date` from the previous session's bars.
    /// Returns `None` when `previous` is empty.
    #[must_use]
    pub fn from_previous(date: NaiveDate, previous: &[Bar]) -> Option<Self> {
        let last = previous.last()?;
        let high = previous.iter().map(|b| b.high).max()?;
        let low = previous.iter().map(|b| b.low).min()?;
        let levels = CprLevels::from_hlc(high, low, last.close);

        let sentiment = if last.close > levels.pivot {
            Sentiment::Bullish
        } else {
            Sentiment::Bearish
        };

        Some(Self {
            date,
            levels,
            sentiment,
        })
    }
}

/// Splits time-ordered bars into calendar-date sessions.
#[must_use]
pub fn split_sessions(bars: &[Bar]) -> Vec<&[Bar]> {
    let mut sessions = Vec::new();
    let mut start = 0;
    for i in 1..=bars.len() {
        if i == bars.len() || bars[i].session_date() != bars[start].session_date() {
            if start < i {
                sessions.push(&bars[start..i]);
            }
            start = i;
        }
    }
    sessions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SeriesKey {
    Ema(usize),
    Sma(usize),
    Rsi(usize),
    Atr(usize),
    AtrSma(usize, usize),
    VolumeSma(usize),
    SpreadSma(usize),
    Vwap,
    MacdLine(usize, usize),
    MacdSignal(usize, usize, usize),
    /// Width is stored in hundredths so the key stays hashable.
    BollUpper(usize, u32),
    BollLower(usize, u32),
    BollBandwidth(usize, u32),
    BandwidthSma(usize, u32, usize),
    /// Multiplier in hundredths, as for the Bollinger width.
    Supertrend(usize, u32),
}

/// One session's bars with lazily computed, memoised indicator series.
///
/// A frame belongs to the worker replaying its window, so the cache uses
/// `RefCell`/`Rc` and is neither `Send` nor `Sync`.
pub struct SessionFrame<'a> {
    bars: &'a [Bar],
    context: SessionContext,
    opens: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    volumes: Vec<f64>,
    cache: RefCell<HashMap<SeriesKey, Rc<[f64]>>>,
}

fn to_f64(values: impl Iterator<Item = Decimal>) -> Vec<f64> {
    values.map(|v| v.to_f64().unwrap_or(f64::NAN)).collect()
}

impl<'a> SessionFrame<'a> {
    #[must_use]
    pub fn new(bars: &'a [Bar], context: SessionContext) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let volumes = bars.iter().map(|b| b.volume as f64).collect();
        Self {
            bars,
            context,
            opens: to_f64(bars.iter().map(|b| b.open)),
            highs: to_f64(bars.iter().map(|b| b.high)),
            lows: to_f64(bars.iter().map(|b| b.low)),
            closes: to_f64(bars.iter().map(|b| b.close)),
            volumes,
            cache: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    #[must_use]
    pub const fn levels(&self) -> &CprLevels {
        &self.context.levels
    }

    #[must_use]
    pub const fn sentiment(&self) -> Sentiment {
        self.context.sentiment
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[must_use]
    pub fn opens(&self) -> &[f64] {
        &self.opens
    }

    #[must_use]
    pub fn highs(&self) -> &[f64] {
        &self.highs
    }

    #[must_use]
    pub fn lows(&self) -> &[f64] {
        &self.lows
    }

    #[must_use]
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    #[must_use]
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// Number of series computed so far.
    #[must_use]
    pub fn cached_series(&self) -> usize {
        self.cache.borrow().len()
    }

    fn memo(&self, key: SeriesKey, compute: impl FnOnce() -> Vec<f64>) -> Rc<[f64]> {
        if let Some(series) = self.cache.borrow().get(&key) {
            return Rc::clone(series);
        }
        let series: Rc<[f64]> = compute().into();
        self.cache.borrow_mut().insert(key, Rc::clone(&series));
        series
    }

    pub fn ema(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::Ema(period), || {
            indicators::ema(&self.closes, period)
        })
    }

    pub fn sma(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::Sma(period), || {
            indicators::sma(&self.closes, period)
        })
    }

    pub fn rsi(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::Rsi(period), || {
            indicators::rsi(&self.closes, period)
        })
    }

    pub fn atr(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::Atr(period), || {
            indicators::atr(&self.highs, &self.lows, &self.closes, period)
        })
    }

    /// Moving average of the ATR series.
    pub fn atr_sma(&self, atr_period: usize, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::AtrSma(atr_period, period), || {
            indicators::sma(&self.atr(atr_period), period)
        })
    }

    pub fn volume_sma(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::VolumeSma(period), || {
            indicators::sma(&self.volumes, period)
        })
    }

    /// Moving average of high minus low.
    pub fn spread_sma(&self, period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::SpreadSma(period), || {
            let spreads: Vec<f64> = self
                .highs
                .iter()
                .zip(&self.lows)
                .map(|(h, l)| h - l)
                .collect();
            indicators::sma(&spreads, period)
        })
    }

    pub fn vwap(&self) -> Rc<[f64]> {
        self.memo(SeriesKey::Vwap, || {
            indicators::vwap(&self.highs, &self.lows, &self.closes, &self.volumes)
        })
    }

    pub fn macd_line(&self, fast: usize, slow: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::MacdLine(fast, slow), || {
            let fast_ema = self.ema(fast);
            let slow_ema = self.ema(slow);
            fast_ema.iter().zip(slow_ema.iter()).map(|(f, s)| f - s).collect()
        })
    }

    pub fn macd_signal(&self, fast: usize, slow: usize, signal: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::MacdSignal(fast, slow, signal), || {
            indicators::ema(&self.macd_line(fast, slow), signal)
        })
    }

    /// Supertrend direction, `1.0` up and `-1.0` down.
    pub fn supertrend(&self, period: usize, multiplier_hundredths: u32) -> Rc<[f64]> {
        self.memo(SeriesKey::Supertrend(period, multiplier_hundredths), || {
            indicators::supertrend(
                &self.highs,
                &self.lows,
                &self.closes,
                period,
                f64::from(multiplier_hundredths) / 100.0,
            )
        })
    }

    fn bollinger(&self, period: usize, width_hundredths: u32) -> (Rc<[f64]>, Rc<[f64]>, Rc<[f64]>) {
        let upper_key = SeriesKey::BollUpper(period, width_hundredths);
        let lower_key = SeriesKey::BollLower(period, width_hundredths);
        let bw_key = SeriesKey::BollBandwidth(period, width_hundredths);

        {
            let cache = self.cache.borrow();
            if let (Some(u), Some(l), Some(b)) =
                (cache.get(&upper_key), cache.get(&lower_key), cache.get(&bw_key))
            {
                return (Rc::clone(u), Rc::clone(l), Rc::clone(b));
            }
        }

        let bands = indicators::bollinger(&self.closes, period, f64::from(width_hundredths) / 100.0);
        let upper: Rc<[f64]> = bands.upper.into();
        let lower: Rc<[f64]> = bands.lower.into();
        let bandwidth: Rc<[f64]> = bands.bandwidth.into();

        let mut cache = self.cache.borrow_mut();
        cache.insert(upper_key, Rc::clone(&upper));
        cache.insert(lower_key, Rc::clone(&lower));
        cache.insert(bw_key, Rc::clone(&bandwidth));
        (upper, lower, bandwidth)
    }

    pub fn bollinger_upper(&self, period: usize, width_hundredths: u32) -> Rc<[f64]> {
        self.bollinger(period, width_hundredths).0
    }

    pub fn bollinger_lower(&self, period: usize, width_hundredths: u32) -> Rc<[f64]> {
        self.bollinger(period, width_hundredths).1
    }

    pub fn bollinger_bandwidth(&self, period: usize, width_hundredths: u32) -> Rc<[f64]> {
        self.bollinger(period, width_hundredths).2
    }

    /// Moving average of the Bollinger bandwidth.
    pub fn bandwidth_sma(&self, period: usize, width_hundredths: u32, ma_period: usize) -> Rc<[f64]> {
        self.memo(SeriesKey::BandwidthSma(period, width_hundredths, ma_period), || {
            indicators::sma(&self.bollinger_bandwidth(period, width_hundredths), ma_period)
        })
    }
}
