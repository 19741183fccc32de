//! Indicator series over one session.
//!
//! Every function returns a vector the same length as its input. Positions
//! without enough history hold `NaN`, and comparisons against `NaN` are false,
//! so an evaluator reading a warm-up value simply sees no signal.

/// Simple moving average. A window containing `NaN` yields `NaN`.
#[must_use]
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

/// Exponential moving average seeded with the SMA of the first `period`
/// consecutive finite values, so it also works on series with a `NaN` prefix
/// (e.g. a MACD line).
#[must_use]
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    if n < start + period {
        return result;
    }

    let seed_window = &values[start..start + period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    result[start + period - 1] = prev;

    for i in (start + period)..n {
        if values[i].is_nan() {
            break;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first
/// `period` values starting at `start`.
fn wilder(values: &[f64], period: usize, start: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < start + period {
        return result;
    }

    let mut prev = values[start..start + period].iter().sum::<f64>() / period as f64;
    result[start + period - 1] = prev;
    for i in (start + period)..n {
        prev = (prev * (period as f64 - 1.0) + values[i]) / period as f64;
        result[i] = prev;
    }
    result
}

/// Relative strength index with Wilder smoothing. First value at `period`.
/// A window without losses reads 100.
#[must_use]
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if period == 0 || n <= period {
        return vec![f64::NAN; n];
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let avg_gain = wilder(&gains, period, 1);
    let avg_loss = wilder(&losses, period, 1);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() {
                f64::NAN
            } else if l == 0.0 {
                if g == 0.0 {
                    50.0
                } else {
                    100.0
                }
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}

/// True range. The first bar has no previous close and uses high minus low.
#[must_use]
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..highs.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            if i == 0 {
                range
            } else {
                let prev = closes[i - 1];
                range.max((highs[i] - prev).abs()).max((lows[i] - prev).abs())
            }
        })
        .collect()
}

/// Average true range with Wilder smoothing, seeded from bar 1.
#[must_use]
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    wilder(&true_range(highs, lows, closes), period, 1)
}

/// Session-anchored volume weighted average of the typical price.
#[must_use]
pub fn vwap(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    (0..closes.len())
        .map(|i| {
            let typical = (highs[i] + lows[i] + closes[i]) / 3.0;
            cum_pv += typical * volumes[i];
            cum_vol += volumes[i];
            if cum_vol > 0.0 {
                cum_pv / cum_vol
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// MACD line and its signal line.
#[derive(Debug, Clone)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

#[must_use]
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal);
    Macd { line, signal }
}

/// Bollinger bands around an SMA, population standard deviation.
#[derive(Debug, Clone)]
pub struct Bands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    /// (upper - lower) / middle
    pub bandwidth: Vec<f64>,
}

#[must_use]
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Bands {
    let n = closes.len();
    let middle = sma(closes, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];
    let mut bandwidth = vec![f64::NAN; n];

    for i in 0..n {
        let mean = middle[i];
        if mean.is_nan() {
            continue;
        }
        let window = &closes[i + 1 - period..=i];
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
        let dev = variance.sqrt() * width;
        upper[i] = mean + dev;
        lower[i] = mean - dev;
        if mean != 0.0 {
            bandwidth[i] = (upper[i] - lower[i]) / mean;
        }
    }

    Bands {
        upper,
        middle,
        lower,
        bandwidth,
    }
}

/// Supertrend direction: `1.0` while price rides above the lower band,
/// `-1.0` below the upper band. Bands are `hl2 -/+ multiplier * ATR(period)`
/// and only ratchet in the direction of the trend.
#[must_use]
pub fn supertrend(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Vec<f64> {
    let n = closes.len();
    let atr = atr(highs, lows, closes, period);
    let mut direction = vec![f64::NAN; n];
    let Some(start) = atr.iter().position(|v| !v.is_nan()) else {
        return direction;
    };

    let mid = |i: usize| (highs[i] + lows[i]) / 2.0;
    let mut upper = mid(start) + multiplier * atr[start];
    let mut lower = mid(start) - multiplier * atr[start];
    let mut trend = 1.0;
    direction[start] = trend;

    for i in (start + 1)..n {
        let basic_upper = mid(i) + multiplier * atr[i];
        let basic_lower = mid(i) - multiplier * atr[i];
        if closes[i] > upper {
            trend = 1.0;
        } else if closes[i] < lower {
            trend = -1.0;
        }
        upper = if trend < 0.0 { basic_upper.min(upper) } else { basic_upper };
        lower = if trend > 0.0 { basic_lower.max(lower) } else { basic_lower };
        direction[i] = trend;
    }
    direction
}
