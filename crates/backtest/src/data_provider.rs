use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use optdesk_core::error::DataError;
use optdesk_core::events::{Bar, BarInterval};
use optdesk_core::traits::HistoricalDataProvider;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// Reads bars from one CSV file per symbol and interval.
///
/// Files live at `{root}/{symbol}_{interval}.csv`, with spaces in the symbol
/// replaced by underscores (e.g. `NIFTY_50_5m.csv`), and use the columns
/// `timestamp,symbol,open,high,low,close,volume` with RFC 3339 timestamps.
pub struct CsvDataProvider {
    root: PathBuf,
}

impl CsvDataProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, symbol: &str, interval: BarInterval) -> PathBuf {
        let stem = symbol.trim().replace(' ', "_");
        self.root.join(format!("{stem}_{interval}.csv"))
    }

    /// Parses CSV text, keeping rows of `symbol` whose date is in
    /// `[start, end]`, sorted by timestamp.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if any row cannot be parsed.
    pub fn parse(
        data: &[u8],
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let corrupt = |line: usize, reason: String| {
            DataError::corrupt(symbol, format!("row {line}: {reason}"))
        };

        let mut reader = csv::Reader::from_reader(data);
        let mut bars = Vec::new();

        for (line, result) in reader.records().enumerate() {
            let record = result.map_err(|e| corrupt(line, e.to_string()))?;
            if record.len() < 7 {
                return Err(corrupt(line, format!("expected 7 columns, got {}", record.len())));
            }
            if record[1].trim() != symbol {
                continue;
            }

            let timestamp: DateTime<Utc> = record[0]
                .trim()
                .parse()
                .map_err(|e: chrono::ParseError| corrupt(line, e.to_string()))?;
            let date = timestamp.date_naive();
            if date < start || date > end {
                continue;
            }

            let decimal = |i: usize| {
                Decimal::from_str(record[i].trim()).map_err(|e| corrupt(line, e.to_string()))
            };
            let volume = record[6]
                .trim()
                .parse::<u64>()
                .map_err(|e| corrupt(line, e.to_string()))?;

            bars.push(Bar::new(
                timestamp,
                decimal(2)?,
                decimal(3)?,
                decimal(4)?,
                decimal(5)?,
                volume,
            ));
        }

        // Sort by timestamp to ensure chronological order
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

#[async_trait]
impl HistoricalDataProvider for CsvDataProvider {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, DataError> {
        let path = self.path_for(symbol, interval);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| DataError::unavailable(symbol, format!("{}: {e}", path.display())))?;

        let bars = Self::parse(&data, symbol, start, end)?;
        debug!(symbol, path = %path.display(), bars = bars.len(), "Loaded CSV bars");
        if bars.is_empty() {
            return Err(DataError::unavailable(
                symbol,
                format!("no bars between {start} and {end}"),
            ));
        }
        Ok(bars)
    }
}

/// Bars held in memory, keyed by symbol. Symbols registered as failing return
/// the stored error instead.
#[derive(Default)]
pub struct InMemoryDataProvider {
    bars: HashMap<String, Vec<Bar>>,
    failures: HashMap<String, DataError>,
}

impl InMemoryDataProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bars(mut self, symbol: &str, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    #[must_use]
    pub fn with_failure(mut self, symbol: &str, error: DataError) -> Self {
        self.failures.insert(symbol.to_string(), error);
        self
    }
}

#[async_trait]
impl HistoricalDataProvider for InMemoryDataProvider {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _interval: BarInterval,
    ) -> Result<Vec<Bar>, DataError> {
        if let Some(error) = self.failures.get(symbol) {
            return Err(error.clone());
        }
        let bars: Vec<Bar> = self
            .bars
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|b| (start..=end).contains(&b.session_date()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if bars.is_empty() {
            return Err(DataError::unavailable(
                symbol,
                format!("no bars between {start} and {end}"),
            ));
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CSV: &str = "\
timestamp,symbol,open,high,low,close,volume
2024-01-03T03:50:00Z,NIFTY 50,21500.5,21510,21490,21505.25,1200
2024-01-03T03:45:00Z,NIFTY 50,21480,21502,21475,21500.5,1500
2024-01-03T03:45:00Z,NIFTY BANK,47000,47100,46950,47050,900
2024-01-05T03:45:00Z,NIFTY 50,21600,21610,21590,21605,1000
";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn parses_sorts_and_filters() {
        let bars = CsvDataProvider::parse(CSV.as_bytes(), "NIFTY 50", date(1), date(4)).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, dec!(21500.5));
        assert_eq!(bars[1].volume, 1200);
    }

    #[test]
    fn bad_number_is_corrupt() {
        let csv = "timestamp,symbol,open,high,low,close,volume\n2024-01-03T03:45:00Z,NIFTY 50,abc,1,1,1,1\n";
        let err = CsvDataProvider::parse(csv.as_bytes(), "NIFTY 50", date(1), date(31)).unwrap_err();
        assert!(matches!(err, DataError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDataProvider::new(dir.path());
        let err = provider
            .fetch("NIFTY 50", date(1), date(31), BarInterval::Minute5)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn reads_symbol_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvDataProvider::new(dir.path());
        std::fs::write(provider.path_for("NIFTY 50", BarInterval::Minute5), CSV).unwrap();
        assert!(provider
            .path_for("NIFTY 50", BarInterval::Minute5)
            .ends_with("NIFTY_50_5m.csv"));

        let bars = provider
            .fetch("NIFTY 50", date(1), date(31), BarInterval::Minute5)
            .await
            .unwrap();
        assert_eq!(bars.len(), 3);
    }

    #[tokio::test]
    async fn in_memory_failure_injection() {
        let provider = InMemoryDataProvider::new()
            .with_failure("NIFTY 50", DataError::corrupt("NIFTY 50", "gap"));
        let err = provider
            .fetch("NIFTY 50", date(1), date(31), BarInterval::Minute5)
            .await
            .unwrap_err();
        assert_eq!(err, DataError::corrupt("NIFTY 50", "gap"));
    }
}
