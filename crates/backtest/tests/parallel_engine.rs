use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use optdesk_backtest::{BacktestEngine, BacktestError, BacktestWindow, InMemoryDataProvider};
use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::error::DataError;
use optdesk_core::events::{Bar, BarInterval, Side};
use optdesk_core::traits::HistoricalDataProvider;
use optdesk_strategy::{SessionFrame, StrategyEvaluator, StrategyLibrary};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Goes long on the second bar of every session.
struct SecondBarLong(StrategyDescriptor);

impl StrategyEvaluator for SecondBarLong {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.0
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn entry_signal(&self, _frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        (index == 1).then_some(Side::Long)
    }
}

fn descriptor() -> StrategyDescriptor {
    StrategyDescriptor::new("second_bar_long", InstrumentClass::IndexOption)
}

fn library() -> Arc<StrategyLibrary> {
    let mut library = StrategyLibrary::new();
    library
        .register(Arc::new(SecondBarLong(descriptor())))
        .unwrap();
    Arc::new(library)
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// Three bars per daily session; each session closes higher than it opened,
/// so every simulated trade closes at session end with a profit of 2.
fn month_of_bars(month: u32) -> Vec<Bar> {
    let mut bars = Vec::new();
    for day in 1..=28 {
        let start = Utc.with_ymd_and_hms(2024, month, day, 3, 45, 0).unwrap();
        let base = Decimal::from(21_000 + day * 10);
        for (i, step) in [dec!(0), dec!(1), dec!(3)].into_iter().enumerate() {
            let close = base + step;
            bars.push(Bar::new(
                start + chrono::Duration::minutes(5 * i as i64),
                close,
                close + dec!(1),
                close - dec!(1),
                close,
                1_000,
            ));
        }
    }
    bars
}

fn windows() -> Vec<BacktestWindow> {
    vec![
        BacktestWindow::new("NIFTY 50", date(1, 1), date(1, 31), BarInterval::Minute5),
        BacktestWindow::new("NIFTY 50", date(2, 1), date(2, 29), BarInterval::Minute5),
        BacktestWindow::new("BROKEN", date(1, 1), date(1, 31), BarInterval::Minute5),
    ]
}

fn provider() -> InMemoryDataProvider {
    let mut bars = month_of_bars(1);
    bars.extend(month_of_bars(2));
    InMemoryDataProvider::new()
        .with_bars("NIFTY 50", bars)
        .with_failure("BROKEN", DataError::corrupt("BROKEN", "missing session"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_window_becomes_warning() {
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    let report = engine.run(&descriptor(), &windows(), 2).await.unwrap();

    assert_eq!(report.windows_evaluated, 2);
    assert_eq!(report.windows_failed, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("window 2:"));

    // 27 traded sessions per month window (the first only seeds context)
    assert_eq!(report.trade_count, 54);
    assert_eq!(report.wins, 54);
    assert_eq!(report.total_pnl, dec!(108));
    assert_eq!(report.max_drawdown, Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_is_independent_of_concurrency() {
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    let serial = engine.run(&descriptor(), &windows(), 1).await.unwrap();
    let parallel = engine.run(&descriptor(), &windows(), 8).await.unwrap();
    assert_eq!(serial, parallel);
}

#[tokio::test]
async fn all_windows_failing_is_insufficient_data() {
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    let windows = vec![BacktestWindow::new(
        "BROKEN",
        date(1, 1),
        date(1, 31),
        BarInterval::Minute5,
    )];
    let err = engine.run(&descriptor(), &windows, 1).await.unwrap_err();
    assert!(err.is_insufficient_data());

    let err = engine.run(&descriptor(), &[], 1).await.unwrap_err();
    assert!(err.is_insufficient_data());
}

#[tokio::test]
async fn overlapping_windows_rejected_unless_allowed() {
    let windows = vec![
        BacktestWindow::new("NIFTY 50", date(1, 1), date(2, 10), BarInterval::Minute5),
        BacktestWindow::new("NIFTY 50", date(2, 1), date(2, 29), BarInterval::Minute5),
    ];
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    assert!(matches!(
        engine.run(&descriptor(), &windows, 2).await,
        Err(BacktestError::OverlappingWindows { .. })
    ));

    let engine = BacktestEngine::new(Arc::new(provider()), library()).with_overlap(true);
    assert!(engine.run(&descriptor(), &windows, 2).await.is_ok());
}

#[tokio::test]
async fn unknown_strategy_is_an_error() {
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    let unknown = StrategyDescriptor::new("nope", InstrumentClass::IndexOption);
    let err = engine.run(&unknown, &windows(), 1).await.unwrap_err();
    assert!(matches!(err, BacktestError::Strategy(_)));
}

/// Tracks how many fetches are in flight at once.
struct GaugedProvider {
    inner: InMemoryDataProvider,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl HistoricalDataProvider for GaugedProvider {
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, DataError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.fetch(symbol, start, end, interval).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded() {
    let provider = Arc::new(GaugedProvider {
        inner: provider(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let windows: Vec<_> = (1..=12)
        .map(|m| {
            BacktestWindow::new(
                "NIFTY 50",
                date(m, 1),
                date(m, 28),
                BarInterval::Minute5,
            )
        })
        .collect();

    let engine = BacktestEngine::new(provider.clone(), library());
    let report = engine.run(&descriptor(), &windows, 3).await.unwrap();

    assert!(provider.peak.load(Ordering::SeqCst) <= 3);
    // Only January and February have bars
    assert_eq!(report.windows_evaluated, 2);
    assert_eq!(report.windows_failed, 10);
}

#[tokio::test]
async fn run_many_keys_results_by_strategy() {
    let engine = BacktestEngine::new(Arc::new(provider()), library());
    let unknown = StrategyDescriptor::new("nope", InstrumentClass::IndexOption);
    let results = engine
        .run_many(&[descriptor(), unknown.clone()], &windows(), 2)
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[descriptor().id()].is_ok());
    assert!(results[unknown.id()].is_err());
}
