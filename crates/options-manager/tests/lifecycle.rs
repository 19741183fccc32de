use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use optdesk_broker::{PaperBroker, ScriptedBroker};
use optdesk_core::error::BrokerError;
use optdesk_core::events::{OrderId, OrderIntent, OrderSide, OrderType, QuoteTick, Side};
use optdesk_core::position::{CloseReason, Position, PositionState};
use optdesk_core::report::BacktestReport;
use optdesk_core::traits::{Broker, ReportSink};
use optdesk_options_manager::{
    EntryRequest, ExitRules, PositionCommand, PositionError, PositionService, RetryPolicy,
};
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

const CE: &str = "NIFTY24JUL24000CE";

#[derive(Default)]
struct RecordingSink {
    positions: Mutex<Vec<Position>>,
}

impl RecordingSink {
    fn reported(&self) -> Vec<Position> {
        self.positions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn position_closed(&self, position: &Position) {
        self.positions.lock().unwrap().push(position.clone());
    }

    async fn backtest_completed(&self, _report: &BacktestReport) {}
}

fn rules() -> ExitRules {
    ExitRules {
        stop_loss_percent: dec!(10),
        target_percent: dec!(50),
        exit_order_type: OrderType::Market,
    }
}

fn retry() -> RetryPolicy {
    RetryPolicy {
        entry_retries: 2,
        exit_retries: 2,
        exit_backoff_ms: 250,
    }
}

fn service(broker: Arc<dyn Broker>, sink: Arc<RecordingSink>) -> PositionService {
    PositionService::new(broker, sink, rules(), retry())
}

fn entry() -> EntryRequest {
    EntryRequest::market(CE, Side::Long, 25)
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(6 * 60 * 60)
}

/// Lets every spawned task drain its queue.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn wait_for_submissions(broker: &ScriptedBroker, count: usize) -> Vec<(OrderId, OrderIntent)> {
    loop {
        let submitted = broker.submitted();
        if submitted.len() >= count {
            return submitted;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn stop_loss_exit_ignores_later_ticks() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    let entry_id = submitted[0].0.clone();
    assert_eq!(submitted[0].1, OrderIntent::market(CE, OrderSide::Buy, 25));

    broker.fill(&entry_id, 25, dec!(100)).unwrap();
    settle().await;
    broker.push_quote(CE, dec!(95));
    broker.push_quote(CE, dec!(89));

    let submitted = wait_for_submissions(&broker, 2).await;
    assert_eq!(submitted[1].1, OrderIntent::market(CE, OrderSide::Sell, 25));

    broker.push_quote(CE, dec!(80));
    settle().await;
    assert_eq!(broker.submitted().len(), 2);

    broker.fill(&submitted[1].0, 25, dec!(88)).unwrap();
    let position = run.await.unwrap().unwrap();

    assert_eq!(position.state, PositionState::Closed);
    assert_eq!(position.close_reason, Some(CloseReason::StopLoss));
    assert_eq!(position.stop_loss_premium, Some(dec!(90)));
    assert_eq!(position.realized_pnl, Some(dec!(-300)));
    assert_eq!(sink.reported(), vec![position]);
}

#[tokio::test(start_paused = true)]
async fn deadline_flattens_open_position() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let deadline = Instant::now() + Duration::from_secs(60);
    let run = tokio::spawn(async move { svc.run(entry(), deadline).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    let submitted = wait_for_submissions(&broker, 2).await;
    assert_eq!(submitted[1].1, OrderIntent::market(CE, OrderSide::Sell, 25));

    broker.fill(&submitted[1].0, 25, dec!(101)).unwrap();
    let position = run.await.unwrap().unwrap();
    assert_eq!(position.close_reason, Some(CloseReason::ForcedFlatten));
    assert_eq!(position.realized_pnl, Some(dec!(25)));
}

#[tokio::test(start_paused = true)]
async fn deadline_takes_priority_over_queued_quotes() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let deadline = Instant::now() + Duration::from_secs(10);
    let run = tokio::spawn(async move { svc.run(entry(), deadline).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;

    tokio::time::advance(Duration::from_secs(11)).await;
    broker.push_quote(CE, dec!(200));

    let submitted = wait_for_submissions(&broker, 2).await;
    settle().await;
    assert_eq!(broker.submitted().len(), 2);

    broker.fill(&submitted[1].0, 25, dec!(199)).unwrap();
    let position = run.await.unwrap().unwrap();
    assert_eq!(position.close_reason, Some(CloseReason::ForcedFlatten));
}

#[tokio::test(start_paused = true)]
async fn pending_entry_cancelled_at_deadline() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let deadline = Instant::now() + Duration::from_secs(5);

    let position = svc.run(entry(), deadline).await.unwrap();
    assert_eq!(position.state, PositionState::Cancelled);
    assert_eq!(position.close_reason, Some(CloseReason::ForcedFlatten));
    assert_eq!(broker.cancelled(), vec![OrderId::new("SCRIPT-1")]);
    assert_eq!(sink.reported().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn entry_retries_then_cancels() {
    let broker = Arc::new(ScriptedBroker::new());
    for _ in 0..3 {
        broker.fail_next_submit(BrokerError::OrderRejected("price band".to_string()));
    }
    let sink = Arc::new(RecordingSink::default());

    let position = service(broker.clone(), sink.clone())
        .run(entry(), far_deadline())
        .await
        .unwrap();

    assert_eq!(position.state, PositionState::Cancelled);
    assert!(matches!(position.close_reason, Some(CloseReason::EntryRejected(_))));
    assert!(broker.submitted().is_empty());
    assert_eq!(sink.reported().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn entry_succeeds_within_retry_budget() {
    let broker = Arc::new(ScriptedBroker::new());
    broker.fail_next_submit(BrokerError::BrokerUnavailable("timeout".to_string()));
    broker.fail_next_submit(BrokerError::BrokerUnavailable("timeout".to_string()));
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    assert_eq!(submitted[0].0, OrderId::new("SCRIPT-1"));
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;
    broker.push_quote(CE, dec!(150));

    let submitted = wait_for_submissions(&broker, 2).await;
    broker.fill(&submitted[1].0, 25, dec!(150)).unwrap();
    let position = run.await.unwrap().unwrap();
    assert_eq!(position.close_reason, Some(CloseReason::Target));
}

#[tokio::test(start_paused = true)]
async fn exhausted_exit_retries_leave_position_closing() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;

    for _ in 0..3 {
        broker.fail_next_submit(BrokerError::BrokerUnavailable("gateway down".to_string()));
    }
    broker.push_quote(CE, dec!(85));

    let err = run.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        PositionError::ExitRetriesExhausted {
            attempts: 3,
            last: BrokerError::BrokerUnavailable("gateway down".to_string()),
        }
    );
    assert!(sink.reported().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_command_before_fill() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let (tx, rx) = mpsc::channel(4);
    let run = tokio::spawn(async move { svc.run_with_commands(entry(), far_deadline(), rx).await });

    wait_for_submissions(&broker, 1).await;
    let (reply, answer) = oneshot::channel();
    tx.send(PositionCommand::Cancel { reply }).await.unwrap();
    assert_eq!(answer.await.unwrap(), Ok(()));

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Cancelled);
    assert_eq!(position.close_reason, Some(CloseReason::CancelRequested));
    assert_eq!(broker.cancelled(), vec![OrderId::new("SCRIPT-1")]);
}

#[tokio::test(start_paused = true)]
async fn cancel_command_refused_once_open() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let (tx, rx) = mpsc::channel(4);
    let run = tokio::spawn(async move { svc.run_with_commands(entry(), far_deadline(), rx).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;

    let (reply, answer) = oneshot::channel();
    tx.send(PositionCommand::Cancel { reply }).await.unwrap();
    assert_eq!(
        answer.await.unwrap(),
        Err(PositionError::CancelNotPermitted {
            state: PositionState::Open
        })
    );

    broker.push_quote(CE, dec!(160));
    let submitted = wait_for_submissions(&broker, 2).await;
    broker.fill(&submitted[1].0, 25, dec!(160)).unwrap();
    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn paper_broker_round_trip() {
    let broker = Arc::new(PaperBroker::new());
    broker
        .publish_quote(QuoteTick::new(CE, dec!(100), chrono::Utc::now()))
        .await;
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    settle().await;
    broker
        .publish_quote(QuoteTick::new(CE, dec!(150), chrono::Utc::now()))
        .await;

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Closed);
    assert_eq!(position.close_reason, Some(CloseReason::Target));
    assert_eq!(position.entry_order, Some(OrderId::new("PAPER-1")));
    // (150 - 100) * 25 - 0.65 * 25 * 2
    assert_eq!(position.realized_pnl, Some(dec!(1217.5)));
    assert_eq!(sink.reported().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exit_rejected_after_ack_is_resubmitted() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;
    broker.push_quote(CE, dec!(85));

    let submitted = wait_for_submissions(&broker, 2).await;
    broker.reject(&submitted[1].0, "freeze quantity breached");

    let submitted = wait_for_submissions(&broker, 3).await;
    assert_eq!(submitted[2].1, OrderIntent::market(CE, OrderSide::Sell, 25));
    broker.fill(&submitted[2].0, 25, dec!(85)).unwrap();

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Closed);
    assert_eq!(position.exit_order, Some(submitted[2].0.clone()));
    assert_eq!(position.realized_pnl, Some(dec!(-375)));
    assert_eq!(sink.reported(), vec![position]);
}

#[tokio::test(start_paused = true)]
async fn repeated_exit_rejections_exhaust_retries() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;
    broker.push_quote(CE, dec!(85));

    for count in 2..=4 {
        let submitted = wait_for_submissions(&broker, count).await;
        broker.reject(&submitted[count - 1].0, "freeze quantity breached");
    }

    let err = run.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        PositionError::ExitRetriesExhausted {
            attempts: 3,
            last: BrokerError::OrderRejected("freeze quantity breached".to_string()),
        }
    );
    assert_eq!(broker.submitted().len(), 4);
    assert!(sink.reported().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exit_acknowledged_as_rejected_is_retried() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;
    broker.reject_next_submit("price band");
    broker.push_quote(CE, dec!(150));

    let submitted = wait_for_submissions(&broker, 2).await;
    assert_eq!(submitted[1].0, OrderId::new("SCRIPT-3"));
    broker.fill(&submitted[1].0, 25, dec!(150)).unwrap();

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.close_reason, Some(CloseReason::Target));
    assert_eq!(position.exit_order, Some(OrderId::new("SCRIPT-3")));
}

#[tokio::test(start_paused = true)]
async fn late_entry_fill_is_exited_after_working_exit() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let deadline = Instant::now() + Duration::from_secs(60);
    let run = tokio::spawn(async move {
        svc.run(EntryRequest::market(CE, Side::Long, 75), deadline).await
    });

    let submitted = wait_for_submissions(&broker, 1).await;
    let entry_id = submitted[0].0.clone();
    broker.fill(&entry_id, 25, dec!(100)).unwrap();
    settle().await;

    // The entry filled before the cancel reached the exchange
    broker.fail_next_cancel(BrokerError::OrderRejected("already filled".to_string()));
    tokio::time::sleep(Duration::from_secs(61)).await;
    let submitted = wait_for_submissions(&broker, 2).await;
    assert_eq!(submitted[1].1, OrderIntent::market(CE, OrderSide::Sell, 25));

    broker.fill(&entry_id, 50, dec!(100)).unwrap();
    settle().await;
    assert_eq!(broker.submitted().len(), 2);

    broker.fill(&submitted[1].0, 25, dec!(102)).unwrap();
    let submitted = wait_for_submissions(&broker, 3).await;
    assert_eq!(submitted[2].1, OrderIntent::market(CE, OrderSide::Sell, 50));
    broker.fill(&submitted[2].0, 50, dec!(102)).unwrap();

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Closed);
    assert_eq!(position.filled_quantity, 75);
    assert_eq!(position.exit_filled_quantity, 75);
    assert_eq!(position.realized_pnl, Some(dec!(150)));
    assert_eq!(sink.reported().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn partial_entry_closes_once_cancel_is_confirmed() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let deadline = Instant::now() + Duration::from_secs(60);
    let run = tokio::spawn(async move {
        svc.run(EntryRequest::market(CE, Side::Long, 75), deadline).await
    });

    let submitted = wait_for_submissions(&broker, 1).await;
    broker.fill(&submitted[0].0, 25, dec!(100)).unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    let submitted = wait_for_submissions(&broker, 2).await;
    assert_eq!(broker.cancelled(), vec![submitted[0].0.clone()]);
    broker.fill(&submitted[1].0, 25, dec!(99)).unwrap();

    let position = run.await.unwrap().unwrap();
    assert_eq!(position.state, PositionState::Closed);
    assert_eq!(position.close_reason, Some(CloseReason::ForcedFlatten));
    assert_eq!(position.realized_pnl, Some(dec!(-25)));
}

#[tokio::test(start_paused = true)]
async fn redelivered_fills_are_counted_once() {
    let broker = Arc::new(ScriptedBroker::new());
    let sink = Arc::new(RecordingSink::default());
    let svc = service(broker.clone(), sink.clone());
    let run = tokio::spawn(async move { svc.run(entry(), far_deadline()).await });

    let submitted = wait_for_submissions(&broker, 1).await;
    let first = broker.fill(&submitted[0].0, 10, dec!(100)).unwrap();
    broker.push_fill(first);
    broker.fill(&submitted[0].0, 15, dec!(100)).unwrap();
    settle().await;
    broker.push_quote(CE, dec!(150));

    let submitted = wait_for_submissions(&broker, 2).await;
    let exit = broker.fill(&submitted[1].0, 25, dec!(150)).unwrap();
    broker.push_fill(exit);

    let position = run.await.unwrap().unwrap();
    settle().await;
    assert_eq!(position.filled_quantity, 25);
    assert_eq!(position.exit_filled_quantity, 25);
    assert_eq!(position.realized_pnl, Some(dec!(1250)));
    assert_eq!(sink.reported(), vec![position]);
}
