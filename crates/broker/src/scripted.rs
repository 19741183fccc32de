//! Deterministic broker double.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use optdesk_core::error::BrokerError;
use optdesk_core::events::{FillEvent, Order, OrderId, OrderIntent, OrderStatus, OrderUpdate, QuoteTick};
use optdesk_core::traits::Broker;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

#[derive(Default)]
struct Script {
    next_id: u64,
    next_fill: u64,
    submit_failures: VecDeque<BrokerError>,
    submit_rejections: VecDeque<String>,
    cancel_failures: VecDeque<BrokerError>,
    submitted: Vec<(OrderId, OrderIntent)>,
    cancelled: Vec<OrderId>,
}

/// Records every call and acknowledges orders as `Submitted` without filling
/// them. Fills, quotes and order updates are pushed by the test; a successful
/// cancel is confirmed on the order stream.
pub struct ScriptedBroker {
    script: Mutex<Script>,
    quotes_tx: mpsc::UnboundedSender<QuoteTick>,
    quotes_rx: Mutex<Option<mpsc::UnboundedReceiver<QuoteTick>>>,
    fills_tx: mpsc::UnboundedSender<FillEvent>,
    fills_rx: Mutex<Option<mpsc::UnboundedReceiver<FillEvent>>>,
    updates_tx: mpsc::UnboundedSender<OrderUpdate>,
    updates_rx: Mutex<Option<mpsc::UnboundedReceiver<OrderUpdate>>>,
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBroker {
    #[must_use]
    pub fn new() -> Self {
        let (quotes_tx, quotes_rx) = mpsc::unbounded_channel();
        let (fills_tx, fills_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(Script::default()),
            quotes_tx,
            quotes_rx: Mutex::new(Some(quotes_rx)),
            fills_tx,
            fills_rx: Mutex::new(Some(fills_rx)),
            updates_tx,
            updates_rx: Mutex::new(Some(updates_rx)),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The next submission fails with `error`. Failures queue up in order.
    pub fn fail_next_submit(&self, error: BrokerError) {
        self.script().submit_failures.push_back(error);
    }

    pub fn fail_next_cancel(&self, error: BrokerError) {
        self.script().cancel_failures.push_back(error);
    }

    /// The next submission is answered with a `Rejected` order instead of an
    /// error, as brokers that validate synchronously do.
    pub fn reject_next_submit(&self, reason: &str) {
        self.script().submit_rejections.push_back(reason.to_string());
    }

    /// Successfully acknowledged submissions, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<(OrderId, OrderIntent)> {
        self.script().submitted.clone()
    }

    #[must_use]
    pub fn cancelled(&self) -> Vec<OrderId> {
        self.script().cancelled.clone()
    }

    pub fn push_quote(&self, instrument: &str, premium: Decimal) {
        let _ = self.quotes_tx.send(QuoteTick::new(instrument, premium, Utc::now()));
    }

    /// Emits a fill of `quantity` at `price` against a submitted order and
    /// returns it, so tests can redeliver it. `None` if `order_id` was never
    /// submitted.
    pub fn fill(&self, order_id: &OrderId, quantity: u32, price: Decimal) -> Option<FillEvent> {
        let mut script = self.script();
        let intent = script
            .submitted
            .iter()
            .find(|(id, _)| id == order_id)
            .map(|(_, intent)| intent.clone())?;
        script.next_fill += 1;
        let fill = FillEvent {
            fill_id: format!("FILL-{}", script.next_fill),
            order_id: order_id.clone(),
            instrument: intent.instrument,
            side: intent.side,
            quantity,
            price,
            commission: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        drop(script);
        self.push_fill(fill.clone());
        Some(fill)
    }

    pub fn push_fill(&self, fill: FillEvent) {
        let _ = self.fills_tx.send(fill);
    }

    /// Rejects an already acknowledged order on the order stream.
    pub fn reject(&self, order_id: &OrderId, reason: &str) {
        self.push_update(OrderUpdate::Rejected {
            order_id: order_id.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn push_update(&self, update: OrderUpdate) {
        let _ = self.updates_tx.send(update);
    }
}

fn take<T: Send + 'static>(
    slot: &Mutex<Option<mpsc::UnboundedReceiver<T>>>,
    feed: &str,
) -> Result<BoxStream<'static, T>, BrokerError> {
    let rx = slot
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take()
        .ok_or_else(|| BrokerError::BrokerUnavailable(format!("{feed} stream already taken")))?;
    Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed())
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<Order, BrokerError> {
        let mut script = self.script();
        if let Some(error) = script.submit_failures.pop_front() {
            return Err(error);
        }
        script.next_id += 1;
        let id = OrderId::new(format!("SCRIPT-{}", script.next_id));
        if script.submit_rejections.pop_front().is_some() {
            let mut order = Order::submitted(intent.clone(), id);
            order.status = OrderStatus::Rejected;
            return Ok(order);
        }
        script.submitted.push((id.clone(), intent.clone()));
        Ok(Order::submitted(intent.clone(), id))
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), BrokerError> {
        let mut script = self.script();
        if let Some(error) = script.cancel_failures.pop_front() {
            return Err(error);
        }
        script.cancelled.push(order_id.clone());
        drop(script);
        self.push_update(OrderUpdate::Cancelled {
            order_id: order_id.clone(),
        });
        Ok(())
    }

    /// The raw quote feed; ticks for every instrument are delivered.
    async fn quote_stream(
        &self,
        _instrument: &str,
    ) -> Result<BoxStream<'static, QuoteTick>, BrokerError> {
        take(&self.quotes_rx, "quote")
    }

    async fn fill_stream(&self) -> Result<BoxStream<'static, FillEvent>, BrokerError> {
        take(&self.fills_rx, "fill")
    }

    async fn order_stream(&self) -> Result<BoxStream<'static, OrderUpdate>, BrokerError> {
        take(&self.updates_rx, "order")
    }
}
