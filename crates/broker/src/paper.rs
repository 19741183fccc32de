//! Paper trading broker.
//!
//! Simulates fills against the last published quote without touching a real
//! venue. Limit orders fill at their limit price, market orders at the last
//! quote of the instrument.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use optdesk_core::error::BrokerError;
use optdesk_core::events::{
    FillEvent, Order, OrderId, OrderIntent, OrderStatus, OrderType, OrderUpdate, QuoteTick,
};
use optdesk_core::traits::Broker;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const COMMISSION_PER_CONTRACT: Decimal = dec!(0.65);
const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct PaperState {
    next_id: u64,
    last_quotes: HashMap<String, Decimal>,
    orders: HashMap<OrderId, Order>,
}

#[derive(Debug)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
    quotes: broadcast::Sender<QuoteTick>,
    fills: broadcast::Sender<FillEvent>,
    updates: broadcast::Sender<OrderUpdate>,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperBroker {
    #[must_use]
    pub fn new() -> Self {
        let (quotes, _) = broadcast::channel(FEED_CAPACITY);
        let (fills, _) = broadcast::channel(FEED_CAPACITY);
        let (updates, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: Mutex::new(PaperState::default()),
            quotes,
            fills,
            updates,
        }
    }

    /// Records `tick` as the instrument's last price and forwards it to quote
    /// subscribers.
    pub async fn publish_quote(&self, tick: QuoteTick) {
        self.state
            .lock()
            .await
            .last_quotes
            .insert(tick.instrument.clone(), tick.premium);
        // No subscribers is fine.
        let _ = self.quotes.send(tick);
    }

    pub async fn last_quote(&self, instrument: &str) -> Option<Decimal> {
        self.state.lock().await.last_quotes.get(instrument).copied()
    }

    pub async fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(order_id).cloned()
    }
}

fn feed<T: Clone + Send + 'static>(rx: broadcast::Receiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Paper feed subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl Broker for PaperBroker {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<Order, BrokerError> {
        if intent.quantity == 0 {
            return Err(BrokerError::OrderRejected("quantity must be positive".to_string()));
        }

        let mut state = self.state.lock().await;
        let price = match (intent.order_type, intent.limit_price) {
            (OrderType::Limit, Some(price)) => price,
            (OrderType::Limit, None) => {
                return Err(BrokerError::OrderRejected("limit order without price".to_string()))
            }
            (OrderType::Market, _) => state
                .last_quotes
                .get(&intent.instrument)
                .copied()
                .ok_or_else(|| BrokerError::NoQuote(intent.instrument.clone()))?,
        };

        state.next_id += 1;
        let id = OrderId::new(format!("PAPER-{}", state.next_id));
        let fill = FillEvent {
            fill_id: format!("{id}-F1"),
            order_id: id.clone(),
            instrument: intent.instrument.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price,
            commission: COMMISSION_PER_CONTRACT * Decimal::from(intent.quantity),
            timestamp: Utc::now(),
        };

        let order = Order {
            intent: intent.clone(),
            id: id.clone(),
            status: OrderStatus::Filled,
            filled_quantity: intent.quantity,
            avg_fill_price: Some(price),
        };
        state.orders.insert(id, order.clone());
        drop(state);

        info!(
            order_id = %order.id,
            instrument = %intent.instrument,
            side = ?intent.side,
            quantity = intent.quantity,
            price = %price,
            "Paper fill simulated"
        );
        let _ = self.fills.send(fill);
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        match order.status {
            OrderStatus::Filled => Err(BrokerError::OrderRejected(format!(
                "{order_id} is already filled"
            ))),
            OrderStatus::Cancelled | OrderStatus::Rejected => Ok(()),
            OrderStatus::Submitted | OrderStatus::PartiallyFilled => {
                order.status = OrderStatus::Cancelled;
                info!(%order_id, "Paper order cancelled");
                let _ = self.updates.send(OrderUpdate::Cancelled {
                    order_id: order_id.clone(),
                });
                Ok(())
            }
        }
    }

    async fn quote_stream(
        &self,
        instrument: &str,
    ) -> Result<BoxStream<'static, QuoteTick>, BrokerError> {
        let instrument = instrument.to_string();
        Ok(feed(self.quotes.subscribe())
            .filter(move |tick| futures::future::ready(tick.instrument == instrument))
            .boxed())
    }

    async fn fill_stream(&self) -> Result<BoxStream<'static, FillEvent>, BrokerError> {
        Ok(feed(self.fills.subscribe()))
    }

    async fn order_stream(&self) -> Result<BoxStream<'static, OrderUpdate>, BrokerError> {
        Ok(feed(self.updates.subscribe()))
    }
}
