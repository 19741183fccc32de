//! Position service: drives one position through its lifecycle against a
//! broker.
//!
//! Quote, fill and order-status feeds are forwarded into a single channel so
//! the state machine sees events in arrival order. The flatten deadline wins
//! over any queued event.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use futures::StreamExt;
use optdesk_core::error::BrokerError;
use optdesk_core::events::{Order, OrderId, OrderIntent, OrderUpdate};
use optdesk_core::position::Position;
use optdesk_core::traits::{Broker, ReportSink};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::machine::PositionMachine;
use crate::types::{EntryRequest, ExitRules, PositionAction, PositionError, PositionEvent, RetryPolicy};

/// Requests sent to a running position.
#[derive(Debug)]
pub enum PositionCommand {
    Cancel {
        reply: oneshot::Sender<Result<(), PositionError>>,
    },
}

pub struct PositionService {
    broker: Arc<dyn Broker>,
    sink: Arc<dyn ReportSink>,
    rules: ExitRules,
    retry: RetryPolicy,
}

impl PositionService {
    #[must_use]
    pub fn new(
        broker: Arc<dyn Broker>,
        sink: Arc<dyn ReportSink>,
        rules: ExitRules,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            broker,
            sink,
            rules,
            retry,
        }
    }

    /// Runs a position to a terminal state without external commands.
    ///
    /// # Errors
    ///
    /// See [`Self::run_with_commands`].
    pub async fn run(
        &self,
        entry: EntryRequest,
        deadline: Instant,
    ) -> Result<Position, PositionError> {
        let (_tx, rx) = mpsc::channel(1);
        self.run_with_commands(entry, deadline, rx).await
    }

    /// Submits the entry and manages the position until it is `Closed` or
    /// `Cancelled`, returning the final position.
    ///
    /// # Errors
    ///
    /// Returns `Feed` if the broker feeds cannot be opened, `FeedClosed` if
    /// they end early, and `ExitRetriesExhausted` if an exit order cannot be
    /// placed or keeps being rejected after acknowledgement; in that case the
    /// position is left in `Closing`.
    pub async fn run_with_commands(
        &self,
        entry: EntryRequest,
        deadline: Instant,
        mut commands: mpsc::Receiver<PositionCommand>,
    ) -> Result<Position, PositionError> {
        let mut machine = PositionMachine::new(&entry, self.rules.clone(), Utc::now());

        // Subscribe before submitting so no fill is missed.
        let fills = self.broker.fill_stream().await?;
        let quotes = self.broker.quote_stream(&entry.instrument).await?;
        let updates = self.broker.order_stream().await?;
        let (tx, mut events) = mpsc::unbounded_channel();
        let mut feeds = JoinSet::new();
        feeds.spawn(forward(quotes, tx.clone(), PositionEvent::Quote));
        feeds.spawn(forward(updates, tx.clone(), PositionEvent::Order));
        feeds.spawn(forward(fills, tx, PositionEvent::Fill));

        match self.submit_entry(&entry.intent()).await {
            Ok(order) => machine.entry_submitted(order.id),
            Err(e) => {
                let actions = machine.handle(PositionEvent::EntryFailed(e.to_string()), Utc::now())?;
                self.perform(&mut machine, actions).await?;
                return Ok(machine.position().clone());
            }
        }

        let mut flattened = false;
        let mut exit_losses = 0;
        while !machine.state().is_terminal() {
            let event = tokio::select! {
                biased;
                () = tokio::time::sleep_until(deadline), if !flattened => {
                    flattened = true;
                    info!(instrument = %entry.instrument, "Flatten deadline reached");
                    PositionEvent::FlattenDeadline
                }
                Some(command) = commands.recv() => {
                    let PositionCommand::Cancel { reply } = command;
                    match machine.handle(PositionEvent::CancelRequested, Utc::now()) {
                        Ok(actions) => {
                            self.perform(&mut machine, actions).await?;
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            warn!(error = %e, "Cancel refused");
                            let _ = reply.send(Err(e));
                        }
                    }
                    continue;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return Err(PositionError::FeedClosed { state: machine.state() }),
                },
            };

            if let PositionEvent::Order(update) = &event {
                if machine.is_working_exit(update.order_id()) {
                    exit_losses += 1;
                    self.exit_lost(update, exit_losses).await?;
                }
            }

            let actions = machine.handle(event, Utc::now())?;
            self.perform(&mut machine, actions).await?;
        }

        Ok(machine.position().clone())
    }

    /// Counts an acknowledged exit order the broker later rejected or
    /// cancelled against the exit retry budget, backing off before the
    /// machine asks for a replacement.
    async fn exit_lost(&self, update: &OrderUpdate, losses: u32) -> Result<(), PositionError> {
        let last = BrokerError::OrderRejected(update.reason());
        if losses > self.retry.exit_retries {
            error!(order_id = %update.order_id(), losses, error = %last, "Exit orders keep failing, position left closing");
            return Err(PositionError::ExitRetriesExhausted {
                attempts: losses,
                last,
            });
        }
        warn!(order_id = %update.order_id(), losses, error = %last, "Exit order lost after acknowledgement");
        tokio::time::sleep(Duration::from_millis(self.retry.exit_backoff_ms)).await;
        Ok(())
    }

    async fn perform(
        &self,
        machine: &mut PositionMachine,
        actions: Vec<PositionAction>,
    ) -> Result<(), PositionError> {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                PositionAction::SubmitExit(intent) => {
                    let order = self.submit_exit(&intent).await?;
                    machine.exit_submitted(order.id);
                }
                PositionAction::CancelOrder(order_id) => {
                    if let Err(BrokerError::OrderNotFound(_)) = self.cancel(&order_id).await {
                        // Nothing left to cancel, so the order can no longer fill.
                        let gone = PositionEvent::Order(OrderUpdate::Cancelled { order_id });
                        queue.extend(machine.handle(gone, Utc::now())?);
                    }
                }
                PositionAction::Report(position) => self.sink.position_closed(&position).await,
            }
        }
        Ok(())
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<(), BrokerError> {
        let attempts = self.retry.exit_retries + 1;
        let backoff = Duration::from_millis(self.retry.exit_backoff_ms);
        let mut attempt = 1;
        loop {
            match self.broker.cancel_order(order_id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(%order_id, attempt, error = %e, "Cancel failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(%order_id, error = %e, "Cancel failed");
                    return Err(e);
                }
            }
        }
    }

    async fn submit_entry(&self, intent: &OrderIntent) -> Result<Order, BrokerError> {
        let attempts = self.retry.entry_retries + 1;
        let mut attempt = 1;
        loop {
            match acknowledged(self.broker.submit_order(intent).await) {
                Ok(order) => {
                    info!(order_id = %order.id, instrument = %intent.instrument, quantity = intent.quantity, "Entry submitted");
                    return Ok(order);
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Entry submission failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts, error = %e, "Entry submission failed");
                    return Err(e);
                }
            }
        }
    }

    async fn submit_exit(&self, intent: &OrderIntent) -> Result<Order, PositionError> {
        let attempts = self.retry.exit_retries + 1;
        let backoff = Duration::from_millis(self.retry.exit_backoff_ms);
        let mut attempt = 1;
        loop {
            match acknowledged(self.broker.submit_order(intent).await) {
                Ok(order) => {
                    info!(order_id = %order.id, quantity = intent.quantity, "Exit submitted");
                    return Ok(order);
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Exit submission failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    error!(attempts, error = %e, instrument = %intent.instrument, "Exit retries exhausted, position left closing");
                    return Err(PositionError::ExitRetriesExhausted { attempts, last: e });
                }
            }
        }
    }
}

/// A submission answered with an already rejected or cancelled order counts
/// as a failed attempt.
fn acknowledged(result: Result<Order, BrokerError>) -> Result<Order, BrokerError> {
    let order = result?;
    if order.status.is_dead() {
        return Err(BrokerError::OrderRejected(format!("{} returned {:?}", order.id, order.status)));
    }
    Ok(order)
}

async fn forward<T: Send + 'static>(
    mut stream: futures::stream::BoxStream<'static, T>,
    tx: mpsc::UnboundedSender<PositionEvent>,
    wrap: fn(T) -> PositionEvent,
) {
    while let Some(item) = stream.next().await {
        if tx.send(wrap(item)).is_err() {
            break;
        }
    }
}

/// Next occurrence of local `flatten_time` at or after `now`.
#[must_use]
pub fn flatten_deadline(
    now: DateTime<Utc>,
    flatten_time: NaiveTime,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let today = local.date_naive().and_time(flatten_time);
    let candidate = today
        .and_local_timezone(offset)
        .single()
        .map_or(now, |t| t.with_timezone(&Utc));
    if candidate >= now {
        candidate
    } else {
        candidate + chrono::Duration::days(1)
    }
}

/// Converts a wall-clock deadline into a timer instant.
#[must_use]
pub fn deadline_instant(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Instant {
    let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deadline_is_in_exchange_time() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let cutoff = NaiveTime::from_hms_opt(15, 15, 0).unwrap();

        // 09:00 IST
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 3, 30, 0).unwrap();
        assert_eq!(
            flatten_deadline(now, cutoff, ist),
            Utc.with_ymd_and_hms(2024, 7, 1, 9, 45, 0).unwrap()
        );

        // 16:00 IST rolls to the next day
        let late = Utc.with_ymd_and_hms(2024, 7, 1, 10, 30, 0).unwrap();
        assert_eq!(
            flatten_deadline(late, cutoff, ist),
            Utc.with_ymd_and_hms(2024, 7, 2, 9, 45, 0).unwrap()
        );
    }
}
