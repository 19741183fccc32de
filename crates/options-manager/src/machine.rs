//! Pure position state machine.
//!
//! `Pending -> Open -> Closing -> Closed`, with `Cancelled` reachable from
//! `Pending` only. The machine performs no I/O: every transition returns the
//! actions the caller must carry out.
//!
//! At most one exit order is working at a time. Contracts that fill on the
//! entry after closing began are exited once the working exit completes, and
//! the position only closes after the entry order can no longer fill.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use optdesk_core::events::{FillEvent, OrderId, OrderIntent, OrderType, OrderUpdate, QuoteTick};
use optdesk_core::position::{weighted_average, CloseReason, Position, PositionState};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::stops::{check_exit_rules, stop_loss_premium};
use crate::targets::target_premium;
use crate::types::{EntryRequest, ExitRules, PositionAction, PositionError, PositionEvent};

pub struct PositionMachine {
    position: Position,
    rules: ExitRules,
    seen_fills: HashSet<String>,
    /// Every exit order id issued, so late fills on replaced orders count.
    exit_orders: HashSet<OrderId>,
    /// Unfilled quantity of the working exit order; 0 when none is working.
    exit_working: u32,
    /// The entry order may still produce fills.
    entry_live: bool,
}

impl PositionMachine {
    #[must_use]
    pub fn new(entry: &EntryRequest, rules: ExitRules, now: DateTime<Utc>) -> Self {
        Self {
            position: Position::pending(&entry.instrument, entry.side, entry.quantity, now),
            rules,
            seen_fills: HashSet::new(),
            exit_orders: HashSet::new(),
            exit_working: 0,
            entry_live: true,
        }
    }

    #[must_use]
    pub const fn position(&self) -> &Position {
        &self.position
    }

    #[must_use]
    pub const fn state(&self) -> PositionState {
        self.position.state
    }

    pub fn entry_submitted(&mut self, order_id: OrderId) {
        self.position.entry_order = Some(order_id);
    }

    pub fn exit_submitted(&mut self, order_id: OrderId) {
        self.exit_orders.insert(order_id.clone());
        self.position.exit_order = Some(order_id);
    }

    /// Whether `order_id` is the exit order currently working.
    #[must_use]
    pub fn is_working_exit(&self, order_id: &OrderId) -> bool {
        self.exit_working > 0 && self.position.exit_order.as_ref() == Some(order_id)
    }

    /// Applies one event.
    ///
    /// Events reaching a `Closed` or `Cancelled` position are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CancelNotPermitted` when a cancel is requested after the
    /// position took on exposure.
    pub fn handle(
        &mut self,
        event: PositionEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<PositionAction>, PositionError> {
        if self.position.state.is_terminal() {
            debug!(state = %self.position.state, ?event, "Ignoring event for finished position");
            return Ok(Vec::new());
        }

        let actions = match event {
            PositionEvent::Fill(fill) => self.on_fill(fill, now),
            PositionEvent::Quote(tick) => self.on_quote(&tick, now),
            PositionEvent::Order(update) => self.on_order_update(update, now),
            PositionEvent::EntryFailed(reason) => self.on_entry_failed(reason, now),
            PositionEvent::FlattenDeadline => self.on_flatten(now),
            PositionEvent::CancelRequested => return self.on_cancel(now),
        };
        Ok(actions)
    }

    fn on_fill(&mut self, fill: FillEvent, now: DateTime<Utc>) -> Vec<PositionAction> {
        if !self.seen_fills.insert(fill.fill_id.clone()) {
            debug!(fill_id = %fill.fill_id, "Duplicate fill ignored");
            return Vec::new();
        }

        let pos = &mut self.position;
        if pos.entry_order.as_ref() == Some(&fill.order_id) {
            let quantity = fill.quantity.min(pos.quantity - pos.filled_quantity);
            if quantity == 0 {
                warn!(fill_id = %fill.fill_id, "Entry overfill ignored");
                return Vec::new();
            }
            pos.entry_premium = Some(weighted_average(
                pos.entry_premium,
                pos.filled_quantity,
                fill.price,
                quantity,
            ));
            pos.filled_quantity += quantity;
            pos.commissions += fill.commission;
            if pos.filled_quantity == pos.quantity {
                self.entry_live = false;
            }
            return self.after_entry_fill(quantity, now);
        }

        if self.exit_orders.contains(&fill.order_id) {
            let quantity = fill.quantity.min(pos.exit_remaining());
            if quantity == 0 {
                warn!(fill_id = %fill.fill_id, "Exit overfill ignored");
                return Vec::new();
            }
            pos.exit_premium = Some(weighted_average(
                pos.exit_premium,
                pos.exit_filled_quantity,
                fill.price,
                quantity,
            ));
            pos.exit_filled_quantity += quantity;
            pos.commissions += fill.commission;
            self.exit_working = self.exit_working.saturating_sub(quantity).min(pos.exit_remaining());
            return self.after_exit_progress(now);
        }

        debug!(order_id = %fill.order_id, "Fill for unrelated order ignored");
        Vec::new()
    }

    fn after_entry_fill(&mut self, quantity: u32, now: DateTime<Utc>) -> Vec<PositionAction> {
        let pos = &mut self.position;
        match pos.state {
            PositionState::Pending if pos.filled_quantity == pos.quantity => {
                let Some(entry) = pos.entry_premium else {
                    return Vec::new();
                };
                let stop = stop_loss_premium(pos.side, entry, self.rules.stop_loss_percent);
                let target = target_premium(pos.side, entry, self.rules.target_percent);
                pos.stop_loss_premium = Some(stop);
                pos.target_premium = Some(target);
                pos.opened_at = Some(now);
                pos.state = PositionState::Open;
                info!(
                    instrument = %pos.instrument,
                    side = %pos.side,
                    quantity = pos.filled_quantity,
                    entry = %entry,
                    stop = %stop,
                    target = %target,
                    "Position open"
                );
                Vec::new()
            }
            // An entry fill racing a flatten: exit it after the working order.
            PositionState::Closing => {
                warn!(
                    instrument = %pos.instrument,
                    quantity,
                    exit_working = self.exit_working,
                    "Late entry fill while closing"
                );
                self.after_exit_progress(now)
            }
            _ => Vec::new(),
        }
    }

    /// Called whenever exit or late entry quantity changes while `Closing`:
    /// exits any uncovered contracts once no exit order is working, and
    /// closes when everything is flat and the entry can no longer fill.
    fn after_exit_progress(&mut self, now: DateTime<Utc>) -> Vec<PositionAction> {
        if self.position.state != PositionState::Closing || self.exit_working > 0 {
            return Vec::new();
        }
        let remaining = self.position.exit_remaining();
        if remaining > 0 {
            return self.submit_exit(remaining, None);
        }
        if self.entry_live {
            debug!(instrument = %self.position.instrument, "Flat, waiting for entry cancel confirmation");
            return Vec::new();
        }
        self.close(now)
    }

    fn on_quote(&mut self, tick: &QuoteTick, now: DateTime<Utc>) -> Vec<PositionAction> {
        if self.position.state != PositionState::Open || tick.instrument != self.position.instrument
        {
            return Vec::new();
        }
        match check_exit_rules(&self.position, tick.premium) {
            Some(reason) => self.begin_exit(reason, Some(tick.premium), now),
            None => Vec::new(),
        }
    }

    fn on_order_update(&mut self, update: OrderUpdate, now: DateTime<Utc>) -> Vec<PositionAction> {
        let reason = update.reason();
        let order_id = update.order_id().clone();

        if self.position.entry_order.as_ref() == Some(&order_id) {
            if !self.entry_live {
                return Vec::new();
            }
            self.entry_live = false;
            return match self.position.state {
                PositionState::Pending => self.on_entry_failed(reason, now),
                PositionState::Closing => {
                    debug!(%order_id, reason = %reason, "Entry order done");
                    self.after_exit_progress(now)
                }
                _ => Vec::new(),
            };
        }
        if self.is_working_exit(&order_id) && self.position.state == PositionState::Closing {
            warn!(%order_id, reason = %reason, "Exit order lost, resubmitting");
            self.exit_working = 0;
            return self.after_exit_progress(now);
        }
        Vec::new()
    }

    fn on_entry_failed(&mut self, reason: String, now: DateTime<Utc>) -> Vec<PositionAction> {
        if self.position.state != PositionState::Pending {
            return Vec::new();
        }
        warn!(instrument = %self.position.instrument, reason = %reason, "Entry failed");
        self.entry_live = false;
        if self.position.filled_quantity > 0 {
            return self.begin_exit(CloseReason::EntryRejected(reason), None, now);
        }
        self.cancel(CloseReason::EntryRejected(reason), now)
    }

    fn on_flatten(&mut self, now: DateTime<Utc>) -> Vec<PositionAction> {
        match self.position.state {
            PositionState::Open => self.begin_exit(CloseReason::ForcedFlatten, None, now),
            PositionState::Pending if self.position.filled_quantity == 0 => {
                self.cancel(CloseReason::ForcedFlatten, now)
            }
            PositionState::Pending => {
                let mut actions: Vec<_> = self
                    .position
                    .entry_order
                    .clone()
                    .map(PositionAction::CancelOrder)
                    .into_iter()
                    .collect();
                actions.extend(self.begin_exit(CloseReason::ForcedFlatten, None, now));
                actions
            }
            _ => Vec::new(),
        }
    }

    fn on_cancel(&mut self, now: DateTime<Utc>) -> Result<Vec<PositionAction>, PositionError> {
        let state = self.position.state;
        if state != PositionState::Pending || self.position.filled_quantity > 0 {
            return Err(PositionError::CancelNotPermitted { state });
        }
        Ok(self.cancel(CloseReason::CancelRequested, now))
    }

    /// Moves to `Closing` and asks for one exit order for the filled quantity.
    /// `premium` is the triggering tick, used as the price of a limit exit.
    fn begin_exit(
        &mut self,
        reason: CloseReason,
        premium: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Vec<PositionAction> {
        let pos = &mut self.position;
        info!(
            instrument = %pos.instrument,
            from = %pos.state,
            reason = %reason,
            quantity = pos.exit_remaining(),
            at = %now,
            "Position closing"
        );
        pos.state = PositionState::Closing;
        pos.close_reason = Some(reason);
        let remaining = pos.exit_remaining();
        self.submit_exit(remaining, premium)
    }

    /// Asks for the single working exit order.
    fn submit_exit(&mut self, quantity: u32, premium: Option<Decimal>) -> Vec<PositionAction> {
        if quantity == 0 {
            return Vec::new();
        }
        self.exit_working = quantity;
        vec![PositionAction::SubmitExit(self.exit_intent(quantity, premium))]
    }

    fn exit_intent(&self, quantity: u32, premium: Option<Decimal>) -> OrderIntent {
        let pos = &self.position;
        let side = pos.side.exit_order_side();
        match (self.rules.exit_order_type, premium) {
            (OrderType::Limit, Some(price)) => {
                OrderIntent::limit(&pos.instrument, side, quantity, price)
            }
            _ => OrderIntent::market(&pos.instrument, side, quantity),
        }
    }

    fn cancel(&mut self, reason: CloseReason, now: DateTime<Utc>) -> Vec<PositionAction> {
        let pos = &mut self.position;
        pos.state = PositionState::Cancelled;
        pos.close_reason = Some(reason);
        pos.closed_at = Some(now);
        info!(instrument = %pos.instrument, reason = ?pos.close_reason, "Position cancelled");

        let mut actions: Vec<_> = pos
            .entry_order
            .clone()
            .map(PositionAction::CancelOrder)
            .into_iter()
            .collect();
        actions.push(PositionAction::Report(pos.clone()));
        actions
    }

    fn close(&mut self, now: DateTime<Utc>) -> Vec<PositionAction> {
        let pos = &mut self.position;
        let gross = match (pos.entry_premium, pos.exit_premium) {
            (Some(entry), Some(exit)) => {
                (exit - entry) * Decimal::from(pos.exit_filled_quantity) * pos.side.sign()
            }
            _ => Decimal::ZERO,
        };
        let realized = gross - pos.commissions;
        pos.realized_pnl = Some(realized);
        pos.state = PositionState::Closed;
        pos.closed_at = Some(now);
        info!(
            instrument = %pos.instrument,
            realized_pnl = %realized,
            commissions = %pos.commissions,
            reason = ?pos.close_reason,
            "Position closed"
        );
        vec![PositionAction::Report(pos.clone())]
    }
}
