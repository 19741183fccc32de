use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One OHLCV bar of the underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    #[must_use]
    pub const fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calendar date of the bar, used to split bars into sessions.
    #[must_use]
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// High minus low.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.high - self.low
    }
}

/// Bar interval of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarInterval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "10m")]
    Minute10,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    Day,
}

impl BarInterval {
    /// Interval length in minutes (a trading day counts as 1440).
    #[must_use]
    pub const fn minutes(self) -> u32 {
        match self {
            Self::Minute1 => 1,
            Self::Minute3 => 3,
            Self::Minute5 => 5,
            Self::Minute10 => 10,
            Self::Minute15 => 15,
            Self::Minute30 => 30,
            Self::Minute60 => 60,
            Self::Day => 1440,
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            other => write!(f, "{}m", other.minutes()),
        }
    }
}

impl FromStr for BarInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "minute" => Ok(Self::Minute1),
            "3m" | "3minute" => Ok(Self::Minute3),
            "5m" | "5minute" => Ok(Self::Minute5),
            "10m" | "10minute" => Ok(Self::Minute10),
            "15m" | "15minute" => Ok(Self::Minute15),
            "30m" | "30minute" => Ok(Self::Minute30),
            "60m" | "1h" | "60minute" => Ok(Self::Minute60),
            "day" | "1d" => Ok(Self::Day),
            other => Err(format!("unsupported bar interval '{other}'")),
        }
    }
}

/// Direction of a premium position. Long means the contract was bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Order side that opens a position on this side.
    #[must_use]
    pub const fn entry_order_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position on this side.
    #[must_use]
    pub const fn exit_order_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }

    /// +1 for long, -1 for short.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Live premium quote for an options contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTick {
    pub instrument: String,
    pub premium: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl QuoteTick {
    #[must_use]
    pub fn new(instrument: impl Into<String>, premium: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            premium,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Broker-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What we ask the broker to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub instrument: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
}

impl OrderIntent {
    #[must_use]
    pub fn market(instrument: impl Into<String>, side: OrderSide, quantity: u32) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
        }
    }

    #[must_use]
    pub fn limit(
        instrument: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        price: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            quantity,
            order_type: OrderType::Limit,
            limit_price: Some(price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// The broker is done with the order without filling all of it.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected)
    }
}

/// Submission/acknowledgement pair for one order. Transient: the position
/// owns the authoritative state and only keeps the id for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub intent: OrderIntent,
    pub id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: u32,
    pub avg_fill_price: Option<Decimal>,
}

impl Order {
    #[must_use]
    pub const fn submitted(intent: OrderIntent, id: OrderId) -> Self {
        Self {
            intent,
            id,
            status: OrderStatus::Submitted,
            filled_quantity: 0,
            avg_fill_price: None,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.intent.quantity.saturating_sub(self.filled_quantity)
    }
}

/// Execution report from the broker. A single order may produce several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Unique per execution; repeated deliveries carry the same id.
    pub fill_id: String,
    pub order_id: OrderId,
    pub instrument: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Asynchronous order-status notification that is not a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderUpdate {
    Rejected { order_id: OrderId, reason: String },
    Cancelled { order_id: OrderId },
}

impl OrderUpdate {
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        match self {
            Self::Rejected { order_id, .. } | Self::Cancelled { order_id } => order_id,
        }
    }

    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Rejected { reason, .. } => reason.clone(),
            Self::Cancelled { .. } => "cancelled by broker".to_string(),
        }
    }
}
