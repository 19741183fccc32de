use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;

/// Inputs for sizing an entry in exchange lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingParams {
    /// Premium points the day may lose across the whole position.
    pub risk_budget: Decimal,
    /// Contracts per lot.
    pub lot_size: u32,
    pub max_lots: u32,
}

impl From<&RiskConfig> for SizingParams {
    fn from(config: &RiskConfig) -> Self {
        Self {
            risk_budget: config.risk_budget,
            lot_size: config.lot_size,
            max_lots: config.max_lots,
        }
    }
}

/// Result of sizing: lots and contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSize {
    pub lots: u32,
    pub quantity: u32,
    /// The one-lot minimum risks more than the budget.
    pub over_budget: bool,
}

/// Calculate lots from the strategy's historical worst drawdown
///
/// `lots = floor(risk_budget / (max_drawdown × lot_size))`, clamped to
/// `[1, max_lots]`. A zero drawdown gives `max_lots`.
///
/// When a single lot already costs more than the budget the floor still
/// trades one lot, and the result is flagged `over_budget` so callers can
/// report the overshoot.
///
/// # Arguments
/// * `max_drawdown` - Backtest max drawdown in premium points per unit
/// * `params` - Risk budget, lot size and lot cap
///
/// # Returns
/// Lots and contract quantity (`lots × lot_size`)
#[must_use]
pub fn size_by_drawdown(max_drawdown: Decimal, params: &SizingParams) -> PositionSize {
    let max_lots = params.max_lots.max(1);
    let lot_size = params.lot_size.max(1);

    if max_drawdown <= Decimal::ZERO {
        return PositionSize {
            lots: max_lots,
            quantity: max_lots * lot_size,
            over_budget: false,
        };
    }

    let per_lot = max_drawdown * Decimal::from(lot_size);
    let affordable = (params.risk_budget / per_lot).floor().to_u32().unwrap_or(max_lots);
    let lots = affordable.clamp(1, max_lots);
    PositionSize {
        lots,
        quantity: lots * lot_size,
        over_budget: affordable == 0,
    }
}
