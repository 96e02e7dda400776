// ============================================================================
// Trade Domain Model
// ============================================================================

use crate::numeric::{NumericResult, Price, Quantity};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Order, OrderId, Side};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An execution between one buy order and one sell order. Never updated once
/// created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    /// Execution price, always the resting order's limit
    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        symbol: String,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        price: Price,
        quantity: Quantity,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            executed_at,
        }
    }

    /// Build the trade for an incoming (taker) order crossing a resting
    /// (maker) order, assigning buy/sell ids from the taker's side.
    pub fn between(
        taker: &Order,
        maker: &Order,
        price: Price,
        quantity: Quantity,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let (buy_order_id, sell_order_id) = match taker.side {
            Side::Buy => (taker.id, maker.id),
            Side::Sell => (maker.id, taker.id),
        };

        Self::new(
            taker.symbol.clone(),
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            executed_at,
        )
    }

    /// Notional value of the trade (price * quantity)
    pub fn notional_value(&self) -> NumericResult<Price> {
        self.price.checked_mul(self.quantity)
    }

    pub fn involves(&self, order_id: OrderId) -> bool {
        self.buy_order_id == order_id || self.sell_order_id == order_id
    }
}
