// ============================================================================
// Order Domain Model
// ============================================================================

use crate::numeric::{NumericError, Price, Quantity};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OrderType {
    Limit,
    /// Immediate-or-cancel: never rests in the book
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        })
    }
}

// ============================================================================
// Order Status State Machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Canceled,
}

/// Events that move an order between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatusTransition {
    PartialFill,
    Fill,
    Cancel,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }

    /// Statuses an order may have while it rests in a book
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }

    pub fn transition(&self, transition: OrderStatusTransition) -> Result<OrderStatus, OrderStateError> {
        match (self, transition) {
            (OrderStatus::Open | OrderStatus::Partial, OrderStatusTransition::PartialFill) => {
                Ok(OrderStatus::Partial)
            },
            (OrderStatus::Open | OrderStatus::Partial, OrderStatusTransition::Fill) => {
                Ok(OrderStatus::Filled)
            },
            (OrderStatus::Open | OrderStatus::Partial, OrderStatusTransition::Cancel) => {
                Ok(OrderStatus::Canceled)
            },
            _ => Err(OrderStateError::InvalidTransition {
                from: *self,
                transition,
            }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Open => "open",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Canceled => "canceled",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStateError {
    #[error("invalid status transition from {from} via {transition:?}")]
    InvalidTransition {
        from: OrderStatus,
        transition: OrderStatusTransition,
    },

    #[error("fill of {fill} exceeds remaining quantity {remaining}")]
    Overfill { fill: Quantity, remaining: Quantity },

    #[error("order {id} is inconsistent: {reason}")]
    Inconsistent { id: OrderId, reason: &'static str },

    #[error(transparent)]
    Numeric(#[from] NumericError),
}

// ============================================================================
// Order Request (inbound intent)
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("quantity must be positive")]
    InvalidQuantity,

    #[error("price must be positive for limit orders")]
    InvalidPrice,

    #[error("market orders cannot have a price")]
    MarketOrderWithPrice,

    #[error("symbol is required")]
    EmptySymbol,

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("order {0} has already been worked")]
    NotNew(OrderId),
}

/// An order as submitted, before the engine has assigned identity
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub price: Option<Price>,
    pub quantity: Quantity,
}

impl OrderRequest {
    pub fn limit(symbol: impl Into<String>, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity,
        }
    }

    pub fn market(symbol: impl Into<String>, side: Side, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            price: None,
            quantity,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if !self.quantity.is_positive() {
            return Err(ValidationError::InvalidQuantity);
        }

        match (self.order_type, self.price) {
            (OrderType::Limit, Some(price)) if price.is_positive() => Ok(()),
            (OrderType::Limit, _) => Err(ValidationError::InvalidPrice),
            (OrderType::Market, Some(_)) => Err(ValidationError::MarketOrderWithPrice),
            (OrderType::Market, None) => Ok(()),
        }
    }
}

// ============================================================================
// Order Entity
// ============================================================================

/// An order and its matching state.
///
/// Identity and original terms are public and never change once the order
/// exists. Remaining quantity, status and `updated_at` are only changed by the
/// engine through the fill/cancel methods, which enforce the status machine.
/// Deserialized orders go through [`Order::try_restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "OrderRecord"))]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub price: Option<Price>,
    pub initial_quantity: Quantity,
    pub created_at: DateTime<Utc>,

    remaining_quantity: Quantity,
    status: OrderStatus,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a fresh open order from a request.
    ///
    /// The request is expected to have passed [`OrderRequest::validate`].
    pub fn new(request: OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            price: request.price,
            initial_quantity: request.quantity,
            created_at: now,
            remaining_quantity: request.quantity,
            status: OrderStatus::Open,
            updated_at: now,
        }
    }

    /// Rebuild an order from its stored representation. Nothing is checked;
    /// input the engine did not write itself belongs in [`Order::try_restore`].
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        symbol: String,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        initial_quantity: Quantity,
        remaining_quantity: Quantity,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            order_type,
            price,
            initial_quantity,
            created_at,
            remaining_quantity,
            status,
            updated_at,
        }
    }

    /// Like [`Order::restore`], but rejects quantities and statuses the
    /// engine could never have produced.
    #[allow(clippy::too_many_arguments)]
    pub fn try_restore(
        id: OrderId,
        symbol: String,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        initial_quantity: Quantity,
        remaining_quantity: Quantity,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, OrderStateError> {
        let order = Self::restore(
            id,
            symbol,
            side,
            order_type,
            price,
            initial_quantity,
            remaining_quantity,
            status,
            created_at,
            updated_at,
        );
        order.check_consistency()?;
        Ok(order)
    }

    fn check_consistency(&self) -> Result<(), OrderStateError> {
        let remaining = self.remaining_quantity;
        let reason = if self.request().validate().is_err() {
            Some("terms are not a valid order")
        } else if remaining < Quantity::ZERO || remaining > self.initial_quantity {
            Some("remaining quantity outside zero and the initial quantity")
        } else {
            match self.status {
                OrderStatus::Open if remaining != self.initial_quantity => Some("open order has fills"),
                OrderStatus::Partial if remaining.is_zero() || remaining == self.initial_quantity => {
                    Some("partial order is not partially filled")
                },
                OrderStatus::Filled if !remaining.is_zero() => Some("filled order has quantity left"),
                _ => None,
            }
        };

        match reason {
            Some(reason) => Err(OrderStateError::Inconsistent { id: self.id, reason }),
            None => Ok(()),
        }
    }

    /// Override the creation time of an order that has not been submitted yet.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// The terms this order was submitted with
    pub fn request(&self) -> OrderRequest {
        OrderRequest {
            symbol: self.symbol.clone(),
            side: self.side,
            order_type: self.order_type,
            price: self.price,
            quantity: self.initial_quantity,
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Quantity executed so far. Not meaningful for a canceled market order,
    /// whose remainder is zeroed; sum its trades instead.
    pub fn filled_quantity(&self) -> Quantity {
        self.initial_quantity
            .checked_sub(self.remaining_quantity)
            .unwrap_or(Quantity::ZERO)
    }

    pub fn is_limit_order(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }

    pub fn is_market_order(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }

    // ========================================================================
    // Engine mutations
    // ========================================================================

    /// Consume `quantity` from the remaining amount.
    pub(crate) fn fill(&mut self, quantity: Quantity, at: DateTime<Utc>) -> Result<(), OrderStateError> {
        if quantity > self.remaining_quantity {
            return Err(OrderStateError::Overfill {
                fill: quantity,
                remaining: self.remaining_quantity,
            });
        }

        let remaining = self.remaining_quantity.checked_sub(quantity)?;
        let transition = if remaining.is_zero() {
            OrderStatusTransition::Fill
        } else {
            OrderStatusTransition::PartialFill
        };

        self.status = self.status.transition(transition)?;
        self.remaining_quantity = remaining;
        self.updated_at = at;
        Ok(())
    }

    /// Cancel a working order, keeping its remaining quantity on record.
    pub(crate) fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), OrderStateError> {
        self.status = self.status.transition(OrderStatusTransition::Cancel)?;
        self.updated_at = at;
        Ok(())
    }

    /// Close out an immediate-or-cancel order: whatever did not execute is
    /// dropped and the order ends canceled with nothing remaining.
    pub(crate) fn expire_unfilled(&mut self, at: DateTime<Utc>) -> Result<(), OrderStateError> {
        if !self.remaining_quantity.is_zero() {
            self.status = self.status.transition(OrderStatusTransition::Cancel)?;
            self.remaining_quantity = Quantity::ZERO;
        }
        self.updated_at = at;
        Ok(())
    }
}

/// Wire shape of [`Order`]. Deserializing lands here first so the result
/// is checked by [`Order::try_restore`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct OrderRecord {
    id: OrderId,
    symbol: String,
    side: Side,
    order_type: OrderType,
    #[serde(default)]
    price: Option<Price>,
    initial_quantity: Quantity,
    created_at: DateTime<Utc>,
    remaining_quantity: Quantity,
    status: OrderStatus,
    updated_at: DateTime<Utc>,
}

#[cfg(feature = "serde")]
impl TryFrom<OrderRecord> for Order {
    type Error = OrderStateError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Order::try_restore(
            record.id,
            record.symbol,
            record.side,
            record.order_type,
            record.price,
            record.initial_quantity,
            record.remaining_quantity,
            record.status,
            record.created_at,
            record.updated_at,
        )
    }
}
