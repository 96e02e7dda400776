// ============================================================================
// Order Book Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::{Order, OrderId, Side};
use crate::numeric::{Price, Quantity};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Errors
// ============================================================================

/// Contract violations when placing or updating resting orders
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order {0} is not a limit order")]
    NotLimitOrder(OrderId),

    #[error("order {0} has no positive limit price")]
    InvalidPrice(OrderId),

    #[error("order {0} has nothing left to rest")]
    NothingRemaining(OrderId),

    #[error("order {id} belongs to {actual}, not {expected}")]
    SymbolMismatch {
        id: OrderId,
        expected: String,
        actual: String,
    },

    #[error("order {0} is already in the book")]
    DuplicateOrder(OrderId),

    #[error("order {0} is not in the book")]
    UnknownOrder(OrderId),
}

// ============================================================================
// Priority Key
// ============================================================================

/// Total order over one side of the book: better price first, then earlier
/// creation time, then earlier insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PriorityKey {
    /// Ascending for asks, negated for bids so the highest bid sorts first
    price_rank: i64,
    created_at: DateTime<Utc>,
    sequence: u64,
}

// ============================================================================
// Order Book Side
// ============================================================================

/// One side (bids or asks) kept in priority order
#[derive(Debug, Clone)]
pub struct OrderBookSide {
    pub side: Side,
    orders: BTreeMap<PriorityKey, Order>,
}

impl OrderBookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: BTreeMap::new(),
        }
    }

    /// Best order on this side (highest bid / lowest ask)
    pub fn best(&self) -> Option<&Order> {
        self.orders.values().next()
    }

    /// Resting orders in matching priority
    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn key_for(&self, price: Price, created_at: DateTime<Utc>, sequence: u64) -> PriorityKey {
        let raw = price.raw_value();
        PriorityKey {
            price_rank: match self.side {
                Side::Buy => -raw,
                Side::Sell => raw,
            },
            created_at,
            sequence,
        }
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Resting limit orders for a single symbol.
///
/// Not synchronized; the engine guards each book with its own mutex.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: OrderBookSide,
    asks: OrderBookSide,
    /// Where each resting order lives, for removal by id
    index: HashMap<OrderId, (Side, PriorityKey)>,
    /// Insertion counter, breaks ties between identical timestamps
    next_sequence: u64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: OrderBookSide::new(Side::Buy),
            asks: OrderBookSide::new(Side::Sell),
            index: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self, side: Side) -> &OrderBookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut OrderBookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Insert a resting limit order at its price/time position.
    pub fn insert(&mut self, order: Order) -> Result<(), BookError> {
        if !order.is_limit_order() {
            return Err(BookError::NotLimitOrder(order.id));
        }
        let price = match order.price {
            Some(price) if price.is_positive() => price,
            _ => return Err(BookError::InvalidPrice(order.id)),
        };
        if order.remaining_quantity().is_zero() || !order.status().is_active() {
            return Err(BookError::NothingRemaining(order.id));
        }
        if order.symbol != self.symbol {
            return Err(BookError::SymbolMismatch {
                id: order.id,
                expected: self.symbol.clone(),
                actual: order.symbol.clone(),
            });
        }
        if self.index.contains_key(&order.id) {
            return Err(BookError::DuplicateOrder(order.id));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let side = order.side;
        let key = self.side(side).key_for(price, order.created_at, sequence);
        self.index.insert(order.id, (side, key));
        self.side_mut(side).orders.insert(key, order);
        Ok(())
    }

    /// Remove an order by id. Absent ids are a no-op, since the order may
    /// already have been filled out of the book.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let (side, key) = self.index.remove(&order_id)?;
        self.side_mut(side).orders.remove(&key)
    }

    /// Replace a resting order with its post-match state, dropping it from
    /// the book once it is no longer working.
    pub fn update_resting(&mut self, order: Order) -> Result<(), BookError> {
        let (side, key) = *self
            .index
            .get(&order.id)
            .ok_or(BookError::UnknownOrder(order.id))?;

        if order.remaining_quantity().is_zero() || !order.status().is_active() {
            self.index.remove(&order.id);
            self.side_mut(side).orders.remove(&key);
        } else if let Some(slot) = self.side_mut(side).orders.get_mut(&key) {
            *slot = order;
        }
        Ok(())
    }

    /// Best resting order on the side opposite `side`
    pub fn best_opposite(&self, side: Side) -> Option<&Order> {
        self.side(side.opposite()).best()
    }

    /// Orders an incoming `side` order would match against, best first
    pub fn iter_opposite(&self, side: Side) -> impl Iterator<Item = &Order> + '_ {
        self.side(side.opposite()).iter()
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        let (side, key) = self.index.get(&order_id)?;
        self.side(*side).orders.get(key)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Aggregate the resting orders into price levels
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot::from_orders(&self.symbol, self.bids.iter().chain(self.asks.iter()))
    }
}

// ============================================================================
// Order Book Snapshot
// ============================================================================

/// Aggregated interest at one price
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub orders: usize,
}

/// Price-level view of a book: bids highest first, asks lowest first
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Build levels from a set of orders. Orders for another symbol, market
    /// orders, and orders that are no longer working are ignored.
    pub fn from_orders<'a, I>(symbol: &str, orders: I) -> Self
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let mut bid_levels: BTreeMap<Price, PriceLevel> = BTreeMap::new();
        let mut ask_levels: BTreeMap<Price, PriceLevel> = BTreeMap::new();

        for order in orders {
            if order.symbol != symbol || !order.status().is_active() {
                continue;
            }
            let price = match (order.is_limit_order(), order.price) {
                (true, Some(price)) => price,
                _ => continue,
            };

            let levels = match order.side {
                Side::Buy => &mut bid_levels,
                Side::Sell => &mut ask_levels,
            };
            let level = levels.entry(price).or_insert(PriceLevel {
                price,
                quantity: Quantity::ZERO,
                orders: 0,
            });
            level.quantity = level
                .quantity
                .checked_add(order.remaining_quantity())
                .unwrap_or(Quantity::MAX);
            level.orders += 1;
        }

        Self {
            symbol: symbol.to_string(),
            bids: bid_levels.into_values().rev().collect(),
            asks: ask_levels.into_values().collect(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }

    /// Best ask minus best bid
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.checked_sub(bid).ok(),
            _ => None,
        }
    }

    pub fn total_bid_quantity(&self) -> Quantity {
        self.bids.iter().map(|level| level.quantity).sum()
    }

    pub fn total_ask_quantity(&self) -> Quantity {
        self.asks.iter().map(|level| level.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
