// ============================================================================
// Price/Time Priority Matching (FIFO)
// ============================================================================

use crate::domain::{BookError, Order, OrderBook, OrderStateError, OrderType, Side, Trade};
use crate::interfaces::{OrderUpdate, WriteBatch};
use crate::numeric::Price;
use chrono::{DateTime, Utc};
use smallvec::SmallVec;

/// Everything one incoming order does to a book, computed without touching
/// it. The engine persists the outcome first and only then applies it.
///
/// # Example
/// ```text
/// Book:  ask 100 @ 1.0 (Order A, t=100)
///        ask 100 @ 2.0 (Order B, t=101)
///
/// Incoming: Buy 1.5 @ 100
/// Result: trade 1.0 with A, then 0.5 with B; B stays with 1.5 partial
/// ```
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The incoming order in its final state
    pub incoming: Order,
    /// Resting orders that traded, in the state they end up in
    pub makers: SmallVec<[Order; 4]>,
    /// One trade per maker, in execution order
    pub trades: SmallVec<[Trade; 4]>,
    /// The incoming order's remainder goes into the book
    pub rests: bool,
}

impl MatchOutcome {
    /// Writes for a freshly placed order: the order itself, each maker's new
    /// state, and the trades.
    pub fn write_batch(&self) -> WriteBatch {
        WriteBatch {
            new_orders: vec![self.incoming.clone()],
            order_updates: self.makers.iter().map(OrderUpdate::from).collect(),
            trades: self.trades.to_vec(),
        }
    }

    /// Apply the staged book changes. Only valid against the same book state
    /// the outcome was computed from.
    pub fn apply_to(&self, book: &mut OrderBook) -> Result<(), BookError> {
        for maker in &self.makers {
            book.update_resting(maker.clone())?;
        }
        if self.rests {
            book.insert(self.incoming.clone())?;
        }
        Ok(())
    }
}

/// Match `incoming` against `book` according to its order type.
pub fn match_order(
    book: &OrderBook,
    incoming: Order,
    now: DateTime<Utc>,
) -> Result<MatchOutcome, OrderStateError> {
    match incoming.order_type {
        OrderType::Limit => match_limit(book, incoming, now),
        OrderType::Market => match_market(book, incoming, now),
    }
}

/// Limit order: trade while the price crosses, then rest any remainder.
pub fn match_limit(
    book: &OrderBook,
    mut incoming: Order,
    now: DateTime<Utc>,
) -> Result<MatchOutcome, OrderStateError> {
    let limit = incoming.price;
    let (makers, trades) = sweep(book, &mut incoming, limit, now)?;
    let rests = !incoming.remaining_quantity().is_zero();

    Ok(MatchOutcome {
        incoming,
        makers,
        trades,
        rests,
    })
}

/// Market order: trade at any price until filled or the side runs dry.
/// Whatever is left is canceled; market orders never rest.
pub fn match_market(
    book: &OrderBook,
    mut incoming: Order,
    now: DateTime<Utc>,
) -> Result<MatchOutcome, OrderStateError> {
    let (makers, trades) = sweep(book, &mut incoming, None, now)?;
    incoming.expire_unfilled(now)?;

    Ok(MatchOutcome {
        incoming,
        makers,
        trades,
        rests: false,
    })
}

/// Whether an incoming order limited at `limit` trades against a resting
/// order priced at `resting`
pub fn prices_cross(side: Side, limit: Price, resting: Price) -> bool {
    match side {
        Side::Buy => limit >= resting,
        Side::Sell => limit <= resting,
    }
}

type Sweep = (SmallVec<[Order; 4]>, SmallVec<[Trade; 4]>);

/// Walk the opposite side best-first. Each resting order is visited once,
/// so the loop is bounded by the book's contents.
fn sweep(
    book: &OrderBook,
    incoming: &mut Order,
    limit: Option<Price>,
    now: DateTime<Utc>,
) -> Result<Sweep, OrderStateError> {
    let mut makers = SmallVec::new();
    let mut trades = SmallVec::new();

    for resting in book.iter_opposite(incoming.side) {
        if incoming.remaining_quantity().is_zero() {
            break;
        }
        let Some(resting_price) = resting.price else {
            continue;
        };
        if let Some(limit) = limit {
            if !prices_cross(incoming.side, limit, resting_price) {
                break;
            }
        }

        let quantity = incoming
            .remaining_quantity()
            .min(resting.remaining_quantity());

        let mut maker = resting.clone();
        maker.fill(quantity, now)?;
        incoming.fill(quantity, now)?;

        tracing::debug!(
            "Trade {} {} @ {} (taker {}, maker {})",
            incoming.symbol,
            quantity,
            resting_price,
            incoming.id,
            maker.id
        );

        trades.push(Trade::between(incoming, &maker, resting_price, quantity, now));
        makers.push(maker);
    }

    Ok((makers, trades))
}
