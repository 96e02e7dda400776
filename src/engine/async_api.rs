// ============================================================================
// Async Facade
// Runs the blocking engine on tokio's blocking pool
// ============================================================================

use super::errors::{EngineError, EngineResult};
use super::matching_engine::{MatchingEngine, Placement};
use crate::domain::{EngineConfig, Order, OrderBookSnapshot, OrderId, OrderRequest, Trade};
use crate::interfaces::PersistenceGateway;
use std::sync::Arc;
use tokio::task;

/// Cloneable async handle over a shared [`MatchingEngine`].
///
/// Book locks and store calls block, so each call moves to
/// `spawn_blocking` rather than stalling the runtime's workers.
#[derive(Clone)]
pub struct AsyncMatchingEngine {
    inner: Arc<MatchingEngine>,
}

impl AsyncMatchingEngine {
    pub fn new(engine: Arc<MatchingEngine>) -> Self {
        Self { inner: engine }
    }

    /// Start the engine (including recovery) off the async workers
    pub async fn start(
        config: EngineConfig,
        store: Arc<dyn PersistenceGateway>,
    ) -> EngineResult<Self> {
        let engine = task::spawn_blocking(move || MatchingEngine::start(config, store))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))??;
        Ok(Self::new(Arc::new(engine)))
    }

    pub fn engine(&self) -> &Arc<MatchingEngine> {
        &self.inner
    }

    pub async fn place(&self, request: OrderRequest) -> EngineResult<Placement> {
        self.run(move |engine| engine.place(request)).await
    }

    pub async fn cancel(&self, order_id: OrderId) -> EngineResult<Order> {
        self.run(move |engine| engine.cancel(order_id)).await
    }

    pub async fn get_order(&self, order_id: OrderId) -> EngineResult<Order> {
        self.run(move |engine| engine.get_order(order_id)).await
    }

    pub async fn snapshot(&self, symbol: String) -> EngineResult<OrderBookSnapshot> {
        self.run(move |engine| engine.snapshot(&symbol)).await
    }

    pub async fn recent_trades(&self, symbol: String, limit: usize) -> EngineResult<Vec<Trade>> {
        self.run(move |engine| engine.recent_trades(&symbol, limit)).await
    }

    async fn run<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&MatchingEngine) -> EngineResult<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.inner);
        task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, Side};
    use crate::numeric::{Price, Quantity};
    use crate::persistence::InMemoryStore;

    #[tokio::test]
    async fn test_async_place_and_cancel() {
        let store = Arc::new(InMemoryStore::new());
        let engine = AsyncMatchingEngine::start(EngineConfig::default(), store)
            .await
            .unwrap();

        let request = OrderRequest::limit(
            "ETHUSD",
            Side::Sell,
            Price::from_integer(2000).unwrap(),
            Quantity::from_integer(1).unwrap(),
        );
        let placed = engine.place(request).await.unwrap();
        assert_eq!(placed.order.status(), OrderStatus::Open);

        let snapshot = engine.snapshot("ETHUSD".to_string()).await.unwrap();
        assert_eq!(snapshot.asks.len(), 1);

        let canceled = engine.cancel(placed.order.id).await.unwrap();
        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert!(engine
            .recent_trades("ETHUSD".to_string(), 10)
            .await
            .unwrap()
            .is_empty());
    }
}
