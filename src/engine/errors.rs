// ============================================================================
// Engine Errors
// Closed error taxonomy surfaced to the request layer
// ============================================================================

use crate::domain::{ConfigError, OrderId, OrderStateError, OrderStatus, ValidationError};
use crate::interfaces::PersistenceError;
use crate::numeric::NumericError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("order {order_id} not found")]
    NotFound { order_id: OrderId },

    #[error("order {order_id} is already {status}")]
    AlreadyFinalized {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("arithmetic error during matching: {0}")]
    Numeric(#[from] NumericError),

    #[error("order state error: {0}")]
    OrderState(#[from] OrderStateError),

    #[error("background task failed: {0}")]
    TaskFailed(String),
}

/// Coarse classification for mapping errors onto a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyFinalized,
    Persistence,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::AlreadyFinalized { .. } => ErrorKind::AlreadyFinalized,
            EngineError::Persistence(_) => ErrorKind::Persistence,
            EngineError::Config(_)
            | EngineError::Numeric(_)
            | EngineError::OrderState(_)
            | EngineError::TaskFailed(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Persistence)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
