// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod persistence;

pub use persistence::{
    OrderUpdate, PersistenceError, PersistenceGateway, PersistenceResult, Transaction, WriteBatch,
};
