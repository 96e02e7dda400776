// ============================================================================
// Persistence Module
// Gateway implementations
// ============================================================================

mod memory;

pub use memory::{InMemoryStore, MemoryTransaction};
