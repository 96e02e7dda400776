// ============================================================================
// Engine Module
// Matching core, per-symbol dispatch and the error taxonomy
// ============================================================================

mod errors;
mod matching_engine;
mod registry;

pub mod price_time;

#[cfg(feature = "async")]
pub mod async_api;

pub use errors::{EngineError, EngineResult, ErrorKind};
pub use matching_engine::{MatchingEngine, Placement};
pub use price_time::MatchOutcome;
pub use registry::{BookHandle, BookRegistry, SymbolBook};

#[cfg(feature = "async")]
pub use async_api::AsyncMatchingEngine;
