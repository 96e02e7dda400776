// ============================================================================
// Numeric Module
// Fixed-point arithmetic for prices and quantities
// ============================================================================
//
// Matching never touches floating point. Every price and quantity is a
// FixedDecimal backed by an i64 scaled by 10^8, the same precision the
// order store uses for its DECIMAL(15,8) columns.

mod errors;
mod fixed_decimal;

pub use errors::{NumericError, NumericResult};
pub use fixed_decimal::{FixedDecimal, Price, Quantity};
