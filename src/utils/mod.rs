//!
//! Utility module.
//!
//! Re-exports formatting helpers used by the display and progress logging.
/// Utility functions for formatting and display
pub mod index;

pub use index::{COIN_DECIMALS, format_rate, format_token_amount};
