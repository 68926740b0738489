//! Utility functions and types.

mod path;
mod random;
mod retry;
mod text;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use path::*;
pub use random::*;
pub use retry::*;
pub use text::*;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the current time as a Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns the current time as a Unix timestamp in fractional seconds.
pub fn now_timestamp_f64() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
