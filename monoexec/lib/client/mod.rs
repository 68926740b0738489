//! The caller-side client of an executor's control API.

mod executor;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use executor::*;
