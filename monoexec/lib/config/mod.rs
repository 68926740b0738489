//! Configuration types and helpers.

mod defaults;
mod executor;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use executor::*;
