//! Runtime records and the registry tracking them.

mod registry;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use registry::*;
pub use state::*;
