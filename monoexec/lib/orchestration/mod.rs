//! Building, invoking and reclaiming runtime containers.

mod build;
mod execute;
mod log;
mod maintenance;
mod orchestrator;
mod remove;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use log::*;
pub use orchestrator::*;
pub use types::*;
