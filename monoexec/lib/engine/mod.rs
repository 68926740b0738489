//! Container engine access: the [`Engine`] trait, its docker implementation and the pool
//! bounding concurrent engine calls.

mod docker;
mod pool;
mod traits;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use docker::*;
pub use pool::*;
pub use traits::*;
