use std::{
    ops::Deref,
    sync::{Mutex, PoisonError},
};

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{ExecutorError, ExecutorResult};

use super::Engine;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A fixed-size pool of container engine handles.
///
/// The pool bounds how many engine calls run at once. [`acquire`](Self::acquire) waits for a free
/// handle and returns a guard that puts the handle back when dropped, so a handle is released on
/// every exit path, including errors and cancelled futures.
pub struct OrchestrationPool {
    /// The idle handles.
    handles: Mutex<Vec<Box<dyn Engine>>>,

    /// One permit per handle.
    permits: Semaphore,

    /// The total number of handles.
    size: usize,
}

/// A handle borrowed from an [`OrchestrationPool`]. Returned to the pool on drop.
pub struct PoolHandle<'a> {
    /// The borrowed handle. Only `None` while being returned.
    engine: Option<Box<dyn Engine>>,

    /// The pool the handle goes back to.
    pool: &'a OrchestrationPool,

    /// Released after the handle is back in the pool.
    _permit: SemaphorePermit<'a>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OrchestrationPool {
    /// Creates a pool owning `handles`.
    pub fn new(handles: Vec<Box<dyn Engine>>) -> Self {
        let size = handles.len();
        Self {
            handles: Mutex::new(handles),
            permits: Semaphore::new(size),
            size,
        }
    }

    /// Creates a pool of `size` handles produced by `make`.
    pub fn from_fn(size: usize, mut make: impl FnMut() -> Box<dyn Engine>) -> Self {
        Self::new((0..size).map(|_| make()).collect())
    }

    /// Waits for a free handle and borrows it.
    pub async fn acquire(&self) -> ExecutorResult<PoolHandle<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExecutorError::custom(anyhow::anyhow!("orchestration pool closed: {e}")))?;

        let engine = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| {
                ExecutorError::custom(anyhow::anyhow!("orchestration pool has no idle handle"))
            })?;

        Ok(PoolHandle {
            engine: Some(engine),
            pool: self,
            _permit: permit,
        })
    }

    /// The total number of handles.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of handles not currently borrowed.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Deref for PoolHandle<'_> {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        // Only taken in `drop`.
        match &self.engine {
            Some(engine) => engine.as_ref(),
            None => unreachable!("pool handle used after release"),
        }
    }
}

impl Drop for PoolHandle<'_> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(engine);
        }
    }
}

impl std::fmt::Debug for OrchestrationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationPool")
            .field("size", &self.size)
            .field("available", &self.available())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
