use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};

use crate::{ExecutorError, ExecutorResult};

use super::{RuntimeRecord, RuntimeStatus};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The in-process table of runtimes known to this executor.
///
/// Every operation takes the internal lock for the duration of a single map access, so the
/// registry can be shared freely between tasks. Capacity is fixed when the registry is created.
#[derive(Debug)]
pub struct RuntimeRegistry {
    /// The records, keyed by runtime name.
    records: Mutex<HashMap<String, RuntimeRecord>>,

    /// The maximum number of records.
    capacity: usize,

    /// Signalled whenever a record is written or removed.
    changed: Notify,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeRegistry {
    /// Creates an empty registry holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
            capacity,
            changed: Notify::new(),
        }
    }

    /// Inserts a new record unless one with the same name is already pending or up.
    ///
    /// A record in `error` status is replaced. The check and the insert happen under one lock,
    /// so of two concurrent creates for the same name exactly one succeeds.
    pub fn create(&self, record: RuntimeRecord) -> ExecutorResult<()> {
        let mut records = self.lock();
        let name = record.get_name().clone();

        match records.get(&name).map(|r| r.get_status()) {
            Some(RuntimeStatus::Pending) => return Err(ExecutorError::Transient(name)),
            Some(RuntimeStatus::Up { .. }) => return Err(ExecutorError::Conflict(name)),
            Some(RuntimeStatus::Error) => {}
            None if records.len() >= self.capacity => {
                return Err(ExecutorError::CapacityExceeded(self.capacity))
            }
            None => {}
        }

        records.insert(name, record);
        drop(records);

        self.changed.notify_waiters();
        Ok(())
    }

    /// Gets a copy of the record for `name`.
    pub fn get(&self, name: &str) -> Option<RuntimeRecord> {
        self.lock().get(name).cloned()
    }

    /// Whether a record for `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Writes a record, replacing any record with the same name.
    pub fn set(&self, record: RuntimeRecord) -> ExecutorResult<()> {
        let mut records = self.lock();
        let name = record.get_name().clone();

        if !records.contains_key(&name) && records.len() >= self.capacity {
            return Err(ExecutorError::CapacityExceeded(self.capacity));
        }

        records.insert(name, record);
        drop(records);

        self.changed.notify_waiters();
        Ok(())
    }

    /// Applies `f` to the record for `name` in place. Returns `false` if there is no such record.
    pub fn update(&self, name: &str, f: impl FnOnce(&mut RuntimeRecord)) -> bool {
        let updated = match self.lock().get_mut(name) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        };

        if updated {
            self.changed.notify_waiters();
        }

        updated
    }

    /// Refreshes the activity clock of the record for `name`.
    pub fn touch(&self, name: &str) -> bool {
        self.update(name, RuntimeRecord::touch)
    }

    /// Removes and returns the record for `name`.
    pub fn delete(&self, name: &str) -> Option<RuntimeRecord> {
        let removed = self.lock().remove(name);
        if removed.is_some() {
            self.changed.notify_waiters();
        }

        removed
    }

    /// Returns copies of all records, sorted by name.
    pub fn list(&self) -> Vec<RuntimeRecord> {
        let mut records: Vec<_> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        records
    }

    /// Removes every record and returns them.
    pub fn clear(&self) -> Vec<RuntimeRecord> {
        let drained: Vec<_> = self.lock().drain().map(|(_, r)| r).collect();
        self.changed.notify_waiters();
        drained
    }

    /// The number of records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The maximum number of records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waits until the record for `name` leaves `pending`, for at most `attempts * interval`.
    ///
    /// Wakes up as soon as the record changes instead of sleeping out the full interval.
    /// Fails with `NotFound` if there is no record (or it disappears while waiting) and with
    /// `LaunchTimeout` if the record is still pending when the window closes.
    pub async fn wait_until_ready(
        &self,
        name: &str,
        attempts: u32,
        interval: Duration,
    ) -> ExecutorResult<RuntimeRecord> {
        let deadline = Instant::now() + interval * attempts;

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.get(name) {
                None => return Err(ExecutorError::NotFound(name.to_string())),
                Some(record) if !record.is_pending() => return Ok(record),
                Some(_) => {}
            }

            if Instant::now() >= deadline {
                return Err(ExecutorError::LaunchTimeout(name.to_string()));
            }

            tracing::trace!("runtime {name} is still pending, waiting");
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RuntimeRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
