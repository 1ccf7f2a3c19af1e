// Per-vehicle mutual exclusion for the ingestion sequence
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per vehicle id. Different vehicles never contend.
#[derive(Default)]
pub struct VehicleLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl VehicleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `vehicle_id`; released when the guard drops.
    pub async fn acquire(&self, vehicle_id: &str) -> VehicleGuard<'_> {
        let lock = {
            let mut locks = self.table();
            locks
                .entry(vehicle_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        VehicleGuard {
            locks: self,
            vehicle_id: vehicle_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive access to one vehicle. The table entry goes away with the last
/// holder so ids seen once do not accumulate.
pub struct VehicleGuard<'a> {
    locks: &'a VehicleLocks,
    vehicle_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for VehicleGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.table();
        // Only the table holds it: nobody is inside or queued
        if locks
            .get(&self.vehicle_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.vehicle_id);
        }
    }
}
