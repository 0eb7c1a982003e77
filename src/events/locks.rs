use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per event id, so read-diff-write sequences on the same
/// event never interleave while different events proceed in parallel.
#[derive(Clone, Default)]
pub struct EventLocks {
    slots: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl EventLocks {
    pub async fn lock(&self, event_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // only the map holds these, nobody is waiting or inside
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(event_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
