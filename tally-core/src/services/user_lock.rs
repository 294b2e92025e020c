//! Per-user mutual exclusion
//!
//! Rule mutations read the whole rule list, change it and write it back.
//! Holding the user's lock across that sequence keeps two concurrent calls
//! from overwriting each other's priorities. Different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub(crate) struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    /// Wait for exclusive access to `user_id`'s collections
    ///
    /// Entries nobody holds or waits on are dropped on the way, so the map
    /// only grows with the number of users active at the same time.
    pub(crate) async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
