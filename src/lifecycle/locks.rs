//! Per-schema-name async locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::errors::{LifecycleError, LifecycleResult};

/// One async mutex per key, created on first use.
///
/// Guards may be held across backend calls and grace-period waits; keys
/// never contend with each other.
#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &str) -> LifecycleResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| LifecycleError::poisoned("keyed lock table"))?;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}
