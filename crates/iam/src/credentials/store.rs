use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};

use super::CredentialMaterial;

/// Holds the current credential snapshot for a retriever.
///
/// Readers clone the `Arc` under a read lock; writers only swap the pointer.
/// `refresh_lock` serializes whole refreshes so that fetch, parse and publish
/// never interleave between two callers.
#[derive(Debug, Default)]
pub(crate) struct MaterialStore {
    current: RwLock<Arc<CredentialMaterial>>,
    refresh_lock: Mutex<()>,
}

impl MaterialStore {
    pub(crate) fn load(&self) -> Arc<CredentialMaterial> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish(&self, material: CredentialMaterial) {
        let material = Arc::new(material);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = material;
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}
