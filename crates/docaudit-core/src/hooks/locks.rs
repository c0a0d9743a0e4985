//! Per-document critical sections
//!
//! Serializes the read-baseline / diff / overwrite-baseline chain for one
//! document id so concurrent updates cannot lose a revision. Entries nobody
//! holds or waits on are pruned on the next acquisition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::DocumentId;

#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub(crate) async fn lock(&self, id: DocumentId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|key, slot| *key == id || Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(id).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let id = DocumentId::new();

        let guard = locks.lock(id).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(DocumentId::new()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(DocumentId::new()))
            .await
            .expect("independent ids never contend");
    }

    #[tokio::test]
    async fn test_idle_slots_pruned() {
        let locks = KeyedLocks::new();
        for _ in 0..5 {
            let _guard = locks.lock(DocumentId::new()).await;
        }
        // Only the most recently acquired slot survives pruning
        let _guard = locks.lock(DocumentId::new()).await;
        assert_eq!(locks.len(), 1);
    }
}
