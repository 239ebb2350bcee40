//! In-memory implementation of SlotStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::*;

/// In-memory implementation of SlotStore
///
/// Stores all blobs in memory with the same version semantics as the
/// PostgreSQL implementation. Write failures can be injected for tests.
///
/// # Example
///
/// ```
/// use pidwarden_pool::InMemorySlotStore;
///
/// let store = InMemorySlotStore::new();
/// ```
pub struct InMemorySlotStore {
    entries: RwLock<HashMap<String, StoredBlob>>,
    fail_writes: RwLock<Option<String>>,
}

impl InMemorySlotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fail_writes: RwLock::new(None),
        }
    }

    /// Create a store with `data` already stored under `key` at version 1
    pub fn with_entry(key: impl Into<String>, data: Vec<u8>) -> Self {
        let store = Self::new();
        store
            .entries
            .write()
            .insert(key.into(), StoredBlob { data, version: 1 });
        store
    }

    /// Make every subsequent write fail with a database error
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.fail_writes.write() = Some(message.into());
    }

    /// Current version stored under `key`
    pub fn version(&self, key: &str) -> Option<i64> {
        self.entries.read().get(key).map(|e| e.version)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for InMemorySlotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        data: Vec<u8>,
        precondition: WritePrecondition,
    ) -> Result<i64, StoreError> {
        if let Some(message) = self.fail_writes.read().as_ref() {
            return Err(StoreError::Database(message.clone()));
        }

        let mut entries = self.entries.write();
        let current = entries.get(key).map(|e| e.version);
        precondition.check(key, current)?;

        let version = current.unwrap_or(0) + 1;
        entries.insert(key.to_string(), StoredBlob { data, version });
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemorySlotStore::new();
        assert!(store.get(SLOTS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemorySlotStore::new();

        let v1 = store
            .set(SLOTS_KEY, b"one".to_vec(), WritePrecondition::Any)
            .await
            .unwrap();
        let v2 = store
            .set(SLOTS_KEY, b"two".to_vec(), WritePrecondition::Any)
            .await
            .unwrap();

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);

        let blob = store.get(SLOTS_KEY).await.unwrap().unwrap();
        assert_eq!(blob.data, b"two");
        assert_eq!(blob.version, 2);
    }

    #[tokio::test]
    async fn test_versioned_write_conflict_leaves_entry_unchanged() {
        let store = InMemorySlotStore::with_entry(SLOTS_KEY, b"first".to_vec());

        store
            .set(SLOTS_KEY, b"second".to_vec(), WritePrecondition::Version(1))
            .await
            .unwrap();

        let stale = store
            .set(SLOTS_KEY, b"third".to_vec(), WritePrecondition::Version(1))
            .await;

        assert!(matches!(stale, Err(StoreError::ConcurrencyConflict { .. })));
        assert_eq!(store.get(SLOTS_KEY).await.unwrap().unwrap().data, b"second");
    }

    #[tokio::test]
    async fn test_absent_precondition() {
        let store = InMemorySlotStore::new();

        store
            .set(SLOTS_KEY, b"a".to_vec(), WritePrecondition::Absent)
            .await
            .unwrap();
        let second = store
            .set(SLOTS_KEY, b"b".to_vec(), WritePrecondition::Absent)
            .await;

        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = InMemorySlotStore::with_entry(SLOTS_KEY, b"kept".to_vec());
        store.fail_writes("disk full");

        let result = store
            .set(SLOTS_KEY, b"lost".to_vec(), WritePrecondition::Any)
            .await;

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(store.get(SLOTS_KEY).await.unwrap().unwrap().data, b"kept");
    }
}
