//! SlotStore trait definition

use async_trait::async_trait;

/// Default key under which the slot table is stored
pub const SLOTS_KEY: &str = "slots";

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Versioned write rejected (optimistic locking failed)
    #[error("concurrency conflict on {key}: expected version {expected:?}, got {actual:?}")]
    ConcurrencyConflict {
        key: String,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored blob together with its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Opaque blob bytes
    pub data: Vec<u8>,

    /// Version, incremented on every successful write
    pub version: i64,
}

/// Condition a write must satisfy to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Overwrite unconditionally (last writer wins)
    Any,

    /// Only write if nothing is stored under the key yet
    Absent,

    /// Only write if the stored version still equals this one
    Version(i64),
}

impl WritePrecondition {
    /// Check the precondition against the currently stored version
    pub fn check(&self, key: &str, current: Option<i64>) -> Result<(), StoreError> {
        let ok = match self {
            Self::Any => true,
            Self::Absent => current.is_none(),
            Self::Version(expected) => current == Some(*expected),
        };

        if ok {
            Ok(())
        } else {
            Err(StoreError::ConcurrencyConflict {
                key: key.to_string(),
                expected: self.expected_version(),
                actual: current,
            })
        }
    }

    fn expected_version(&self) -> Option<i64> {
        match self {
            Self::Version(v) => Some(*v),
            _ => None,
        }
    }
}

/// Durable storage for named blobs
///
/// The worker manager keeps its whole slot table in one entry. Implementations
/// must apply a write fully or not at all.
#[async_trait]
pub trait SlotStore: Send + Sync + 'static {
    /// Read the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, StoreError>;

    /// Write `data` under `key` if `precondition` holds
    ///
    /// Returns the new version.
    async fn set(
        &self,
        key: &str,
        data: Vec<u8>,
        precondition: WritePrecondition,
    ) -> Result<i64, StoreError>;
}
