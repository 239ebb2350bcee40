//! File-backed implementation of SlotStore
//!
//! Each key is one JSON envelope file in the state directory. Writes go to a
//! temporary file first and are renamed over the target, so readers see either
//! the old or the new blob.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store::*;

/// On-disk envelope around a blob
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: i64,
    updated_at: DateTime<Utc>,
    /// Base64-encoded blob
    data: String,
}

/// SlotStore keeping one file per key under a directory
///
/// Version checks are done in-process only; two hosts sharing the directory over
/// a network filesystem are not coordinated.
///
/// # Example
///
/// ```ignore
/// use pidwarden_pool::persistence::FileSlotStore;
///
/// let store = FileSlotStore::new("/var/lib/pidwarden/mailer");
/// ```
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    /// Create a store rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    async fn read_envelope(&self, key: &str) -> Result<Option<Envelope>, StoreError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };

        let envelope = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(Some(envelope))
    }
}

#[async_trait]
impl SlotStore for FileSlotStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>, StoreError> {
        let Some(envelope) = self.read_envelope(key).await? else {
            return Ok(None);
        };

        let data = BASE64
            .decode(envelope.data.as_bytes())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Some(StoredBlob {
            data,
            version: envelope.version,
        }))
    }

    #[instrument(skip(self, data), fields(dir = %self.dir.display(), bytes = data.len()))]
    async fn set(
        &self,
        key: &str,
        data: Vec<u8>,
        precondition: WritePrecondition,
    ) -> Result<i64, StoreError> {
        let current = self.read_envelope(key).await?.map(|e| e.version);
        precondition.check(key, current)?;

        let version = current.unwrap_or(0) + 1;
        let envelope = Envelope {
            version,
            updated_at: Utc::now(),
            data: BASE64.encode(&data),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.dir.display(), e)))?;

        write_atomic(&self.dir, &self.path_for(key), &bytes).await?;

        debug!(%key, version, "wrote blob");
        Ok(version)
    }
}

/// Write `bytes` to a temp file in `dir` and rename it over `target`
///
/// The temp file never outlives a failed write.
async fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = dir.join(format!(".{}.tmp", Uuid::now_v7()));

    let result = async {
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, target)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", target.display(), e)))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}
