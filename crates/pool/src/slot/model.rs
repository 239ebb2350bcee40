//! Slot type definition

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One member of the worker pool
///
/// A slot is either unbound (empty `process_id` and `process_handle`) or bound to
/// exactly one OS process. The handle is supplied by the process inventory and
/// identifies a single process instance (pid reuse yields a different handle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Unique slot id, immutable after creation
    pub id: String,

    /// Process id of the bound process (empty when unbound)
    #[serde(default)]
    pub process_id: String,

    /// Inventory handle of the bound process (empty when unbound)
    #[serde(default)]
    pub process_handle: String,

    /// Name of the worker manager that owns this slot
    pub owner_name: String,

    /// When the bound process was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Slot {
    /// Create a new unbound slot for the given owner
    pub fn new(owner_name: impl Into<String>) -> Self {
        let owner_name = owner_name.into();
        Self {
            id: format!("{}-{}", owner_name, Uuid::now_v7()),
            process_id: String::new(),
            process_handle: String::new(),
            owner_name,
            started_at: None,
        }
    }

    /// Whether a process has been bound to this slot
    pub fn is_bound(&self) -> bool {
        !self.process_handle.is_empty()
    }

    /// Return a copy bound to the given process, keeping id and owner
    pub fn bind(
        &self,
        process_id: impl Into<String>,
        process_handle: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: self.id.clone(),
            process_id: process_id.into(),
            process_handle: process_handle.into(),
            owner_name: self.owner_name.clone(),
            started_at: Some(started_at),
        }
    }

    /// Time the bound process has been running as of `now`
    ///
    /// `None` when the slot carries no start time. Clock skew that puts the start
    /// time in the future counts as zero.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let started_at = self.started_at?;
        Some((now - started_at).to_std().unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_new_slot_is_unbound() {
        let slot = Slot::new("mailer");
        assert!(slot.id.starts_with("mailer-"));
        assert_eq!(slot.owner_name, "mailer");
        assert!(!slot.is_bound());
        assert!(slot.process_id.is_empty());
        assert!(slot.started_at.is_none());
    }

    #[test]
    fn test_new_slot_ids_are_unique() {
        let a = Slot::new("mailer");
        let b = Slot::new("mailer");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_bind_preserves_identity() {
        let slot = Slot::new("mailer");
        let now = Utc::now();
        let bound = slot.bind("4242", "4242.1700000000", now);

        assert_eq!(bound.id, slot.id);
        assert_eq!(bound.owner_name, slot.owner_name);
        assert_eq!(bound.process_id, "4242");
        assert_eq!(bound.process_handle, "4242.1700000000");
        assert_eq!(bound.started_at, Some(now));
        assert!(bound.is_bound());
    }

    #[test]
    fn test_elapsed() {
        let now = Utc::now();
        let slot = Slot::new("mailer").bind("1", "1.0", now - TimeDelta::seconds(90));
        assert_eq!(slot.elapsed(now), Some(Duration::from_secs(90)));

        let future = Slot::new("mailer").bind("1", "1.0", now + TimeDelta::seconds(5));
        assert_eq!(future.elapsed(now), Some(Duration::ZERO));

        assert_eq!(Slot::new("mailer").elapsed(now), None);
    }

    #[test]
    fn test_serde_field_names() {
        let slot = Slot::new("mailer").bind("7", "7.100", Utc::now());
        let value = serde_json::to_value(&slot).unwrap();
        let object = value.as_object().unwrap();

        for field in ["id", "processId", "processHandle", "ownerName", "startedAt"] {
            assert!(object.contains_key(field), "missing field {field}");
        }
    }

    #[test]
    fn test_legacy_record_without_start_time() {
        let slot: Slot = serde_json::from_str(
            r#"{"id":"mailer-1","processId":"","processHandle":"","ownerName":"mailer"}"#,
        )
        .unwrap();
        assert_eq!(slot.id, "mailer-1");
        assert!(slot.started_at.is_none());
    }
}
