//! Ordered slot table and its blob codec

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::model::Slot;

/// Error type for encoding and decoding the slot table blob
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Blob is not a valid slot table
    #[error("invalid slot table blob: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Ordered mapping from slot id to [`Slot`]
///
/// Iteration order is the persisted order. It is the eviction order when the
/// pool shrinks, so the oldest-declared slot goes first.
///
/// The blob form is a JSON object keyed by slot id:
///
/// ```json
/// {"mailer-0190…": {"id": "mailer-0190…", "processId": "4242", "processHandle": "4242.1700000000", "ownerName": "mailer"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<Slot>,
}

impl SlotTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table holds no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a slot by id
    pub fn get(&self, id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    /// Whether a slot with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert a slot, replacing any slot with the same id in place
    ///
    /// A new id is appended at the end.
    pub fn insert(&mut self, slot: Slot) -> Option<Slot> {
        match self.slots.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => Some(std::mem::replace(existing, slot)),
            None => {
                self.slots.push(slot);
                None
            }
        }
    }

    /// Remove a slot by id
    pub fn remove(&mut self, id: &str) -> Option<Slot> {
        let index = self.slots.iter().position(|s| s.id == id)?;
        Some(self.slots.remove(index))
    }

    /// Iterate over slots in table order
    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    /// Slot ids in table order
    pub fn ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }

    /// Decode a table from its blob form
    ///
    /// An empty blob or a JSON `null` decodes to an empty table.
    pub fn from_blob(blob: &[u8]) -> Result<Self, CodecError> {
        if blob.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::new());
        }
        let table: Option<SlotTable> = serde_json::from_slice(blob)?;
        Ok(table.unwrap_or_default())
    }

    /// Encode the table to its blob form
    pub fn to_blob(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl FromIterator<Slot> for SlotTable {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut table = SlotTable::new();
        for slot in iter {
            table.insert(slot);
        }
        table
    }
}

impl IntoIterator for SlotTable {
    type Item = Slot;
    type IntoIter = std::vec::IntoIter<Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a SlotTable {
    type Item = &'a Slot;
    type IntoIter = std::slice::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

impl Serialize for SlotTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for slot in &self.slots {
            map.serialize_entry(&slot.id, slot)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SlotTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(SlotTableVisitor)
    }
}

struct SlotTableVisitor;

impl<'de> Visitor<'de> for SlotTableVisitor {
    type Value = SlotTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of slot id to slot")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut slots: Vec<Slot> = Vec::with_capacity(access.size_hint().unwrap_or(0));

        while let Some((key, slot)) = access.next_entry::<String, Slot>()? {
            if key != slot.id {
                return Err(serde::de::Error::custom(format!(
                    "slot key {key} does not match slot id {}",
                    slot.id
                )));
            }
            if slots.iter().any(|s| s.id == slot.id) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate slot id {}",
                    slot.id
                )));
            }
            slots.push(slot);
        }

        Ok(SlotTable { slots })
    }
}
