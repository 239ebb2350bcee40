//! Slot data model
//!
//! This module provides:
//! - [`Slot`] - one pool member, bound to at most one OS process
//! - [`SlotTable`] - the ordered id → slot mapping persisted as a single blob

mod model;
mod table;

pub use model::Slot;
pub use table::{CodecError, SlotTable};
