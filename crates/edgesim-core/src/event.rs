//! Simulation events.

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

use crate::component::Id;

/// Sequence number assigned when an event is scheduled.
pub type EventId = u64;

/// Payload carried by an event.
///
/// Any `Serialize + 'static` type is an event payload, serialization is only used for trace logging.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// Event delivered to a component handler.
pub struct Event {
    pub time: f64,
    pub src: Id,
    pub dest: Id,
    pub data: Box<dyn EventData>,
}
