//! Typed publish/subscribe hub. Transport-layer handlers reach game logic
//! only through this bus.

pub mod bus;

pub use bus::{Event, EventBus, EventHandler, EventKind, SubscriptionId, UpdateSource};
