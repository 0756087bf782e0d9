//! Business events and the in-process event bus
//!
//! This module provides:
//! - The closed set of event types integrators subscribe to
//! - `BusinessEvent`, the unit business logic raises
//! - Event bus for fire-and-forget emission

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::{BusinessEvent, EventType};
