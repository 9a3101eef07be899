//! The event abstraction seen by the engine.
//!
//! The engine never inspects event data directly: every read goes through a
//! field accessor registered in the [`Model`](crate::Model). The trait only
//! exposes what dispatch needs.

/// Event type name that matches every event.
pub const WILDCARD: &str = "*";

/// An observed occurrence (process exec, file open, connection, ...).
pub trait Event {
    /// Routing key used by the rule store, e.g. `"exec"`.
    fn event_type(&self) -> &str;

    /// Whether the event was collected asynchronously.
    fn is_async(&self) -> bool {
        false
    }
}

impl<T: Event + ?Sized> Event for &T {
    fn event_type(&self) -> &str {
        (**self).event_type()
    }

    fn is_async(&self) -> bool {
        (**self).is_async()
    }
}
