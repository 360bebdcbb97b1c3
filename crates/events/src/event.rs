use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable facts emitted by aggregates after a state change
/// (e.g. "delivery.claimed").
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "production.finished").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
