//! Outbound notifications for committed changes.

use bakery_events::EventEnvelope;

/// Receives envelopes after the unit of work that produced them commits.
///
/// Delivery is best effort: implementations must not block and may drop.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, envelope: EventEnvelope);
}

/// Discards everything. For tools and tests that do not observe events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _envelope: EventEnvelope) {}
}
