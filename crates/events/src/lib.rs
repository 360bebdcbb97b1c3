//! Domain events and the envelope used to broadcast them.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
