//! tabwire-protocol: wire definitions for the browser agent channel
//!
//! The agent channel carries JSON text frames. Every frame is an object with
//! a `type` discriminator; requests sent by the bridge carry a `request_id`
//! that the agent echoes on the matching reply. Everything else in a frame is
//! opaque payload.

pub mod envelope;
pub mod kinds;

pub use envelope::{CorrelationId, Envelope, EnvelopeError};
