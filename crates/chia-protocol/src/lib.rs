//! Shared protocol types for talking to the Chia daemon over its WebSocket.
//!
//! Every message in either direction is an [`Envelope`]: a JSON object naming
//! the command, the sending and receiving services, an acknowledgement flag,
//! a correlation [`RequestId`] and an arbitrary `data` payload.

mod envelope;
mod service;

pub use envelope::{
    Envelope, Payload, RequestId, DAEMON_DESTINATION, DEFAULT_SERVICE_NAME, REGISTER_SERVICE,
};
pub use service::{Service, UnknownService};
