//! Client library for the Chia daemon WebSocket
//!
//! One [`ChiaClient`] owns at most one connection. Many commands can be in
//! flight on it at once; each is tagged with a random request id and resolved
//! when the reply carrying the same id arrives, or fails once the configured
//! timeout passes.
//!
//! ```rust,no_run
//! use chia_config::ConnectionConfig;
//! use chia_rpc::{ChiaClient, ConnectionHooks};
//! use chia_protocol::{Payload, Service};
//!
//! # async fn run() -> chia_rpc::ClientResult<()> {
//! let client = ChiaClient::new(ConnectionConfig::default());
//! client
//!     .connect(ConnectionHooks::new().on_ready(|| println!("registered")))
//!     .await?;
//! let state = client
//!     .call(Service::FullNode, "get_blockchain_state", Payload::new())
//!     .await?;
//! println!("{}", serde_json::Value::Object(state));
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod connection;
mod error;
mod pending;
mod tls;

pub use client::ChiaClient;
pub use connection::ConnectionHooks;
pub use error::{ClientError, ClientResult};

pub use chia_protocol::{Envelope, Payload, RequestId, Service};
