//! # Chia client configuration
//!
//! Connection options consumed by the daemon client: where the daemon
//! listens, which client certificate to present, how long to wait for
//! replies and which service name to register under.
//!
//! ```rust,no_run
//! use chia_config::{default_config_path, ConnectionConfig};
//!
//! let config = ConnectionConfig::load_or_default(&default_config_path())?;
//! println!("connecting to {}", config.url());
//! # Ok::<(), chia_config::ConfigError>(())
//! ```

#![warn(missing_docs)]

mod connection;
mod paths;

pub use connection::{ConfigError, ConfigResult, ConnectionConfig};
pub use paths::{default_config_path, expand_home};
