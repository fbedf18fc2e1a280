use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors (default)
    Warn,
    /// Connection lifecycle messages
    Info,
    /// Every request sent and discarded reply
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "chia")]
#[command(about = "Send commands to a Chia daemon over its WebSocket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level
    #[arg(short = 'l', long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Config file path (defaults to ~/.config/chia-repl/config.toml)
    #[arg(short = 'C', long, global = true, env = "CHIA_REPL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Daemon host (overrides config file)
    #[arg(long, global = true, env = "CHIA_REPL_HOST")]
    pub host: Option<String>,

    /// Daemon port (overrides config file)
    #[arg(long, global = true, env = "CHIA_REPL_PORT")]
    pub port: Option<u16>,

    /// Reply timeout in seconds (overrides config file)
    #[arg(long, global = true, env = "CHIA_REPL_TIMEOUT")]
    pub timeout: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send one command and print the reply payload
    Call {
        /// Target service: daemon, full_node, wallet, farmer, harvester, crawler
        service: chia_protocol::Service,

        /// Command name, e.g. get_blockchain_state
        command: String,

        /// JSON object passed as the command's data
        #[arg(default_value = "{}")]
        data: String,
    },

    /// List the services commands can be addressed to
    Services,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chia_protocol::Service;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_parses_service_and_default_data() {
        let cli = Cli::try_parse_from(["chia", "call", "full_node", "get_blockchain_state"]).unwrap();
        match cli.command {
            Commands::Call {
                service,
                command,
                data,
            } => {
                assert_eq!(service, Service::FullNode);
                assert_eq!(command, "get_blockchain_state");
                assert_eq!(data, "{}");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn unknown_service_is_rejected() {
        assert!(Cli::try_parse_from(["chia", "call", "timelord", "ping"]).is_err());
    }

    #[test]
    fn global_overrides_parse() {
        let cli = Cli::try_parse_from([
            "chia", "--host", "10.0.0.2", "--port", "8444", "--timeout", "2.5", "services",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.port, Some(8444));
        assert_eq!(cli.timeout, Some(2.5));
    }
}
