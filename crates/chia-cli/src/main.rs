// chia - one-shot command line for the Chia daemon WebSocket
//
// Connects with the node's daemon certificate, registers, sends a single
// command to the chosen service and prints the reply payload as JSON.

mod cli;

use std::process;

use anyhow::{bail, Context, Result};
use chia_config::{default_config_path, ConnectionConfig};
use chia_protocol::{Payload, Service};
use chia_rpc::{ChiaClient, ConnectionHooks};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// Exit codes for different scenarios
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const CONNECTION_ERROR: i32 = 2;
    pub const COMMAND_ERROR: i32 = 3;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(LevelFilter::from(cli.log_level).into()),
        )
        .init();

    let (service, command, data) = match &cli.command {
        Commands::Services => {
            for service in Service::ALL {
                println!("{:<10} {}", service.name(), service.destination());
            }
            process::exit(exit_codes::SUCCESS);
        }
        Commands::Call {
            service,
            command,
            data,
        } => (*service, command.clone(), data.clone()),
    };

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("configuration error: {:#}", e);
            process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let data = match parse_payload(&data) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("invalid command data: {:#}", e);
            process::exit(exit_codes::COMMAND_ERROR);
        }
    };

    let client = ChiaClient::new(config);
    if let Err(e) = open(&client).await {
        eprintln!("connection error: {:#}", e);
        process::exit(exit_codes::CONNECTION_ERROR);
    }

    let outcome = client.call(service, &command, data).await;
    if let Err(e) = client.disconnect().await {
        debug!("Disconnect after command failed: {}", e);
    }

    match outcome {
        Ok(payload) => match serde_json::to_string_pretty(&serde_json::Value::Object(payload)) {
            Ok(rendered) => {
                println!("{}", rendered);
                process::exit(exit_codes::SUCCESS);
            }
            Err(e) => {
                eprintln!("failed to render reply: {}", e);
                process::exit(exit_codes::COMMAND_ERROR);
            }
        },
        Err(e) => {
            eprintln!("{} {} failed: {}", service, command, e);
            process::exit(exit_codes::COMMAND_ERROR);
        }
    }
}

/// Load the config file and apply command line overrides
fn load_configuration(cli: &Cli) -> Result<ConnectionConfig> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = if cli.config.is_some() {
        ConnectionConfig::load(&path)?
    } else {
        ConnectionConfig::load_or_default(&path)?
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_seconds = timeout;
    }

    config.validate()?;
    Ok(config)
}

fn parse_payload(raw: &str) -> Result<Payload> {
    match serde_json::from_str(raw).context("data is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!("data must be a JSON object, got {}", other),
    }
}

/// Connect and wait for the daemon to acknowledge registration
async fn open(client: &ChiaClient) -> Result<()> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let hooks = ConnectionHooks::new()
        .on_ready(move || {
            let _ = ready_tx.send(());
        })
        .on_close(|| info!("Daemon connection closed"));

    client.connect(hooks).await?;

    let wait = client.config().response_timeout();
    match tokio::time::timeout(wait, ready_rx).await {
        Ok(Ok(())) => {
            info!("Registered with daemon as {}", client.config().service_name);
            Ok(())
        }
        Ok(Err(_)) => bail!("daemon closed the connection during registration"),
        Err(_) => {
            let _ = client.disconnect().await;
            bail!("daemon did not acknowledge registration within {:?}", wait)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_must_be_an_object() {
        assert!(parse_payload("{}").unwrap().is_empty());
        assert_eq!(parse_payload(r#"{"height": 10}"#).unwrap()["height"], 10);
        assert!(parse_payload("[1, 2]").is_err());
        assert!(parse_payload("not json").is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let mut cli = Cli::try_parse_from([
            "chia",
            "--host",
            "node.local",
            "--port",
            "58400",
            "--timeout",
            "3",
            "services",
        ])
        .unwrap();
        cli.config = None;

        let config = load_configuration(&cli).unwrap();
        assert_eq!(config.host, "node.local");
        assert_eq!(config.port, 58400);
        assert_eq!(config.response_timeout(), std::time::Duration::from_secs(3));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut cli = Cli::try_parse_from(["chia", "--timeout", "0", "services"]).unwrap();
        cli.config = None;
        assert!(load_configuration(&cli).is_err());
    }
}
