//! Daemon client implementation

use std::sync::Arc;
use std::time::Duration;

use chia_config::ConnectionConfig;
use chia_protocol::{Envelope, Payload, Service};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionHooks};
use crate::error::{ClientError, ClientResult};
use crate::tls;

/// Client for one daemon connection at a time
///
/// The connection slot is cleared only by [`disconnect`](Self::disconnect),
/// so after the peer hangs up the client still counts as connected (commands
/// fail with [`ClientError::ConnectionClosed`]) until the caller disconnects.
pub struct ChiaClient {
    config: ConnectionConfig,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl ChiaClient {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the TLS WebSocket to the configured daemon and register.
    ///
    /// Returns once the socket is up and the registration envelope is queued;
    /// `hooks.on_ready` fires when the daemon acknowledges it. The dial and
    /// handshakes share the configured response timeout.
    pub async fn connect(&self, hooks: ConnectionHooks) -> ClientResult<()> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        self.config.validate()?;
        let tls = tls::client_config(&self.config.cert_file(), &self.config.key_file())?;
        let url = self.config.url();

        info!("Connecting to {}...", url);
        let stream = dial(
            &url,
            Some(Connector::Rustls(tls)),
            self.config.response_timeout(),
        )
        .await?;

        *slot = Some(Arc::new(Connection::spawn(
            stream,
            &self.config.service_name,
            hooks,
            self.config.response_timeout(),
        )?));
        Ok(())
    }

    /// Adopt an already established WebSocket and register on it.
    ///
    /// [`connect`](Self::connect) ends here after dialing; callers with their
    /// own transport (a proxy, a plain socket in tests) can use it directly.
    pub async fn attach<S>(&self, stream: WebSocketStream<S>, hooks: ConnectionHooks) -> ClientResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        *slot = Some(Arc::new(Connection::spawn(
            stream,
            &self.config.service_name,
            hooks,
            self.config.response_timeout(),
        )?));
        Ok(())
    }

    /// Close the socket and clear the connection slot.
    ///
    /// Requests still waiting for replies fail with
    /// [`ClientError::ConnectionClosed`].
    pub async fn disconnect(&self) -> ClientResult<()> {
        let connection = self
            .connection
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;

        connection.close();
        Ok(())
    }

    /// Whether a connection handle is held, open or not.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Number of requests currently waiting for a reply.
    pub async fn in_flight(&self) -> usize {
        self.connection
            .lock()
            .await
            .as_ref()
            .map_or(0, |connection| connection.in_flight())
    }

    /// Send `command` to `destination` and wait for the matching reply.
    ///
    /// Resolves with the reply's `data`. A reply whose payload says
    /// `success: false` fails with [`ClientError::Remote`] carrying its
    /// `error` text. Dropping the future stops the wait and releases the
    /// request id.
    pub async fn send_command(
        &self,
        destination: &str,
        command: &str,
        data: Payload,
    ) -> ClientResult<Payload> {
        let connection = self.current().await?;
        if !connection.is_open() {
            return Err(ClientError::ConnectionClosed);
        }

        let request = Envelope::request(&self.config.service_name, destination, command, data);
        let reply = connection.dispatch(&request)?;
        debug!(
            "Sent '{}' to {} as request {}",
            command,
            destination,
            reply.id()
        );

        let timeout = self.config.response_timeout();
        let envelope = match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(_)) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                return Err(ClientError::Timeout {
                    request_id: request.request_id,
                    after: timeout,
                })
            }
        };

        match envelope.failure() {
            Some(message) => Err(ClientError::Remote(message)),
            None => Ok(envelope.data),
        }
    }

    /// [`send_command`](Self::send_command) addressed to a well-known service.
    pub async fn call(&self, service: Service, command: &str, data: Payload) -> ClientResult<Payload> {
        self.send_command(service.destination(), command, data).await
    }

    async fn current(&self) -> ClientResult<Arc<Connection>> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)
    }
}

/// Open a WebSocket to `url`, giving up after `limit`.
async fn dial(
    url: &str,
    connector: Option<Connector>,
    limit: Duration,
) -> ClientResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let handshake = connect_async_tls_with_config(url, None, false, connector);
    match tokio::time::timeout(limit, handshake).await {
        Ok(result) => Ok(result?.0),
        Err(_) => Err(ClientError::ConnectTimeout {
            url: url.to_string(),
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dial_gives_up_on_a_silent_peer() {
        // Accepts TCP but never answers the upgrade request.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let holder = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let started = tokio::time::Instant::now();
        let err = dial(&url, None, Duration::from_millis(300)).await.unwrap_err();

        match err {
            ClientError::ConnectTimeout { url: failed, after } => {
                assert_eq!(failed, url);
                assert_eq!(after, Duration::from_millis(300));
            }
            other => panic!("expected connect timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        holder.abort();
    }

    #[tokio::test]
    async fn dial_reports_refused_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = dial(&url, None, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ClientError::WebSocket(_)));
    }
}
