use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity this client registers under unless configured otherwise.
pub const DEFAULT_SERVICE_NAME: &str = "chia_repl";

/// Destination name of the daemon process itself.
pub const DAEMON_DESTINATION: &str = "daemon";

/// Command used for the registration handshake and its acknowledgement.
pub const REGISTER_SERVICE: &str = "register_service";

/// Arbitrary command payload. Replies embed `success` and optionally `error`.
pub type Payload = Map<String, Value>;

const REQUEST_ID_BYTES: usize = 32;

/// Correlation identifier carried in every envelope.
///
/// Generated ids are 32 bytes from the thread-local CSPRNG, hex encoded to 64
/// lowercase characters. Inbound envelopes without an id deserialize to the
/// empty id, which is never registered as pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        let bytes: [u8; REQUEST_ID_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The unit of exchange on the daemon socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub ack: bool,
    #[serde(default)]
    pub request_id: RequestId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Payload,
}

impl Envelope {
    /// Build an outbound request with a freshly generated request id.
    pub fn request(
        origin: impl Into<String>,
        destination: impl Into<String>,
        command: impl Into<String>,
        data: Payload,
    ) -> Self {
        Self {
            command: command.into(),
            origin: origin.into(),
            destination: destination.into(),
            ack: false,
            request_id: RequestId::generate(),
            data,
        }
    }

    /// Registration handshake announcing `service` to the daemon.
    pub fn registration(service: &str) -> Self {
        let mut data = Payload::new();
        data.insert("service".to_string(), Value::String(service.to_string()));
        Self::request(service, DAEMON_DESTINATION, REGISTER_SERVICE, data)
    }

    pub fn is_registration(&self) -> bool {
        self.command == REGISTER_SERVICE
    }

    /// Error message of a reply whose payload reports `success: false`.
    ///
    /// Only an explicit boolean `false` counts. The message is the `error`
    /// field verbatim when it is a string, its JSON text for other values and
    /// empty when absent.
    pub fn failure(&self) -> Option<String> {
        if self.data.get("success") != Some(&Value::Bool(false)) {
            return None;
        }

        let message = match self.data.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Some(message)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}
