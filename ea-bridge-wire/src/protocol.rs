//! Envelope types exchanged with the trading agent.
//!
//! Requests flow bridge → agent, responses flow agent → bridge. The agent
//! treats `id` as opaque and echoes it back unmodified; the bridge matches
//! responses to callers by `id` alone, never by arrival order.

use serde::{Deserialize, Serialize};

/// Command parameters carried by a request.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Correlation token for one in-flight request.
///
/// Generated as UUID v4 text, but any string the agent echoes back is
/// accepted so a foreign id never breaks decoding of the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Command sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRequest {
    pub id: RequestId,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl PeerRequest {
    /// Build a request. Empty params are dropped so they never reach the wire.
    pub fn new(id: RequestId, command: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            id,
            command: command.into(),
            params: params.filter(|p| !p.is_empty()),
        }
    }
}

/// Reply from the agent.
///
/// `id` is optional so that unsolicited frames decode cleanly and can be
/// logged and ignored instead of tearing down the connection. A non-string
/// id decodes as `None` for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerResponse {
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<RequestId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) => Some(RequestId(id)),
        _ => None,
    })
}

impl PeerResponse {
    pub fn success(id: RequestId, data: serde_json::Value) -> Self {
        Self {
            id: Some(id),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: RequestId, error: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            data: None,
            error: Some(error.into()),
        }
    }

    /// Split into the agent's payload or its reported error.
    ///
    /// An empty error string counts as success. Missing data becomes JSON null.
    pub fn into_outcome(self) -> Result<serde_json::Value, String> {
        match self.error {
            Some(error) if !error.is_empty() => Err(error),
            _ => Ok(self.data.unwrap_or(serde_json::Value::Null)),
        }
    }
}
