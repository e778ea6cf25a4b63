// common/src/messages.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Type tag of messages the page sends to the extension
pub const EXTENSION_REQUEST_TYPE: &str = "REPLIER_EXTENSION";
/// Type tag of messages the extension sends back
pub const EXTENSION_RESPONSE_TYPE: &str = "REPLIER_EXTENSION_RESPONSE";
pub const STORE_TOKEN_ACTION: &str = "STORE_TOKEN";

/// Page -> extension: store this bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub token: String,
    pub request_id: Uuid,
}

impl ExtensionRequest {
    pub fn store_token(token: impl Into<String>) -> Self {
        Self {
            kind: EXTENSION_REQUEST_TYPE.to_string(),
            action: STORE_TOKEN_ACTION.to_string(),
            token: token.into(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Extension -> page: outcome of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: Uuid,
}

impl ExtensionResponse {
    pub fn ok(request_id: Uuid) -> Self {
        Self {
            kind: EXTENSION_RESPONSE_TYPE.to_string(),
            success: true,
            error: None,
            request_id,
        }
    }

    pub fn failed(request_id: Uuid, error: Option<String>) -> Self {
        Self {
            kind: EXTENSION_RESPONSE_TYPE.to_string(),
            success: false,
            error,
            request_id,
        }
    }
}

/// A message as observed by a listener on the window bus.
///
/// `origin` is the origin of the sender, like `MessageEvent.origin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    pub origin: String,
    pub data: Value,
}

impl WindowMessage {
    /// The `type` tag of the payload, if it carries one
    pub fn kind(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}
