// common/src/handoff.rs
//! Token handoff between the page and the browser extension.
//!
//! Both sides talk over a [`WindowBus`], the server-side stand-in for a
//! browser window's `postMessage` channel. Every listener sees every message
//! and must filter on the sender's origin itself. Requests carry a fresh
//! `request_id` and only a response echoing it settles the handoff.
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::error::{AppError, HandoffFailure, DEFAULT_HANDOFF_FAILURE};
use crate::messages::{ExtensionRequest, ExtensionResponse, WindowMessage, EXTENSION_RESPONSE_TYPE};

const BUS_CAPACITY: usize = 64;

/// Same-origin message bus shared by a page and the extension
pub struct WindowBus {
    origin: String,
    sender: broadcast::Sender<WindowMessage>,
}

impl WindowBus {
    pub fn new(origin: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            origin: origin.into(),
            sender,
        }
    }

    /// Origin of the window this bus belongs to
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowMessage> {
        self.sender.subscribe()
    }

    /// Register a listener; it is removed when dropped
    pub fn listen(&self) -> Listener {
        Listener {
            receiver: self.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Deliver `data` from `sender_origin` to every listener.
    ///
    /// Like `window.postMessage`, nothing is delivered unless
    /// `target_origin` is this window's origin. Returns the number of
    /// listeners reached.
    pub fn post(&self, sender_origin: &str, data: Value, target_origin: &str) -> Result<usize, AppError> {
        if target_origin != self.origin {
            return Err(AppError::Protocol(format!(
                "refusing to deliver to {} from a window on {}",
                target_origin, self.origin
            )));
        }

        let message = WindowMessage {
            origin: sender_origin.to_string(),
            data,
        };

        // No listeners is not an error, the message just goes nowhere
        Ok(self.sender.send(message).unwrap_or(0))
    }
}

/// A registered bus listener
pub struct Listener {
    receiver: broadcast::Receiver<WindowMessage>,
}

impl Listener {
    /// Next message, or `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<WindowMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Window listener lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        tracing::trace!("Window listener released");
    }
}

/// Hand `token` to the extension listening on `bus` and wait for it to
/// confirm storage.
///
/// The listener is registered and the timer armed before the request is
/// posted. Both are released exactly once when this returns, on every path.
pub async fn hand_off(
    bus: &WindowBus,
    page_origin: &str,
    token: &str,
    timeout: Duration,
) -> Result<(), AppError> {
    let mut listener = bus.listen();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let request = ExtensionRequest::store_token(token);
    let request_id = request.request_id;

    bus.post(page_origin, serde_json::to_value(&request)?, page_origin)?;
    tracing::info!("Token handoff {} posted, waiting up to {:?}", request_id, timeout);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                tracing::warn!("Token handoff {} timed out", request_id);
                return Err(HandoffFailure::TimedOut.into());
            }
            message = listener.recv() => {
                let Some(message) = message else {
                    // Bus torn down, nobody is left to answer
                    (&mut deadline).await;
                    return Err(HandoffFailure::TimedOut.into());
                };

                if let Some(response) = match_response(&message, page_origin, request_id) {
                    return settle(request_id, response);
                }
            }
        }
    }
}

/// The response to `request_id`, if `message` is one
fn match_response(message: &WindowMessage, page_origin: &str, request_id: Uuid) -> Option<ExtensionResponse> {
    if message.origin != page_origin {
        return None;
    }
    if message.kind() != Some(EXTENSION_RESPONSE_TYPE) {
        return None;
    }

    match serde_json::from_value::<ExtensionResponse>(message.data.clone()) {
        Ok(response) if response.request_id == request_id => Some(response),
        Ok(response) => {
            tracing::debug!("Ignoring extension response for request {}", response.request_id);
            None
        }
        Err(e) => {
            tracing::debug!("Ignoring malformed extension response: {}", e);
            None
        }
    }
}

fn settle(request_id: Uuid, response: ExtensionResponse) -> Result<(), AppError> {
    if response.success {
        tracing::info!("Extension stored token for handoff {}", request_id);
        return Ok(());
    }

    let reason = response
        .error
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_HANDOFF_FAILURE.to_string());
    tracing::warn!("Extension rejected handoff {}: {}", request_id, reason);
    Err(HandoffFailure::Rejected(reason).into())
}
