// web-server/src/extension/session.rs
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use common::handoff::WindowBus;
use common::{WindowMessage, EXTENSION_REQUEST_TYPE, EXTENSION_RESPONSE_TYPE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::hub::ExtensionHub;

/// Actor bridging one extension content script onto its user's window bus.
///
/// Requests posted on the bus from the connection's own origin go out as
/// JSON text frames; response frames coming back are posted on the bus with
/// the connection's origin as sender.
pub struct ExtensionSession {
    connection_id: Uuid,
    user_id: String,
    origin: String,
    bus: Arc<WindowBus>,
    hub: Arc<ExtensionHub>,
    last_heartbeat: Instant,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
}

impl ExtensionSession {
    pub fn new(
        user_id: String,
        origin: String,
        hub: Arc<ExtensionHub>,
        heartbeat_interval: Duration,
        heartbeat_timeout: Duration,
    ) -> Self {
        let bus = hub.bus_for(&user_id);
        Self {
            connection_id: Uuid::new_v4(),
            user_id,
            origin,
            bus,
            hub,
            last_heartbeat: Instant::now(),
            heartbeat_interval,
            heartbeat_timeout,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.heartbeat_timeout {
                tracing::warn!("Extension heartbeat timeout: {}", act.connection_id);
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    /// Forward a bus message to the extension if it is addressed to it
    fn deliver(&self, message: WindowMessage, ctx: &mut ws::WebsocketContext<Self>) {
        if message.origin != self.origin || message.kind() != Some(EXTENSION_REQUEST_TYPE) {
            return;
        }

        match serde_json::to_string(&message.data) {
            Ok(json) => ctx.text(json),
            Err(e) => tracing::error!("Failed to serialize extension request: {}", e),
        }
    }

    /// Post an extension frame back onto the bus
    fn relay(&self, text: &str) {
        let data: serde_json::Value = match serde_json::from_str(text) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Dropping malformed frame from extension {}: {}", self.connection_id, e);
                return;
            }
        };

        if data.get("type").and_then(|t| t.as_str()) != Some(EXTENSION_RESPONSE_TYPE) {
            tracing::debug!("Ignoring untyped frame from extension {}", self.connection_id);
            return;
        }

        if let Err(e) = self.bus.post(&self.origin, data, self.bus.origin()) {
            tracing::warn!("Failed to relay extension response: {}", e);
        }
    }
}

impl Actor for ExtensionSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "Extension connected: {} (user {}, origin {})",
            self.connection_id, self.user_id, self.origin
        );

        self.last_heartbeat = Instant::now();
        self.heartbeat(ctx);

        ctx.add_stream(BroadcastStream::new(self.bus.subscribe()));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Extension disconnected: {}", self.connection_id);
        // Runs once this actor and its bus subscription are gone
        let hub = self.hub.clone();
        actix::spawn(async move {
            hub.prune();
        });
    }
}

impl StreamHandler<Result<WindowMessage, BroadcastStreamRecvError>> for ExtensionSession {
    fn handle(&mut self, msg: Result<WindowMessage, BroadcastStreamRecvError>, ctx: &mut Self::Context) {
        match msg {
            Ok(message) => self.deliver(message, ctx),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("Extension {} lagged, skipped {} bus messages", self.connection_id, skipped);
            }
        }
    }

    // The bus outlives the session, but if it ever closes the session has
    // nothing left to bridge.
    fn finished(&mut self, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ExtensionSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            },
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            },
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.relay(&text);
            },
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("Extension closing connection: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            },
            Ok(_) => (),
            Err(e) => {
                tracing::error!("Extension WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}
