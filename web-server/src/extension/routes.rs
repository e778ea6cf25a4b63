// web-server/src/extension/routes.rs
use std::time::Duration;

use actix_web::{http::header, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use common::models::ErrorBody;
use common::{AppError, Config};

use super::{ExtensionHub, ExtensionSession};
use crate::error::ApiError;
use crate::identity::{authenticate, IdentityProvider};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/extension").route(web::get().to(extension_ws)));
}

/// Upgrade an extension content script onto the signed-in user's bus.
/// Only connections made from the site's own origin are bridged.
pub async fn extension_ws(
    req: HttpRequest,
    stream: web::Payload,
    identity: web::Data<dyn IdentityProvider>,
    config: web::Data<Config>,
    hub: web::Data<ExtensionHub>,
) -> Result<HttpResponse, Error> {
    let session = authenticate(&req, identity.get_ref())
        .await
        .map_err(ApiError::from)?;

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(AppError::validation("Missing Origin header")))?
        .to_string();

    if origin != hub.origin() {
        tracing::warn!("Refusing extension connection from origin {}", origin);
        return Ok(HttpResponse::Forbidden().json(ErrorBody {
            error: "Origin not allowed".to_string(),
        }));
    }

    let actor = ExtensionSession::new(
        session.user_id,
        origin,
        hub.into_inner(),
        Duration::from_secs(config.extension.heartbeat_interval_secs),
        Duration::from_secs(config.extension.heartbeat_timeout_secs),
    );

    ws::start(actor, &req, stream)
}
