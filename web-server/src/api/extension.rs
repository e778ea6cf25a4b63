// web-server/src/api/extension.rs
use actix_web::{post, web, HttpRequest, HttpResponse};
use common::backend::TokenSource;
use common::handoff::hand_off;
use common::Config;
use serde_json::json;

use super::SessionTokenSource;
use crate::error::ApiError;
use crate::extension::ExtensionHub;
use crate::identity::{authenticate, IdentityProvider};

/// "Connect extension": hand a fresh token to the user's extension and
/// wait for it to confirm.
#[post("/extension/connect")]
pub async fn connect(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
    config: web::Data<Config>,
    hub: web::Data<ExtensionHub>,
) -> Result<HttpResponse, ApiError> {
    let session = authenticate(&req, identity.get_ref()).await?;
    let user_id = session.user_id.clone();

    let token = SessionTokenSource::new(identity.clone().into_inner(), session)
        .bearer_token()
        .await?;

    let bus = hub.bus_for(&user_id);
    let outcome = hand_off(&bus, hub.origin(), &token, config.extension.handoff_timeout()).await;
    drop(bus);
    hub.prune();

    outcome?;
    tracing::info!("Token handed to extension for user {}", user_id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Token sent to extension! You can now use the extension."
    })))
}
