// web-server/src/api/mod.rs
pub mod billing;
pub mod dashboard;
pub mod extension;
pub mod knowledge;
pub mod token;

use actix_web::{web, HttpRequest};
use async_trait::async_trait;
use common::backend::{BackendClient, TokenSource};
use common::models::Session;
use common::{AppError, Config};
use std::sync::Arc;

use crate::error::ApiError;
use crate::identity::{authenticate, IdentityProvider};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(token::get_token)
            .service(billing::billing_portal)
            .service(dashboard::usage)
            .service(dashboard::usage_stream)
            .service(dashboard::get_tone)
            .service(dashboard::set_tone)
            .service(extension::connect)
            .service(knowledge::ensure_company)
            .service(knowledge::overview)
            .service(knowledge::list_documents)
            .service(knowledge::get_document)
            .service(knowledge::delete_document)
            .service(knowledge::upload_document)
            .service(knowledge::upload_url)
            .service(knowledge::get_voice_settings)
            .service(knowledge::update_voice_settings)
    );
}

/// Mints a fresh bearer token for an already verified session on every
/// call, the same way `GET /api/token` does
pub struct SessionTokenSource {
    identity: Arc<dyn IdentityProvider>,
    session: Session,
}

impl SessionTokenSource {
    pub fn new(identity: Arc<dyn IdentityProvider>, session: Session) -> Self {
        Self { identity, session }
    }
}

#[async_trait]
impl TokenSource for SessionTokenSource {
    async fn bearer_token(&self) -> Result<String, AppError> {
        self.identity
            .issue_token(&self.session)
            .await?
            .ok_or(AppError::TokenUnavailable)
    }
}

/// Backend client acting as the user behind `req`. Only the session is
/// checked here; tokens are minted lazily, per backend call.
pub(crate) async fn backend_for(
    req: &HttpRequest,
    identity: &web::Data<dyn IdentityProvider>,
    http: &web::Data<reqwest::Client>,
    config: &web::Data<Config>,
) -> Result<BackendClient<SessionTokenSource>, ApiError> {
    let session = authenticate(req, identity.get_ref()).await?;
    let tokens = SessionTokenSource::new(identity.clone().into_inner(), session);
    Ok(BackendClient::new(http.get_ref().clone(), &config.backend_url, tokens))
}
