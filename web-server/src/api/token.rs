// web-server/src/api/token.rs
use actix_web::{get, web, HttpRequest, HttpResponse};
use chrono::Utc;
use common::models::TokenResponse;
use common::AppError;

use crate::error::ApiError;
use crate::identity::{authenticate, IdentityProvider};

/// Current user's bearer token, for the page and the extension.
///
/// A new token is minted on every call; nothing is cached here.
#[get("/token")]
pub async fn get_token(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
) -> Result<HttpResponse, ApiError> {
    let session = authenticate(&req, identity.get_ref()).await?;

    let token = match identity.issue_token(&session).await? {
        Some(token) => token,
        None => {
            tracing::warn!("Identity provider returned no token for user {}", session.user_id);
            return Err(AppError::TokenUnavailable.into());
        }
    };

    tracing::debug!("Issued token for user {}", session.user_id);
    Ok(HttpResponse::Ok().json(TokenResponse::issued_at(token, session.user_id, Utc::now())))
}
