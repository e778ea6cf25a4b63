// web-server/src/api/billing.rs
use actix_web::{get, http::header, web, HttpRequest, HttpResponse};
use common::{AppError, Config};
use url::form_urlencoded;

use crate::error::ApiError;
use crate::identity::{authenticate, IdentityProvider};

const SIGN_IN_PATH: &str = "/sign-in";
const RETURN_PATH: &str = "/dashboard";

/// Billing lives with the identity provider's account pages, so this only
/// redirects there (or to sign-in).
#[get("/billing-portal")]
pub async fn billing_portal(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let location = match authenticate(&req, identity.get_ref()).await {
        Ok(_) => {
            let return_to: String = form_urlencoded::byte_serialize(RETURN_PATH.as_bytes()).collect();
            format!("{}?redirect_url={}", config.sign_in_url, return_to)
        }
        Err(AppError::Unauthenticated) => SIGN_IN_PATH.to_string(),
        Err(e) => return Err(e.into()),
    };

    Ok(HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, location))
        .finish())
}
