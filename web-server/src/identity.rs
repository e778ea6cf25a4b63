// web-server/src/identity.rs
use actix_web::HttpRequest;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::models::Session;
use common::{generate_jwt_token, validate_jwt_token, AppError, IdentityConfig};

/// What the site needs from the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session credential into an active session, if any
    async fn verify_session(&self, credential: &str) -> Result<Option<Session>, AppError>;

    /// Issue a bearer token for the backend. `None` means the provider had
    /// no token to give for this session.
    async fn issue_token(&self, session: &Session) -> Result<Option<String>, AppError>;

    /// Name of the cookie carrying the session credential
    fn session_cookie(&self) -> &str;
}

/// Provider whose sessions are HS256 JWTs in a cookie, handing out
/// short-lived HS256 bearer tokens the backend verifies with a shared secret.
pub struct JwtIdentityProvider {
    session_cookie: String,
    session_secret: Vec<u8>,
    token_secret: Vec<u8>,
    token_ttl_secs: u64,
}

impl JwtIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            session_cookie: config.session_cookie.clone(),
            session_secret: config.session_secret.as_bytes().to_vec(),
            token_secret: config.token_secret.as_bytes().to_vec(),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Sign a session credential the way the provider's sign-in flow does
    pub fn sign_session(&self, user_id: &str, session_id: &str, ttl_secs: u64) -> Result<String, AppError> {
        Ok(generate_jwt_token(user_id, session_id, ttl_secs, &self.session_secret)?)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify_session(&self, credential: &str) -> Result<Option<Session>, AppError> {
        match validate_jwt_token(credential, &self.session_secret) {
            Ok(claims) => {
                let expires_at = Utc
                    .timestamp_opt(claims.exp as i64, 0)
                    .single()
                    .ok_or_else(|| AppError::Internal("session expiry out of range".into()))?;
                Ok(Some(Session {
                    user_id: claims.sub,
                    session_id: claims.sid,
                    expires_at,
                }))
            }
            Err(e) => {
                tracing::debug!("Rejected session credential: {}", e);
                Ok(None)
            }
        }
    }

    async fn issue_token(&self, session: &Session) -> Result<Option<String>, AppError> {
        if session.is_expired() {
            return Ok(None);
        }
        let token = generate_jwt_token(
            &session.user_id,
            &session.session_id,
            self.token_ttl_secs,
            &self.token_secret,
        )?;
        Ok(Some(token))
    }

    fn session_cookie(&self) -> &str {
        &self.session_cookie
    }
}

/// Verify the session cookie on `req`
pub async fn authenticate(req: &HttpRequest, identity: &dyn IdentityProvider) -> Result<Session, AppError> {
    let cookie = req
        .cookie(identity.session_cookie())
        .ok_or(AppError::Unauthenticated)?;

    identity
        .verify_session(cookie.value())
        .await?
        .ok_or(AppError::Unauthenticated)
}
