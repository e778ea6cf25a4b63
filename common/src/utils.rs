// common/src/utils.rs
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use jsonwebtoken::{encode, decode, Header, Algorithm, Validation, EncodingKey, DecodingKey};
use serde::{Serialize, Deserialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Setup tracing for consistent logging across services.
///
/// Defaults to INFO; `RUST_LOG` overrides.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

// JWT Claims structure, shared by session cookies and bearer tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,       // user id
    pub sid: String,       // session id
    pub exp: usize,        // expiration time
    pub iat: usize,        // issued at time
}

pub fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

/// Sign an HS256 token for `user_id` valid for `ttl_secs`
pub fn generate_jwt_token(
    user_id: &str,
    session_id: &str,
    ttl_secs: u64,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = unix_now();

    let claims = JwtClaims {
        sub: user_id.to_string(),
        sid: session_id.to_string(),
        iat: now,
        exp: now + ttl_secs as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret)
    )
}

/// Validate an HS256 token and return its claims
pub fn validate_jwt_token(token: &str, secret: &[u8]) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation
    )?;

    if token_data.claims.sub.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    Ok(token_data.claims)
}
