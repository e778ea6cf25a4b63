// common/src/models/session.rs
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Validity advertised to clients alongside a fresh token. Informational
/// only; the token's own expiry may be shorter.
pub const ADVERTISED_TOKEN_LIFETIME_HOURS: i64 = 24;

/// A verified identity-provider session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Body of `GET /api/token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
}

impl TokenResponse {
    pub fn issued_at(token: String, user_id: String, now: DateTime<Utc>) -> Self {
        let expires_at = now + Duration::hours(ADVERTISED_TOKEN_LIFETIME_HOURS);
        Self {
            token,
            user_id,
            expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Error body used by every JSON route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
