// web-server/src/api/dashboard.rs
use std::sync::Arc;

use actix_web::{get, http::header, put, web, HttpRequest, HttpResponse};
use common::dashboard::{Tone, UsagePoller};
use common::models::{UsageStats, UsageSummary};
use common::Config;
use dashmap::DashMap;
use futures::stream;
use serde::{Deserialize, Serialize};

use super::backend_for;
use crate::error::ApiError;
use crate::identity::{authenticate, IdentityProvider};

/// Reply tone picked on the dashboard, per user. Held in memory only and
/// never forwarded to the backend.
#[derive(Default)]
pub struct TonePreferences {
    tones: DashMap<String, Tone>,
}

impl TonePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Tone {
        self.tones.get(user_id).map(|t| *t).unwrap_or_default()
    }

    pub fn set(&self, user_id: &str, tone: Tone) {
        self.tones.insert(user_id.to_string(), tone);
    }
}

#[derive(Serialize, Deserialize)]
pub struct ToneBody {
    pub tone: String,
}

#[derive(Serialize)]
struct ToneResponse {
    tone: Tone,
}

#[get("/dashboard/usage")]
pub async fn usage(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let stats = backend.usage().await?;
    Ok(HttpResponse::Ok().json(UsageSummary::from(stats)))
}

/// Server-sent events carrying a usage summary each time the poller
/// publishes one. The poller lives as long as the response stream, so it
/// stops when the page goes away.
#[get("/dashboard/usage/stream")]
pub async fn usage_stream(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let poller = UsagePoller::spawn(Arc::new(backend), config.dashboard.usage_poll_interval());

    let events = stream::unfold(poller, |mut poller| async move {
        let stats = poller.next_snapshot().await?;
        Some((usage_event(stats), poller))
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type("text/event-stream")
        .streaming(events))
}

fn usage_event(stats: UsageStats) -> Result<web::Bytes, serde_json::Error> {
    let json = serde_json::to_string(&UsageSummary::from(stats))?;
    Ok(web::Bytes::from(format!("data: {}\n\n", json)))
}

#[get("/dashboard/tone")]
pub async fn get_tone(
    req: HttpRequest,
    identity: web::Data<dyn IdentityProvider>,
    tones: web::Data<TonePreferences>,
) -> Result<HttpResponse, ApiError> {
    let session = authenticate(&req, identity.get_ref()).await?;
    Ok(HttpResponse::Ok().json(ToneResponse {
        tone: tones.get(&session.user_id),
    }))
}

#[put("/dashboard/tone")]
pub async fn set_tone(
    req: HttpRequest,
    body: web::Json<ToneBody>,
    identity: web::Data<dyn IdentityProvider>,
    tones: web::Data<TonePreferences>,
) -> Result<HttpResponse, ApiError> {
    let session = authenticate(&req, identity.get_ref()).await?;
    let tone: Tone = body.tone.parse()?;
    tones.set(&session.user_id, tone);
    Ok(HttpResponse::Ok().json(ToneResponse { tone }))
}
