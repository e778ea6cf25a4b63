// common/src/backend.rs
use async_trait::async_trait;
use reqwest::{header, multipart, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{
    CompanyStats, Document, DocumentEnvelope, DocumentList, EnsureCompanyRequest,
    EnsureCompanyResponse, ErrorBody, TokenResponse, UploadFile, UploadUrlRequest, UsageStats,
    VoiceSettings, VoiceSettingsEnvelope, VoiceSettingsUpdate,
};

/// Something that can produce a bearer token for the current user
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AppError>;
}

/// Fetches tokens from the site's `GET /api/token` route
pub struct HttpTokenSource {
    http: Client,
    token_url: String,
    session_cookie: Option<String>,
}

impl HttpTokenSource {
    /// `session_cookie` is sent verbatim as the `Cookie` header
    pub fn new(http: Client, site_url: &str, session_cookie: Option<String>) -> Self {
        Self {
            http,
            token_url: format!("{}/api/token", site_url.trim_end_matches('/')),
            session_cookie,
        }
    }

    pub async fn fetch(&self) -> Result<TokenResponse, AppError> {
        let mut request = self.http.get(&self.token_url);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.json::<TokenResponse>().await?),
            reqwest::StatusCode::UNAUTHORIZED => Err(AppError::Unauthenticated),
            status => {
                tracing::warn!("Token endpoint answered {}", status);
                Err(AppError::TokenUnavailable)
            }
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn bearer_token(&self) -> Result<String, AppError> {
        Ok(self.fetch().await?.token)
    }
}

/// Client for the external RAG backend.
///
/// Every call asks the token source for a fresh token and makes exactly one
/// round trip. Non-2xx answers become `BackendRequestFailed` carrying the
/// backend's `error` field, or the per-call fallback message.
pub struct BackendClient<S> {
    http: Client,
    base_url: String,
    tokens: S,
}

impl<S: TokenSource> BackendClient<S> {
    pub fn new(http: Client, base_url: &str, tokens: S) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create the caller's company unless it already exists
    pub async fn ensure_company(&self, name: Option<String>) -> Result<EnsureCompanyResponse, AppError> {
        let body = EnsureCompanyRequest { name };
        let response = self
            .send_json(Method::POST, "/company/ensure", &body, "Failed to ensure company")
            .await?;
        Ok(response.json().await?)
    }

    pub async fn company_status(&self, company_id: &str) -> Result<CompanyStats, AppError> {
        self.get_json(&format!("/company/{}/status", company_id), "Failed to fetch company status")
            .await
    }

    pub async fn documents(&self, company_id: &str) -> Result<Vec<Document>, AppError> {
        let list: DocumentList = self
            .get_json(&format!("/company/{}/documents", company_id), "Failed to fetch documents")
            .await?;
        Ok(list.documents)
    }

    pub async fn document(&self, company_id: &str, document_id: &str) -> Result<Document, AppError> {
        let envelope: DocumentEnvelope = self
            .get_json(
                &format!("/company/{}/documents/{}", company_id, document_id),
                "Failed to fetch document",
            )
            .await?;
        Ok(envelope.document)
    }

    /// Multipart upload under the `file` field. No validation happens here.
    pub async fn upload_document(&self, company_id: &str, file: UploadFile) -> Result<Value, AppError> {
        let mime = mime_guess::from_path(&file.file_name).first_or_octet_stream();
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(mime.as_ref())?;
        let form = multipart::Form::new().part("file", part);

        let request = self
            .request(Method::POST, &format!("/company/{}/upload", company_id))
            .await?
            .multipart(form);
        let response = check(request.send().await?, "Failed to upload document").await?;
        Ok(response.json().await?)
    }

    pub async fn upload_url(&self, company_id: &str, url: &str) -> Result<Value, AppError> {
        let body = UploadUrlRequest { url: url.to_string() };
        let response = self
            .send_json(
                Method::POST,
                &format!("/company/{}/upload-url", company_id),
                &body,
                "Failed to upload URL",
            )
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete_document(&self, company_id: &str, document_id: &str) -> Result<(), AppError> {
        let request = self
            .request(
                Method::DELETE,
                &format!("/company/{}/documents/{}", company_id, document_id),
            )
            .await?;
        check(request.send().await?, "Failed to delete document").await?;
        Ok(())
    }

    pub async fn voice_settings(&self, company_id: &str) -> Result<Option<VoiceSettings>, AppError> {
        let envelope: VoiceSettingsEnvelope = self
            .get_json(&format!("/company/{}/settings", company_id), "Failed to fetch voice settings")
            .await?;
        Ok(envelope.voice_settings)
    }

    pub async fn update_voice_settings(
        &self,
        company_id: &str,
        update: &VoiceSettingsUpdate,
    ) -> Result<Option<VoiceSettings>, AppError> {
        let response = self
            .send_json(
                Method::PUT,
                &format!("/company/{}/settings", company_id),
                update,
                "Failed to update voice settings",
            )
            .await?;
        let envelope: VoiceSettingsEnvelope = response.json().await?;
        Ok(envelope.voice_settings)
    }

    pub async fn usage(&self) -> Result<UsageStats, AppError> {
        self.get_json("/usage", "Failed to fetch usage").await
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T, AppError> {
        let request = self.request(Method::GET, path).await?;
        let response = check(request.send().await?, fallback).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Response, AppError> {
        // `.json()` sets Content-Type: application/json
        let request = self.request(method, path).await?.json(body);
        check(request.send().await?, fallback).await
    }
}

/// Pass 2xx through, turn anything else into `BackendRequestFailed`
async fn check(response: Response, fallback: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    tracing::warn!("Backend answered {}: {}", status, message);
    Err(AppError::backend(Some(status.as_u16()), message))
}
