// web-server/src/api/knowledge.rs
use actix_web::{delete, get, http::header, post, put, web, HttpRequest, HttpResponse};
use common::models::{
    DocumentView, EnsureCompanyRequest, KnowledgeOverview, UploadFile, UploadUrlRequest,
    VoiceSettingsUpdate,
};
use common::validation::{validate_file_size, validate_source_url, validate_upload};
use common::Config;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use super::backend_for;
use crate::error::ApiError;
use crate::identity::IdentityProvider;

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[post("/knowledge/company")]
pub async fn ensure_company(
    req: HttpRequest,
    body: Option<web::Json<EnsureCompanyRequest>>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let name = body.and_then(|b| b.into_inner().name);
    let company = backend.ensure_company(name).await?;

    tracing::info!("Company {} ready (existed: {})", company.company_id, company.existed);
    Ok(HttpResponse::Ok().json(company))
}

/// Stats, documents and voice settings, fetched concurrently. Any one
/// failing fails the whole page load.
#[get("/knowledge/{company_id}")]
pub async fn overview(
    req: HttpRequest,
    path: web::Path<String>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let company_id = path.into_inner();
    let backend = backend_for(&req, &identity, &http, &config).await?;

    let (stats, documents, voice_settings) = futures::try_join!(
        backend.company_status(&company_id),
        backend.documents(&company_id),
        backend.voice_settings(&company_id),
    )?;

    Ok(HttpResponse::Ok().json(KnowledgeOverview {
        stats,
        documents: documents.into_iter().map(DocumentView::from).collect(),
        voice_settings,
    }))
}

#[get("/knowledge/{company_id}/documents")]
pub async fn list_documents(
    req: HttpRequest,
    path: web::Path<String>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let documents: Vec<DocumentView> = backend
        .documents(&path)
        .await?
        .into_iter()
        .map(DocumentView::from)
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "documents": documents })))
}

#[get("/knowledge/{company_id}/documents/{document_id}")]
pub async fn get_document(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (company_id, document_id) = path.into_inner();
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let document = DocumentView::from(backend.document(&company_id, &document_id).await?);
    Ok(HttpResponse::Ok().json(json!({ "document": document })))
}

#[delete("/knowledge/{company_id}/documents/{document_id}")]
pub async fn delete_document(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (company_id, document_id) = path.into_inner();
    let backend = backend_for(&req, &identity, &http, &config).await?;
    backend.delete_document(&company_id, &document_id).await?;

    tracing::info!("Deleted document {} from company {}", document_id, company_id);
    Ok(HttpResponse::NoContent().finish())
}

/// Raw file body, named by `?filename=`. The session is checked first, then
/// type and size, all before any token is minted or any backend call is
/// made. The body is read in chunks and abandoned as soon as it crosses the
/// size limit.
#[post("/knowledge/{company_id}/documents")]
pub async fn upload_document(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<UploadQuery>,
    mut payload: web::Payload,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;

    let company_id = path.into_inner();
    let file_name = query.into_inner().filename;
    validate_upload(&file_name, content_length(&req).unwrap_or(0))?;

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        validate_file_size((body.len() + chunk.len()) as u64)?;
        body.extend_from_slice(&chunk);
    }

    let file = UploadFile::new(file_name, body.to_vec());
    tracing::info!("Uploading {} ({} bytes) to company {}", file.file_name, file.size(), company_id);

    let result = backend.upload_document(&company_id, file).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[post("/knowledge/{company_id}/urls")]
pub async fn upload_url(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UploadUrlRequest>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let company_id = path.into_inner();
    validate_source_url(&body.url)?;

    let backend = backend_for(&req, &identity, &http, &config).await?;
    let result = backend.upload_url(&company_id, body.url.trim()).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/knowledge/{company_id}/settings")]
pub async fn get_voice_settings(
    req: HttpRequest,
    path: web::Path<String>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let voice_settings = backend.voice_settings(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "voice_settings": voice_settings })))
}

#[put("/knowledge/{company_id}/settings")]
pub async fn update_voice_settings(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<VoiceSettingsUpdate>,
    identity: web::Data<dyn IdentityProvider>,
    http: web::Data<reqwest::Client>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let backend = backend_for(&req, &identity, &http, &config).await?;
    let voice_settings = backend.update_voice_settings(&path, &body).await?;
    Ok(HttpResponse::Ok().json(json!({ "voice_settings": voice_settings })))
}

fn content_length(req: &HttpRequest) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
