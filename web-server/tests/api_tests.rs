// web-server/tests/api_tests.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::ServerHandle;
use actix_web::http::{header, StatusCode};
use actix_web::{get, post, test, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::{DateTime, Duration, Utc};
use common::validation::{FILE_TOO_LARGE, INVALID_FILE_TYPE, INVALID_URL, MISSING_URL};
use common::{
    validate_jwt_token, Config, ExtensionRequest, ExtensionResponse, DEFAULT_HANDOFF_FAILURE,
    EXTENSION_REQUEST_TYPE, HANDOFF_TIMEOUT_MESSAGE, STORE_TOKEN_ACTION,
};
use futures::{future, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header as ws_header, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use web_server::api::dashboard::TonePreferences;
use web_server::extension::ExtensionHub;
use web_server::identity::{IdentityProvider, JwtIdentityProvider};

const USER: &str = "user_1";

struct TestState {
    config: web::Data<Config>,
    identity: web::Data<dyn IdentityProvider>,
    hub: Arc<ExtensionHub>,
    http: web::Data<reqwest::Client>,
    tones: web::Data<TonePreferences>,
    provider: Arc<JwtIdentityProvider>,
}

impl TestState {
    fn new(config: Config) -> Self {
        let provider = Arc::new(JwtIdentityProvider::new(&config.identity));
        let identity: Arc<dyn IdentityProvider> = provider.clone();
        Self {
            hub: Arc::new(ExtensionHub::new(config.site_origin.clone())),
            config: web::Data::new(config),
            identity: web::Data::from(identity),
            http: web::Data::new(reqwest::Client::new()),
            tones: web::Data::new(TonePreferences::new()),
            provider,
        }
    }

    fn session_cookie(&self) -> Cookie<'static> {
        let credential = self.provider.sign_session(USER, "sess_1", 3600).unwrap();
        Cookie::new(self.config.identity.session_cookie.clone(), credential)
    }

    /// The same session as a raw `Cookie` header value
    fn cookie_header(&self) -> String {
        self.session_cookie().to_string()
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.config.clone())
                .app_data($state.identity.clone())
                .app_data(web::Data::from($state.hub.clone()))
                .app_data($state.http.clone())
                .app_data($state.tones.clone())
                .configure(web_server::configure),
        )
        .await
    };
}

/// Nothing listens here, so a test that reaches the backend fails loudly
fn offline_config() -> Config {
    Config {
        backend_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    }
}

// Mock backend

struct Calls(AtomicUsize);

fn bearer_user(req: &HttpRequest) -> Option<String> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .to_string();
    let secret = Config::default().identity.token_secret;
    validate_jwt_token(&token, secret.as_bytes()).ok().map(|c| c.sub)
}

#[get("/usage")]
async fn usage_route(req: HttpRequest, calls: web::Data<Calls>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    match bearer_user(&req) {
        Some(user) if user == USER => HttpResponse::Ok().json(json!({
            "usage_count": 120,
            "daily_used": 4,
            "daily_goal": 20,
            "daily_remaining": 16,
            "weekly_used": 30,
            "weekly_goal": 100,
            "weekly_remaining": 70
        })),
        _ => HttpResponse::Unauthorized().json(json!({"error": "Invalid token"})),
    }
}

#[get("/company/{id}/status")]
async fn company_status_route(path: web::Path<String>, calls: web::Data<Calls>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    if path.as_str() == "co_missing" {
        return HttpResponse::NotFound().json(json!({"error": "Company not found"}));
    }
    HttpResponse::Ok().json(json!({
        "total_documents": 1,
        "total_chunks": 12,
        "total_tokens": 3400,
        "total_storage_bytes": 2048,
        "last_updated": null
    }))
}

#[get("/company/{id}/documents")]
async fn documents_route(calls: web::Data<Calls>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().json(json!({"documents": [{
        "id": "doc_1",
        "company_id": "co_1",
        "filename": "handbook.pdf",
        "file_type": "pdf",
        "file_size": 2048,
        "source_url": null,
        "status": "completed",
        "error_message": null,
        "total_chunks": 12,
        "total_tokens": 3400,
        "metadata": {},
        "created_at": "2026-10-19T10:00:00",
        "updated_at": "2026-10-19T10:05:00"
    }]}))
}

#[get("/company/{id}/settings")]
async fn settings_route(calls: web::Data<Calls>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().json(json!({"voice_settings": null}))
}

#[post("/company/{id}/upload")]
async fn upload_route(body: web::Bytes, calls: web::Data<Calls>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    let text = String::from_utf8_lossy(&body);
    if !text.contains("filename=\"notes.md\"") {
        return HttpResponse::BadRequest().json(json!({"error": "no file part"}));
    }
    HttpResponse::Ok().json(json!({"document_id": "doc_9", "status": "pending"}))
}

async fn start_backend() -> (String, ServerHandle, web::Data<Calls>) {
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));
    let server_calls = calls.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_calls.clone())
            .service(usage_route)
            .service(company_status_route)
            .service(documents_route)
            .service(settings_route)
            .service(upload_route)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind mock backend");

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    (format!("http://{}", addr), handle, calls)
}

fn backend_config(url: &str) -> Config {
    Config {
        backend_url: url.to_string(),
        ..Config::default()
    }
}

// Token route

#[actix_web::test]
async fn test_token_requires_session() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/token").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Unauthorized"}));
}

#[actix_web::test]
async fn test_token_for_signed_in_user() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/token")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["userId"], USER);

    let expires_at: DateTime<Utc> = body["expiresAt"].as_str().unwrap().parse().unwrap();
    let advertised = expires_at - Utc::now();
    assert!(advertised > Duration::hours(24) - Duration::minutes(1));
    assert!(advertised <= Duration::hours(24));

    let token = body["token"].as_str().unwrap();
    let claims = validate_jwt_token(token, state.config.identity.token_secret.as_bytes()).unwrap();
    assert_eq!(claims.sub, USER);
}

#[actix_web::test]
async fn test_forged_session_is_unauthorized() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/token")
        .cookie(Cookie::new("__session", "not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// Billing

#[actix_web::test]
async fn test_billing_portal_redirects() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/billing-portal").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/sign-in");

    let req = test::TestRequest::get()
        .uri("/api/billing-portal")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/sign-in?redirect_url=%2Fdashboard"
    );
}

// Knowledge base

#[actix_web::test]
async fn test_upload_rejects_file_type_before_network() {
    let (url, handle, calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/knowledge/co_1/documents?filename=image.png")
        .cookie(state.session_cookie())
        .set_payload("not really a png")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], INVALID_FILE_TYPE);
    assert_eq!(calls.0.load(Ordering::SeqCst), 0);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_upload_requires_session_before_validation() {
    let (url, handle, calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    for file_name in ["image.png", "notes.txt"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/knowledge/co_1/documents?filename={}", file_name))
            .set_payload(vec![b'x'; 4096])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(calls.0.load(Ordering::SeqCst), 0);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_upload_rejects_declared_oversize() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/knowledge/co_1/documents?filename=handbook.pdf")
        .cookie(state.session_cookie())
        .insert_header((header::CONTENT_LENGTH, "62914560"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], FILE_TOO_LARGE);
}

#[actix_web::test]
async fn test_upload_forwards_valid_file() {
    let (url, handle, calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/knowledge/co_1/documents?filename=notes.md")
        .cookie(state.session_cookie())
        .set_payload("# Notes\n")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["document_id"], "doc_9");
    assert_eq!(calls.0.load(Ordering::SeqCst), 1);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_url_source_validation() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    for (input, expected) in [("   ", MISSING_URL), ("not a url", INVALID_URL)] {
        let req = test::TestRequest::post()
            .uri("/api/knowledge/co_1/urls")
            .cookie(state.session_cookie())
            .set_json(json!({"url": input}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], expected);
    }
}

#[actix_web::test]
async fn test_overview_combines_backend_calls() {
    let (url, handle, calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/knowledge/co_1")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stats"]["total_chunks"], 12);
    assert_eq!(body["documents"][0]["filename"], "handbook.pdf");
    assert_eq!(body["documents"][0]["display_size"], "2.0 KB");
    assert_eq!(body["voice_settings"], Value::Null);
    assert_eq!(calls.0.load(Ordering::SeqCst), 3);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_overview_surfaces_backend_error() {
    let (url, handle, _calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/knowledge/co_missing")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Company not found");

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/usage")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

// Dashboard

#[actix_web::test]
async fn test_usage_uses_session_token() {
    let (url, handle, _calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/usage")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["daily_goal"], 20);
    assert_eq!(body["weekly_remaining"], 70);
    assert_eq!(body["daily_percent"], 20.0);
    assert_eq!(body["weekly_percent"], 30.0);
    assert_eq!(body["plan"], "PRO");

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_usage_stream_publishes_summaries() {
    let (url, handle, calls) = start_backend().await;
    let state = TestState::new(backend_config(&url));
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/usage/stream")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");

    let mut body = Box::pin(resp.into_body());
    let chunk = future::poll_fn(|cx| body.as_mut().poll_next(cx))
        .await
        .unwrap()
        .unwrap();
    let event = std::str::from_utf8(&chunk).unwrap();
    assert!(event.ends_with("\n\n"));

    let summary: Value = serde_json::from_str(event.strip_prefix("data: ").unwrap().trim_end()).unwrap();
    assert_eq!(summary["daily_used"], 4);
    assert_eq!(summary["plan"], "PRO");
    assert!(calls.0.load(Ordering::SeqCst) >= 1);

    drop(body);
    handle.stop(true).await;
}

#[actix_web::test]
async fn test_usage_stream_requires_session() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/dashboard/usage/stream").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_tone_preference() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/dashboard/tone").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/tone")
        .cookie(state.session_cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"tone": "value"}));

    let req = test::TestRequest::put()
        .uri("/api/dashboard/tone")
        .cookie(state.session_cookie())
        .set_json(json!({"tone": "Funny"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"tone": "funny"}));

    let req = test::TestRequest::put()
        .uri("/api/dashboard/tone")
        .cookie(state.session_cookie())
        .set_json(json!({"tone": "sarcastic"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/dashboard/tone")
        .cookie(state.session_cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"tone": "funny"}));
}

// Extension handoff

/// Answers the first extension request on the user's bus like the content
/// script would
fn spawn_extension(hub: &ExtensionHub, answer: fn(ExtensionRequest) -> ExtensionResponse) {
    let bus = hub.bus_for(USER);
    let mut listener = bus.listen();

    actix_web::rt::spawn(async move {
        while let Some(message) = listener.recv().await {
            if message.kind() != Some(EXTENSION_REQUEST_TYPE) {
                continue;
            }
            let request: ExtensionRequest = serde_json::from_value(message.data).unwrap();
            let response = serde_json::to_value(answer(request)).unwrap();
            let origin = bus.origin().to_string();
            bus.post(&origin, response, &origin).unwrap();
            break;
        }
    });
}

#[actix_web::test]
async fn test_connect_extension_success() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    spawn_extension(&state.hub, |request| {
        assert!(!request.token.is_empty());
        ExtensionResponse::ok(request.request_id)
    });

    let req = test::TestRequest::post()
        .uri("/api/extension/connect")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Token sent to extension! You can now use the extension.");
}

#[actix_web::test]
async fn test_connect_extension_rejected() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    spawn_extension(&state.hub, |request| ExtensionResponse::failed(request.request_id, None));

    let req = test::TestRequest::post()
        .uri("/api/extension/connect")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], DEFAULT_HANDOFF_FAILURE);
}

#[actix_web::test]
async fn test_connect_extension_times_out() {
    let mut config = offline_config();
    config.extension.handoff_timeout_ms = 50;
    let state = TestState::new(config);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/extension/connect")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], HANDOFF_TIMEOUT_MESSAGE);
    assert_eq!(state.hub.bus_count(), 0);
}

#[actix_web::test]
async fn test_extension_socket_checks_origin() {
    let state = TestState::new(offline_config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/ws/extension").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/ws/extension")
        .cookie(state.session_cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/ws/extension")
        .cookie(state.session_cookie())
        .insert_header((header::ORIGIN, "https://evil.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

/// Runs the site itself on an ephemeral port, sharing `state`
async fn start_site(state: &TestState) -> (String, ServerHandle) {
    let config = state.config.clone();
    let identity = state.identity.clone();
    let hub = web::Data::from(state.hub.clone());
    let http = state.http.clone();
    let tones = state.tones.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(identity.clone())
            .app_data(hub.clone())
            .app_data(http.clone())
            .app_data(tones.clone())
            .configure(web_server::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind site");

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    (format!("127.0.0.1:{}", addr.port()), handle)
}

#[actix_web::test]
async fn test_extension_socket_bridges_handoff() {
    let state = TestState::new(offline_config());
    let (addr, handle) = start_site(&state).await;

    let mut request = format!("ws://{}/ws/extension", addr).into_client_request().unwrap();
    let headers = request.headers_mut();
    headers.insert(ws_header::COOKIE, HeaderValue::from_str(&state.cookie_header()).unwrap());
    headers.insert(ws_header::ORIGIN, HeaderValue::from_str(&state.config.site_origin).unwrap());

    let (ws_stream, _) = connect_async(request).await.unwrap();
    let (mut write, mut read) = ws_stream.split();

    // The session joins the bus once its actor starts
    let bus = state.hub.bus_for(USER);
    for _ in 0..200 {
        if bus.listener_count() > 0 {
            break;
        }
        actix_web::rt::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(bus.listener_count(), 1);
    drop(bus);

    let cookie = state.cookie_header();
    let connect_url = format!("http://{}/api/extension/connect", addr);
    let connect = actix_web::rt::spawn(async move {
        reqwest::Client::new()
            .post(connect_url)
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await
    });

    let request: ExtensionRequest = loop {
        match read.next().await.unwrap().unwrap() {
            Message::Text(text) => break serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    };
    assert_eq!(request.kind, EXTENSION_REQUEST_TYPE);
    assert_eq!(request.action, STORE_TOKEN_ACTION);
    assert!(!request.token.is_empty());

    let reply = serde_json::to_string(&ExtensionResponse::ok(request.request_id)).unwrap();
    write.send(Message::Text(reply)).await.unwrap();

    let resp = connect.await.unwrap().unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    write.send(Message::Close(None)).await.ok();
    handle.stop(true).await;
}
