// web-server/src/main.rs
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use web_server::api::dashboard::TonePreferences;
use web_server::extension::ExtensionHub;
use web_server::identity::{IdentityProvider, JwtIdentityProvider};
use web_server::static_files;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    let server_addr = config.web_server_addr.clone();

    tracing::info!("Starting ReplyDash on {}", server_addr);
    tracing::info!("Site origin {}, backend {}", config.site_origin, config.backend_url);

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let identity: Arc<dyn IdentityProvider> = Arc::new(JwtIdentityProvider::new(&config.identity));
    let identity_data = web::Data::from(identity);
    let hub_data = web::Data::new(ExtensionHub::new(config.site_origin.clone()));
    let http_data = web::Data::new(http);
    let tones_data = web::Data::new(TonePreferences::new());
    let static_config = config.static_files.clone();
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(identity_data.clone())
            .app_data(hub_data.clone())
            .app_data(http_data.clone())
            .app_data(tones_data.clone())
            .configure(web_server::configure)
            .configure(|cfg| static_files::configure(cfg, &static_config))
    })
    .bind(&server_addr)?
    .run()
    .await
}
