// web-server/src/static_files.rs
use actix_files::{Files, NamedFile};
use actix_web::dev::{fn_service, ServiceRequest, ServiceResponse};
use actix_web::{web, HttpResponse};
use common::models::ErrorBody;
use common::StaticFilesConfig;
use std::path::{Path, PathBuf};

// Unmatched paths outside /api and /ws get the SPA index
async fn spa_index(req: ServiceRequest, index_path: PathBuf) -> Result<ServiceResponse, actix_web::Error> {
    let (req, _) = req.into_parts();

    let path = req.path();
    if path.starts_with("/api/") || path.starts_with("/ws/") {
        let res = HttpResponse::NotFound().json(ErrorBody {
            error: "Not found".to_string(),
        });
        return Ok(ServiceResponse::new(req, res));
    }

    let file = NamedFile::open_async(&index_path).await?;
    let res = file.into_response(&req);
    Ok(ServiceResponse::new(req, res))
}

/// Serve the built dashboard. Skipped with a warning when the directory is
/// missing, e.g. when only the API is being run.
pub fn configure(cfg: &mut web::ServiceConfig, config: &StaticFilesConfig) {
    let root = Path::new(&config.path);
    if !root.is_dir() {
        tracing::warn!("Static files directory {} not found, not serving the dashboard", config.path);
        return;
    }

    let index_path = root.join(&config.index);
    cfg.service(
        Files::new("/", root)
            .index_file(config.index.clone())
            .prefer_utf8(true)
            .use_etag(true)
            .use_last_modified(true)
            .default_handler(fn_service(move |req: ServiceRequest| {
                spa_index(req, index_path.clone())
            })),
    );
}
