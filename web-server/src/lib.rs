// web-server/src/lib.rs
pub mod api;
pub mod error;
pub mod extension;
pub mod identity;
pub mod static_files;

use actix_web::web;

/// API scope plus the extension socket. Static files are registered
/// separately since they must come last.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(api::configure).configure(extension::configure);
}
