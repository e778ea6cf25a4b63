// web-server/src/extension/mod.rs
pub mod hub;
pub mod routes;
pub mod session;

pub use hub::ExtensionHub;
pub use routes::configure;
pub use session::ExtensionSession;
