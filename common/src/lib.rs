pub mod backend;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handoff;
pub mod messages;
pub mod models;
pub mod utils;
pub mod validation;

pub use self::config::*;
pub use error::*;
pub use messages::*;
pub use utils::*;
