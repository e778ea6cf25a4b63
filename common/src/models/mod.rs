pub mod knowledge;
pub mod session;
pub mod usage;

pub use knowledge::*;
pub use session::*;
pub use usage::*;
