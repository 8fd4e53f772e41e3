pub mod config;
pub mod error;

pub use config::MiniblogConfig;
pub use error::{MiniblogError, Result};
