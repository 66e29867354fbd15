pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{EngineSettings, LoggingConfig};
pub use error::EngineError;
pub use models::*;
pub use services::*;
