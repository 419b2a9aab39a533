//! Shared foundation for the copydesk workspace: configuration, domain
//! types, input validation, prompt templates, and the generic retry helper
//! used by every service client.

mod app_config;
mod config;
mod error;
pub mod retry;
pub mod template;
pub mod types;
pub mod validation;

pub use app_config::{AppConfig, Environment, ServiceLimits};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::ConfigError;
