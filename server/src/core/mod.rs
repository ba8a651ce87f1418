//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, AuthConfig, DatabaseConfig, NotifyConfig, ServerConfig};
pub use shutdown::ShutdownService;

pub use crate::data::TransactionalService;
