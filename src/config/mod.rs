pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod file;
pub mod types;

pub use cli::CliConfig;
pub use config::{Config, Workload};
pub use file::{ConfigError, FileConfig};
pub use types::LogLevel;
