use clap::Parser;
use parking_lot::RwLock;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct CliConfig {
    pub config_file_location: Option<PathBuf>,
    pub log_level: LogLevel,
    pub database: Option<String>,
    pub num_connections: Option<usize>,
    pub database_role: Option<String>,
    pub sessions: usize,
    pub batch_timeout: Option<Duration>,
    pub concentrate: bool,
    pub latency: Duration,
    pub max_sessions_per_batch: Option<usize>,
    pub max_sessions_total: Option<usize>,
    pub advertised_max_per_request: Option<usize>,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Args::try_parse_from(args).map(Self::from)
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| e.exit());
        Self::from(args)
    }

    fn validate(&self) {
        if let Some(path) = &self.config_file_location {
            must_exist_file(path, "--config / sessioncrab.toml");
        }
        if self.num_connections == Some(0) {
            panic!("--connections must be at least 1");
        }
    }
}

impl From<Args> for CliConfig {
    fn from(args: Args) -> Self {
        Self {
            config_file_location: args.config_file,
            log_level: args.log_level,
            database: args.database,
            num_connections: args.num_connections,
            database_role: args.database_role,
            sessions: args.sessions,
            batch_timeout: args.batch_timeout,
            concentrate: args.concentrate,
            latency: args.latency,
            max_sessions_per_batch: args.max_per_batch,
            max_sessions_total: args.max_total,
            advertised_max_per_request: args.advertised_max,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sessioncrab", version, about = "Batch session acquisition load generator")]
struct Args {
    // Optional TOML file; CLI values win over it.
    #[arg(long = "config", env = "SESSIONCRAB_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    #[arg(long = "database", env = "SESSIONCRAB_DATABASE")]
    database: Option<String>,

    #[arg(long = "connections", short = 'c', env = "SESSIONCRAB_CONNECTIONS")]
    num_connections: Option<usize>,

    #[arg(long = "role", env = "SESSIONCRAB_DATABASE_ROLE")]
    database_role: Option<String>,

    // Sessions requested in the batch.
    #[arg(long = "sessions", short = 'n', default_value_t = 100)]
    sessions: usize,

    // e.g. 500ms, 10s. Unbounded when absent.
    #[arg(long = "batch-timeout", value_parser = humantime::parse_duration)]
    batch_timeout: Option<Duration>,

    // Send the whole batch to a single connection.
    #[arg(long = "concentrate")]
    concentrate: bool,

    // Simulated backend latency per batch call.
    #[arg(long = "latency", value_parser = humantime::parse_duration, default_value = "0ms")]
    latency: Duration,

    #[arg(long = "max-per-batch")]
    max_per_batch: Option<usize>,

    #[arg(long = "max-total")]
    max_total: Option<usize>,

    #[arg(long = "advertised-max")]
    advertised_max: Option<usize>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("cli config not initialized; call CliConfig::init() first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
