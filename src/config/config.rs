use parking_lot::RwLock;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use super::{
    cli::CliConfig,
    file::{ConfigError, FileConfig},
    types::LogLevel,
};
use crate::session_client::SessionClientConfig;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_DATABASE: &str = "projects/local/instances/local/databases/sessioncrab";
pub const DEFAULT_NUM_CONNECTIONS: usize = 4;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: LogLevel,
    pub num_connections: usize,
    pub distribute_over_connections: bool,
    pub session_client: SessionClientConfig,
    pub workload: Workload,
}

/// What the load generator asks of the in-memory backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Workload {
    pub sessions: usize,
    pub latency: Duration,
    pub max_sessions_per_batch: Option<usize>,
    pub max_sessions_total: Option<usize>,
    pub advertised_max_per_request: Option<usize>,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Async because the config file is read with non-blocking IO.
    pub async fn init() {
        CliConfig::init();
        let cli = CliConfig::snapshot();

        let file = match &cli.config_file_location {
            Some(path) => Some(
                FileConfig::from_file_async(path)
                    .await
                    .unwrap_or_else(|e| panic!("failed to load {}: {e}", path.display())),
            ),
            None => None,
        };

        let next = Self::resolve(cli, file).unwrap_or_else(|e| panic!("invalid config: {e}"));

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }

    /// Layer the command line over the optional file over built-in defaults.
    pub fn resolve(cli: CliConfig, file: Option<FileConfig>) -> Result<Config, ConfigError> {
        let file = file.unwrap_or_default();

        let num_connections = cli
            .num_connections
            .or(file.num_connections)
            .unwrap_or(DEFAULT_NUM_CONNECTIONS);
        if num_connections == 0 {
            return Err(ConfigError::InvalidField("num_connections".into()));
        }

        let distribute_over_connections = if cli.concentrate {
            false
        } else {
            file.distribute_over_connections.unwrap_or(true)
        };

        let session_client = SessionClientConfig {
            database: cli
                .database
                .or(file.database)
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            database_role: cli.database_role.or(file.database_role),
            labels: file.labels,
            batch_timeout: cli.batch_timeout.or(file.batch_timeout),
            call_options: file.call_options,
        };

        Ok(Config {
            log_level: cli.log_level,
            num_connections,
            distribute_over_connections,
            session_client,
            workload: Workload {
                sessions: cli.sessions,
                latency: cli.latency,
                max_sessions_per_batch: cli.max_sessions_per_batch,
                max_sessions_total: cli.max_sessions_total,
                advertised_max_per_request: cli.advertised_max_per_request,
            },
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_types::CallKind;

    fn cli(args: &[&str]) -> CliConfig {
        let mut argv = vec!["sessioncrab"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_file() {
        let cfg = Config::resolve(cli(&[]), None).unwrap();

        assert_eq!(cfg.num_connections, DEFAULT_NUM_CONNECTIONS);
        assert!(cfg.distribute_over_connections);
        assert_eq!(cfg.session_client.database, DEFAULT_DATABASE);
        assert_eq!(cfg.session_client.batch_timeout, None);
        assert!(cfg.session_client.call_options.is_empty());
        assert_eq!(cfg.workload.sessions, 100);
    }

    #[test]
    fn cli_wins_over_file() {
        let file = FileConfig::parse(
            r#"
            database = "projects/p/instances/i/databases/file"
            num_connections = 2
            database_role = "file-role"
            batch_timeout = 5000

            [call_options.create_session]
            timeout = 1000
            "#,
        )
        .unwrap();

        let cfg = Config::resolve(
            cli(&["-c", "8", "--role", "cli-role", "--concentrate"]),
            Some(file),
        )
        .unwrap();

        assert_eq!(cfg.num_connections, 8);
        assert_eq!(cfg.session_client.database, "projects/p/instances/i/databases/file");
        assert_eq!(cfg.session_client.database_role.as_deref(), Some("cli-role"));
        assert_eq!(cfg.session_client.batch_timeout, Some(Duration::from_secs(5)));
        assert!(!cfg.distribute_over_connections);
        assert_eq!(
            cfg.session_client
                .call_options
                .get(CallKind::CreateSession)
                .and_then(|s| s.timeout),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn zero_connections_is_rejected() {
        let err = Config::resolve(cli(&["-c", "0"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField(ref f) if f == "num_connections"));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
