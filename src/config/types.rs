use tracing_subscriber::EnvFilter;

// -----------------------------------------------------------------------------
// ----- LogLevel --------------------------------------------------------------

/// Verbosity of the load generator's own logs. Other crates stay at `warn`.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn directive(self) -> String {
        format!("warn,{}={}", env!("CARGO_CRATE_NAME"), self.as_str())
    }

    /// `RUST_LOG` wins when set; otherwise [`directive`](Self::directive).
    pub fn env_filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
