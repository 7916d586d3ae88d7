use serde::Deserialize;
use std::{collections::BTreeMap, path::Path, time::Duration};
use thiserror::Error;
use tokio::fs;

use crate::call_options::{CallOptions, CallSetting, RetryPolicy};
use crate::shared_types::{CallKind, Code};

// -----------------------------------------------------------------------------
// ----- FileConfig ------------------------------------------------------------

/// Settings read from the optional TOML config file. Every field may be left
/// out; the CLI and built-in defaults fill the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub database: Option<String>,
    pub num_connections: Option<usize>,
    pub database_role: Option<String>,
    pub batch_timeout: Option<Duration>,
    pub distribute_over_connections: Option<bool>,
    pub labels: BTreeMap<String, String>,
    pub call_options: CallOptions,
}

// -----------------------------------------------------------------------------
// ----- FileConfig: Static ----------------------------------------------------

impl FileConfig {
    pub async fn from_file_async(path: &Path) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<FileConfig, ConfigError> {
        let doc: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;

        if doc.num_connections == Some(0) {
            return Err(ConfigError::InvalidField("num_connections".into()));
        }

        let mut call_options = CallOptions::new();
        for (key, entry) in doc.call_options {
            let kind = CallKind::from_config_key(&key)
                .ok_or_else(|| ConfigError::InvalidField(format!("call_options.{key}")))?;
            call_options.insert(kind, entry.into_setting(kind)?);
        }

        Ok(FileConfig {
            database: doc.database,
            num_connections: doc.num_connections,
            database_role: doc.database_role,
            batch_timeout: doc.batch_timeout,
            distribute_over_connections: doc.distribute_over_connections,
            labels: doc.labels,
            call_options,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    database: Option<String>,

    #[serde(default)]
    num_connections: Option<usize>,

    #[serde(default)]
    database_role: Option<String>,

    #[serde(default, deserialize_with = "de_ms")]
    batch_timeout: Option<Duration>,

    #[serde(default)]
    distribute_over_connections: Option<bool>,

    #[serde(default)]
    labels: BTreeMap<String, String>,

    #[serde(default)]
    call_options: BTreeMap<String, CallSettingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallSettingEntry {
    #[serde(default, deserialize_with = "de_ms")]
    initial_backoff: Option<Duration>,

    #[serde(default, deserialize_with = "de_ms")]
    max_backoff: Option<Duration>,

    #[serde(default)]
    multiplier: Option<f64>,

    #[serde(default)]
    retry_codes: Option<Vec<Code>>,

    #[serde(default, deserialize_with = "de_ms")]
    timeout: Option<Duration>,
}

impl CallSettingEntry {
    /// An entry without keys becomes an empty setting, which the merge treats
    /// as "no override".
    fn into_setting(self, kind: CallKind) -> Result<CallSetting, ConfigError> {
        let has_retry = self.initial_backoff.is_some()
            || self.max_backoff.is_some()
            || self.multiplier.is_some()
            || self.retry_codes.is_some();

        let retry = if has_retry {
            let mut policy = RetryPolicy::default();
            if let Some(initial) = self.initial_backoff {
                policy.initial = initial;
            }
            if let Some(max) = self.max_backoff {
                policy.max = max;
            }
            if let Some(multiplier) = self.multiplier {
                policy.multiplier = multiplier;
            }
            if let Some(codes) = self.retry_codes {
                policy.retry_codes = codes.into_iter().collect();
            }
            validate_policy(kind, &policy)?;
            Some(policy)
        } else {
            None
        };

        Ok(CallSetting {
            retry,
            timeout: self.timeout,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn validate_policy(kind: CallKind, policy: &RetryPolicy) -> Result<(), ConfigError> {
    let field = |name: &str| {
        ConfigError::InvalidField(format!("call_options.{}.{name}", kind.config_key()))
    };

    if policy.initial.is_zero() {
        return Err(field("initial_backoff"));
    }
    if policy.initial > policy.max {
        return Err(field("max_backoff"));
    }
    if !policy.multiplier.is_finite() || policy.multiplier < 1.0 {
        return Err(field("multiplier"));
    }
    Ok(())
}

fn de_ms<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, Unexpected, Visitor};
    use std::fmt;

    struct OptVisitor;
    struct MsVisitor;

    impl<'de> Visitor<'de> for OptVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer milliseconds (e.g., 30000)")
        }
        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_some<D2>(self, d2: D2) -> Result<Self::Value, D2::Error>
        where
            D2: serde::Deserializer<'de>,
        {
            d2.deserialize_any(MsVisitor)
        }
    }

    impl<'de> Visitor<'de> for MsVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("integer milliseconds (e.g., 30000)")
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_millis(v)))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::invalid_value(Unexpected::Signed(v), &self));
            }
            Ok(Some(Duration::from_millis(v as u64)))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            Err(E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_option(OptVisitor)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
