pub mod retry;

use std::collections::BTreeMap;
use std::time::Duration;

use smallvec::SmallVec;

use crate::shared_types::{CallKind, Code};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(32_000);
const DEFAULT_MULTIPLIER: f64 = 1.3;

// -----------------------------------------------------------------------------
// ----- RetryPolicy -----------------------------------------------------------

/// Exponential backoff applied when a call fails with one of `retry_codes`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub retry_codes: SmallVec<[Code; 4]>,
}

impl RetryPolicy {
    pub fn on_codes(codes: &[Code], initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            retry_codes: SmallVec::from_slice(codes),
        }
    }

    pub fn is_retryable(&self, code: Code) -> bool {
        self.retry_codes.contains(&code)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::on_codes(
            &[Code::Unavailable],
            DEFAULT_INITIAL_BACKOFF,
            DEFAULT_MAX_BACKOFF,
            DEFAULT_MULTIPLIER,
        )
    }
}

// -----------------------------------------------------------------------------
// ----- CallSetting -----------------------------------------------------------

/// Settings for one call kind. A setting with neither a retry policy nor a
/// timeout is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSetting {
    pub retry: Option<RetryPolicy>,
    pub timeout: Option<Duration>,
}

impl CallSetting {
    pub fn new(retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            retry: Some(retry),
            timeout: Some(timeout),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.retry.is_none() && self.timeout.is_none()
    }
}

// -----------------------------------------------------------------------------
// ----- CallOptions -----------------------------------------------------------

/// Call-option table: one [`CallSetting`] per call kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    entries: BTreeMap<CallKind, CallSetting>,
}

// -----------------------------------------------------------------------------
// ----- CallOptions: Static ---------------------------------------------------

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library defaults every client merges its overrides onto.
    pub fn session_defaults() -> Self {
        let unavailable = [Code::Unavailable];
        let standard = |codes: &[Code], timeout: u64| {
            CallSetting::new(
                RetryPolicy::on_codes(
                    codes,
                    DEFAULT_INITIAL_BACKOFF,
                    DEFAULT_MAX_BACKOFF,
                    DEFAULT_MULTIPLIER,
                ),
                Duration::from_secs(timeout),
            )
        };

        Self::new()
            .with(CallKind::CreateSession, standard(&unavailable, 30))
            .with(CallKind::BatchCreateSessions, standard(&unavailable, 60))
            .with(
                CallKind::GetSession,
                standard(&[Code::Unavailable, Code::ResourceExhausted], 30),
            )
            .with(CallKind::DeleteSession, standard(&unavailable, 30))
    }
}

// -----------------------------------------------------------------------------
// ----- CallOptions: Public ---------------------------------------------------

impl CallOptions {
    pub fn with(mut self, kind: CallKind, setting: CallSetting) -> Self {
        self.entries.insert(kind, setting);
        self
    }

    pub fn insert(&mut self, kind: CallKind, setting: CallSetting) {
        self.entries.insert(kind, setting);
    }

    pub fn get(&self, kind: CallKind) -> Option<&CallSetting> {
        self.entries.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = CallKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Merge -----------------------------------------------------------------

/// Combine `defaults` with `overrides` into a new table.
///
/// A non-empty override entry replaces the default entry for its kind
/// verbatim. Kinds without an override, and kinds whose override entry is
/// present but empty, keep the default entry. Neither input is modified.
pub fn merge_call_options(defaults: &CallOptions, overrides: &CallOptions) -> CallOptions {
    let mut merged = defaults.clone();

    for (kind, setting) in &overrides.entries {
        if setting.is_empty() {
            continue;
        }
        merged.entries.insert(*kind, setting.clone());
    }

    merged
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
