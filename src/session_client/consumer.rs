use parking_lot::Mutex;
use tokio::sync::watch;

use crate::errors::SessionError;

use super::session::Session;

// -----------------------------------------------------------------------------
// ----- SessionConsumer -------------------------------------------------------

/// Receives the outcomes of a batch operation as they arrive.
///
/// Both callbacks may be invoked concurrently from different connections, so
/// implementations synchronize their own state. For a batch of `n` sessions,
/// the number of `session_ready` calls plus the sum of `count` over all
/// `session_creation_failed` calls is exactly `n`; that is how a caller knows
/// the batch is finished.
pub trait SessionConsumer: Send + Sync + 'static {
    /// One call per created session.
    fn session_ready(&self, session: Session);

    /// One call per terminal failure; `count` is how many requested sessions
    /// the failure accounts for.
    fn session_creation_failed(&self, error: SessionError, count: usize, is_multiplexed: bool);
}

// -----------------------------------------------------------------------------
// ----- BatchCollector --------------------------------------------------------

/// A [`SessionConsumer`] that gathers everything until `expected` outcomes
/// have been seen.
#[derive(Debug)]
pub struct BatchCollector {
    expected: usize,
    outcome: Mutex<BatchOutcome>,
    done: watch::Sender<bool>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub sessions: Vec<Session>,
    pub failures: Vec<CreationFailure>,
}

#[derive(Debug, Clone)]
pub struct CreationFailure {
    pub error: SessionError,
    pub count: usize,
    pub multiplexed: bool,
}

// -----------------------------------------------------------------------------
// ----- BatchCollector: Static ------------------------------------------------

impl BatchCollector {
    pub fn new(expected: usize) -> Self {
        let (done, _) = watch::channel(expected == 0);
        Self {
            expected,
            outcome: Mutex::new(BatchOutcome::default()),
            done,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BatchCollector: Public ------------------------------------------------

impl BatchCollector {
    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until every expected outcome has arrived, then take them.
    pub async fn wait(&self) -> BatchOutcome {
        let mut done = self.done.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = done.wait_for(|complete| *complete).await;
        std::mem::take(&mut *self.outcome.lock())
    }
}

// -----------------------------------------------------------------------------
// ----- BatchCollector: Private -----------------------------------------------

impl BatchCollector {
    fn check_complete(&self, outcome: &BatchOutcome) {
        if outcome.sessions.len() + outcome.failed_count() >= self.expected {
            self.done.send_replace(true);
        }
    }
}

impl SessionConsumer for BatchCollector {
    fn session_ready(&self, session: Session) {
        let mut outcome = self.outcome.lock();
        outcome.sessions.push(session);
        self.check_complete(&outcome);
    }

    fn session_creation_failed(&self, error: SessionError, count: usize, is_multiplexed: bool) {
        let mut outcome = self.outcome.lock();
        outcome.failures.push(CreationFailure {
            error,
            count,
            multiplexed: is_multiplexed,
        });
        self.check_complete(&outcome);
    }
}

// -----------------------------------------------------------------------------
// ----- BatchOutcome ----------------------------------------------------------

impl BatchOutcome {
    /// Sessions accounted for by failure reports.
    pub fn failed_count(&self) -> usize {
        self.failures.iter().map(|f| f.count).sum()
    }

    pub fn total(&self) -> usize {
        self.sessions.len() + self.failed_count()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
