use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;

use super::stub::{
    BatchCreateSessionsRequest, CreateSessionRequest, SessionMetadata, SessionStub,
    SessionTemplate,
};
use crate::errors::Status;
use crate::shared_types::CallKind;

// -----------------------------------------------------------------------------
// ----- MemoryBackend ---------------------------------------------------------

/// In-process backend serving the session RPCs for a single database.
///
/// Used by the integration tests and the load generator. Every knob (latency,
/// injected errors, capacity caps) can be changed while stubs are in use.
#[derive(Debug)]
pub struct MemoryBackend {
    database: String,
    state: Mutex<BackendState>,
}

/// One RPC as seen by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub connection: usize,
    pub kind: CallKind,
    pub session: Option<String>,
}

#[derive(Debug, Default)]
struct BackendState {
    sessions: HashMap<String, SessionMetadata>,
    next_id: u64,
    created: usize,
    deleted: usize,
    closed_connections: usize,
    max_per_batch: Option<usize>,
    max_total: Option<usize>,
    latency: HashMap<CallKind, Duration>,
    errors: HashMap<CallKind, VecDeque<Option<Status>>>,
    calls: Vec<CallRecord>,
}

// -----------------------------------------------------------------------------
// ----- MemoryBackend: Static -------------------------------------------------

impl MemoryBackend {
    pub fn new(database: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            database: database.into(),
            state: Mutex::new(BackendState::default()),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryBackend: Public -------------------------------------------------

impl MemoryBackend {
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Open `count` connections, each with its own bound stub.
    pub fn connect(self: &Arc<Self>, count: usize) -> Vec<Arc<dyn SessionStub>> {
        self.connect_with_advertised_max(count, None)
    }

    /// Like [`connect`](Self::connect), but the stubs advertise a per-request
    /// maximum for batch calls.
    pub fn connect_with_advertised_max(
        self: &Arc<Self>,
        count: usize,
        advertised_max: Option<usize>,
    ) -> Vec<Arc<dyn SessionStub>> {
        (0..count)
            .map(|connection| {
                Arc::new(MemoryStub {
                    backend: self.clone(),
                    connection,
                    advertised_max,
                    closed: AtomicBool::new(false),
                }) as Arc<dyn SessionStub>
            })
            .collect()
    }

    pub fn set_latency(&self, kind: CallKind, latency: Duration) {
        self.state.lock().latency.insert(kind, latency);
    }

    /// Silently cap how many sessions one batch call returns.
    pub fn set_max_sessions_per_batch(&self, max: usize) {
        self.state.lock().max_per_batch = Some(max);
    }

    /// Cap how many sessions the backend creates over its lifetime. Once
    /// reached, create calls fail with `OUT_OF_RANGE`.
    pub fn set_max_sessions_total(&self, max: usize) {
        self.state.lock().max_total = Some(max);
    }

    /// Queue outcomes for the next calls of `kind`: `Some(status)` fails that
    /// call, `None` lets it through.
    pub fn push_errors(&self, kind: CallKind, errors: impl IntoIterator<Item = Option<Status>>) {
        self.state
            .lock()
            .errors
            .entry(kind)
            .or_default()
            .extend(errors);
    }

    pub fn total_sessions_created(&self) -> usize {
        self.state.lock().created
    }

    pub fn total_sessions_deleted(&self) -> usize {
        self.state.lock().deleted
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn closed_connections(&self) -> usize {
        self.state.lock().closed_connections
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<CallRecord> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryBackend: Private ------------------------------------------------

impl MemoryBackend {
    fn record(&self, connection: usize, kind: CallKind, session: Option<&str>) -> Duration {
        let mut state = self.state.lock();
        state.calls.push(CallRecord {
            connection,
            kind,
            session: session.map(str::to_string),
        });
        state.latency.get(&kind).copied().unwrap_or_default()
    }

    fn take_error(&self, kind: CallKind) -> Option<Status> {
        self.state
            .lock()
            .errors
            .get_mut(&kind)
            .and_then(|queue| queue.pop_front())
            .flatten()
    }

    fn create(
        &self,
        database: &str,
        template: &SessionTemplate,
        requested: usize,
        batch: bool,
    ) -> Result<Vec<SessionMetadata>, Status> {
        if database != self.database {
            return Err(Status::not_found(format!("database not found: {database}")));
        }

        let mut state = self.state.lock();

        let mut granted = requested;
        if batch {
            if let Some(max) = state.max_per_batch {
                granted = granted.min(max);
            }
        }
        if let Some(max) = state.max_total {
            let available = max.saturating_sub(state.created);
            if available == 0 {
                return Err(Status::out_of_range("no more sessions can be created"));
            }
            granted = granted.min(available);
        }

        let mut created = Vec::with_capacity(granted);
        for _ in 0..granted {
            state.next_id += 1;
            let metadata = SessionMetadata {
                name: format!("{}/sessions/{}", self.database, state.next_id),
                creator_role: template.creator_role.clone(),
                labels: template.labels.clone(),
                multiplexed: template.multiplexed,
            };
            state.sessions.insert(metadata.name.clone(), metadata.clone());
            created.push(metadata);
        }
        state.created += granted;

        Ok(created)
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryStub ------------------------------------------------------------

#[derive(Debug)]
struct MemoryStub {
    backend: Arc<MemoryBackend>,
    connection: usize,
    advertised_max: Option<usize>,
    closed: AtomicBool,
}

impl MemoryStub {
    async fn enter(&self, kind: CallKind, session: Option<&str>) -> Result<(), Status> {
        let latency = self.backend.record(self.connection, kind, session);

        if self.closed.load(Ordering::Acquire) {
            return Err(Status::unavailable(format!(
                "connection {} is closed",
                self.connection
            )));
        }

        if !latency.is_zero() {
            sleep(latency).await;
        }

        match self.backend.take_error(kind) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionStub for MemoryStub {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionMetadata, Status> {
        self.enter(CallKind::CreateSession, None).await?;

        let mut created = self
            .backend
            .create(&request.database, &request.template, 1, false)?;
        created
            .pop()
            .ok_or_else(|| Status::resource_exhausted("no session created"))
    }

    async fn batch_create_sessions(
        &self,
        request: BatchCreateSessionsRequest,
    ) -> Result<Vec<SessionMetadata>, Status> {
        self.enter(CallKind::BatchCreateSessions, None).await?;

        self.backend.create(
            &request.database,
            &request.template,
            request.session_count,
            true,
        )
    }

    async fn get_session(&self, name: &str) -> Result<SessionMetadata, Status> {
        self.enter(CallKind::GetSession, Some(name)).await?;

        self.backend
            .state
            .lock()
            .sessions
            .get(name)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("session not found: {name}")))
    }

    async fn delete_session(&self, name: &str) -> Result<(), Status> {
        self.enter(CallKind::DeleteSession, Some(name)).await?;

        let mut state = self.backend.state.lock();
        if state.sessions.remove(name).is_none() {
            return Err(Status::not_found(format!("session not found: {name}")));
        }
        state.deleted += 1;
        Ok(())
    }

    fn max_sessions_per_request(&self) -> Option<usize> {
        self.advertised_max
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.backend.state.lock().closed_connections += 1;
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_types::Code;

    fn batch_request(database: &str, count: usize) -> BatchCreateSessionsRequest {
        BatchCreateSessionsRequest {
            database: database.to_string(),
            session_count: count,
            template: SessionTemplate::default(),
        }
    }

    #[tokio::test]
    async fn batch_cap_limits_each_call() {
        let backend = MemoryBackend::new("db");
        backend.set_max_sessions_per_batch(3);
        let stubs = backend.connect(1);

        let sessions = stubs[0].batch_create_sessions(batch_request("db", 10)).await.unwrap();
        assert_eq!(sessions.len(), 3);
        assert_eq!(backend.total_sessions_created(), 3);
    }

    #[tokio::test]
    async fn total_cap_returns_out_of_range_once_exhausted() {
        let backend = MemoryBackend::new("db");
        backend.set_max_sessions_total(4);
        let stubs = backend.connect(1);

        let sessions = stubs[0].batch_create_sessions(batch_request("db", 10)).await.unwrap();
        assert_eq!(sessions.len(), 4);

        let err = stubs[0].batch_create_sessions(batch_request("db", 1)).await.unwrap_err();
        assert_eq!(err.code(), Code::OutOfRange);
    }

    #[tokio::test]
    async fn injected_errors_are_consumed_in_order() {
        let backend = MemoryBackend::new("db");
        backend.push_errors(
            CallKind::BatchCreateSessions,
            [None, Some(Status::failed_precondition("boom"))],
        );
        let stubs = backend.connect(1);

        assert!(stubs[0].batch_create_sessions(batch_request("db", 1)).await.is_ok());
        let err = stubs[0].batch_create_sessions(batch_request("db", 1)).await.unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        assert!(stubs[0].batch_create_sessions(batch_request("db", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_database_is_not_found() {
        let backend = MemoryBackend::new("db");
        let stubs = backend.connect(1);

        let err = stubs[0].batch_create_sessions(batch_request("other", 1)).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn delete_removes_session_and_records_connection() {
        let backend = MemoryBackend::new("db");
        let stubs = backend.connect(2);

        let sessions = stubs[1].batch_create_sessions(batch_request("db", 1)).await.unwrap();
        let name = &sessions[0].name;
        stubs[1].delete_session(name).await.unwrap();

        assert_eq!(backend.total_sessions_deleted(), 1);
        assert_eq!(backend.live_sessions(), 0);
        let deletes = backend.calls_of(CallKind::DeleteSession);
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].connection, 1);
        assert_eq!(deletes[0].session.as_deref(), Some(name.as_str()));

        let err = stubs[1].delete_session(name).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn closed_stub_rejects_calls() {
        let backend = MemoryBackend::new("db");
        let stubs = backend.connect(1);
        stubs[0].close().await;
        stubs[0].close().await;

        assert_eq!(backend.closed_connections(), 1);
        let err = stubs[0].batch_create_sessions(batch_request("db", 1)).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
