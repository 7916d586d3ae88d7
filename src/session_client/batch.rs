use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::backend::{BatchCreateSessionsRequest, SessionMetadata, SessionTemplate};
use crate::call_options::{CallOptions, retry};
use crate::errors::{SessionError, Status};
use crate::shared_types::CallKind;

use super::consumer::SessionConsumer;
use super::selector::Connection;
use super::session::Session;

// -----------------------------------------------------------------------------
// ----- BatchDeadline ---------------------------------------------------------

/// Deadline shared by every worker of one batch operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchDeadline {
    pub(crate) at: Instant,
    pub(crate) timeout: Duration,
}

impl BatchDeadline {
    pub(crate) fn after(timeout: Duration) -> Option<Self> {
        Instant::now()
            .checked_add(timeout)
            .map(|at| Self { at, timeout })
    }

    fn error(&self) -> SessionError {
        SessionError::BatchDeadlineExceeded {
            timeout: self.timeout,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BatchWorker -----------------------------------------------------------

/// Pursues one connection's share of a batch. Calls on the connection are
/// strictly sequential; every requested session ends up either delivered or
/// reported as failed.
pub(crate) struct BatchWorker {
    pub(crate) connection: Arc<Connection>,
    pub(crate) share: usize,
    pub(crate) database: String,
    pub(crate) template: SessionTemplate,
    pub(crate) call_options: Arc<CallOptions>,
    pub(crate) deadline: Option<BatchDeadline>,
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) consumer: Arc<dyn SessionConsumer>,
}

impl BatchWorker {
    pub(crate) async fn run(self) {
        let mut remaining = self.share;

        while remaining > 0 {
            if self.closed.load(Ordering::Acquire) {
                self.fail(SessionError::ClientClosed, remaining);
                return;
            }

            let requested = match self.connection.stub().max_sessions_per_request() {
                Some(max) => remaining.min(max.max(1)),
                None => remaining,
            };

            let result = match self.deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline.at {
                        self.fail(deadline.error(), remaining);
                        return;
                    }
                    match timeout_at(deadline.at, self.create_batch(requested)).await {
                        Ok(result) => result,
                        Err(_) => {
                            self.fail(deadline.error(), remaining);
                            return;
                        }
                    }
                }
                None => self.create_batch(requested).await,
            };

            let created = match result {
                Ok(created) => created,
                Err(status) => {
                    self.fail(status.into(), remaining);
                    return;
                }
            };

            if created.is_empty() {
                self.fail(
                    Status::resource_exhausted("backend returned no sessions").into(),
                    remaining,
                );
                return;
            }

            let delivered = created.len();
            for metadata in created {
                self.consumer.session_ready(Session::new(
                    metadata,
                    self.connection.clone(),
                    self.call_options.clone(),
                ));
            }

            remaining = remaining.saturating_sub(delivered);
            debug!(
                "connection {} delivered {delivered} sessions, {remaining} outstanding",
                self.connection.index()
            );
        }
    }

    async fn create_batch(&self, count: usize) -> Result<Vec<SessionMetadata>, Status> {
        let stub = self.connection.stub();
        let request = BatchCreateSessionsRequest {
            database: self.database.clone(),
            session_count: count,
            template: self.template.clone(),
        };
        let setting = self.call_options.get(CallKind::BatchCreateSessions);

        retry::invoke(CallKind::BatchCreateSessions, setting, move || {
            stub.batch_create_sessions(request.clone())
        })
        .await
    }

    fn fail(&self, error: SessionError, count: usize) {
        warn!(
            "connection {} failed to create {count} sessions: {error}",
            self.connection.index()
        );
        self.consumer.session_creation_failed(error, count, false);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
