use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::{CreateSessionRequest, SessionMetadata, SessionStub, SessionTemplate};
use crate::call_options::{CallOptions, merge_call_options, retry};
use crate::client_id::ClientIdGenerator;
use crate::errors::SessionError;
use crate::shared_types::CallKind;

use super::batch::{BatchDeadline, BatchWorker};
use super::consumer::SessionConsumer;
use super::selector::{Connection, ConnectionSelector};
use super::session::Session;

// -----------------------------------------------------------------------------
// ----- SessionClientConfig ---------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionClientConfig {
    /// Fully qualified database the sessions belong to.
    pub database: String,
    pub database_role: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Overall deadline of one batch operation. `None` waits indefinitely.
    pub batch_timeout: Option<Duration>,
    /// Merged onto [`CallOptions::session_defaults`].
    pub call_options: CallOptions,
}

impl SessionClientConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionClient ---------------------------------------------------------

/// Creates and hands out sessions over a fixed set of backend connections.
///
/// Single sessions go to the next connection in round-robin order. Batches are
/// split evenly over the connections and pursued concurrently, one background
/// worker per connection, with results pushed to a [`SessionConsumer`].
#[derive(Debug)]
pub struct SessionClient {
    id: String,
    database: String,
    template: SessionTemplate,
    selector: ConnectionSelector,
    call_options: Arc<CallOptions>,
    batch_timeout: Option<Duration>,
    closed: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

// -----------------------------------------------------------------------------
// ----- SessionClient: Static -------------------------------------------------

impl SessionClient {
    pub fn new(
        config: SessionClientConfig,
        stubs: Vec<Arc<dyn SessionStub>>,
    ) -> Result<Self, SessionError> {
        Self::with_id_generator(config, stubs, ClientIdGenerator::process())
    }

    pub fn with_id_generator(
        config: SessionClientConfig,
        stubs: Vec<Arc<dyn SessionStub>>,
        ids: &ClientIdGenerator,
    ) -> Result<Self, SessionError> {
        let selector = ConnectionSelector::new(stubs)?;
        let call_options = merge_call_options(&CallOptions::session_defaults(), &config.call_options);
        let id = ids.next_id(&config.database);

        info!(
            "session client {id} for {} using {} connections",
            config.database,
            selector.len()
        );

        Ok(Self {
            id,
            template: SessionTemplate {
                creator_role: config.database_role,
                labels: config.labels,
                multiplexed: false,
            },
            database: config.database,
            selector,
            call_options: Arc::new(call_options),
            batch_timeout: config.batch_timeout,
            closed: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- SessionClient: Public -------------------------------------------------

impl SessionClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn database_role(&self) -> Option<&str> {
        self.template.creator_role.as_deref()
    }

    pub fn call_options(&self) -> &CallOptions {
        &self.call_options
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout
    }

    pub fn set_batch_timeout(&mut self, timeout: Option<Duration>) {
        self.batch_timeout = timeout;
    }

    pub fn num_connections(&self) -> usize {
        self.selector.len()
    }

    pub fn next_connection(&self) -> Arc<Connection> {
        self.selector.next()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create one session on the next connection.
    ///
    /// A failed call leaves nothing behind on the server. Wrap the future in
    /// a timeout to impose a caller deadline; dropping it stops any retries.
    pub async fn create_session(&self) -> Result<Session, SessionError> {
        if self.is_closed() {
            return Err(SessionError::ClientClosed);
        }

        let connection = self.selector.next();
        let metadata = self.create_on(&connection, self.template.clone()).await?;
        Ok(Session::new(metadata, connection, self.call_options.clone()))
    }

    /// Create `count` sessions spread over the connections, reporting every
    /// outcome to `consumer`. Returns as soon as the work is started.
    ///
    /// With `distribute_over_connections` unset the whole batch goes to a
    /// single connection. Must be called within a tokio runtime.
    pub fn batch_create_sessions(
        &self,
        count: usize,
        distribute_over_connections: bool,
        consumer: Arc<dyn SessionConsumer>,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::ClientClosed);
        }
        if count == 0 {
            return Ok(());
        }

        let (per_connection, mut remainder, workers) = if distribute_over_connections {
            let n = self.selector.len();
            (count / n, count % n, n)
        } else {
            (count, 0, 1)
        };

        let deadline = self.batch_timeout.and_then(BatchDeadline::after);
        let mut handles = self.workers.lock();
        handles.retain(|handle| !handle.is_finished());

        let mut assigned = 0;
        for _ in 0..workers {
            if assigned >= count {
                break;
            }

            let mut share = per_connection;
            if remainder > 0 {
                share += 1;
                remainder -= 1;
            }
            if share == 0 {
                continue;
            }
            assigned += share;

            let worker = BatchWorker {
                connection: self.selector.next(),
                share,
                database: self.database.clone(),
                template: self.template.clone(),
                call_options: self.call_options.clone(),
                deadline,
                closed: self.closed.clone(),
                consumer: consumer.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        Ok(())
    }

    /// Create one multiplexed session in the background and report it to
    /// `consumer` with `is_multiplexed` set.
    pub fn create_multiplexed_session(
        &self,
        consumer: Arc<dyn SessionConsumer>,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::ClientClosed);
        }

        let connection = self.selector.next();
        let request = CreateSessionRequest {
            database: self.database.clone(),
            template: SessionTemplate {
                multiplexed: true,
                ..self.template.clone()
            },
        };
        let call_options = self.call_options.clone();

        let handle = tokio::spawn(async move {
            let stub = connection.stub();
            let setting = call_options.get(CallKind::CreateSession);
            let result = retry::invoke(CallKind::CreateSession, setting, move || {
                stub.create_session(request.clone())
            })
            .await;

            match result {
                Ok(metadata) => {
                    let session = Session::new(metadata, connection.clone(), call_options.clone());
                    consumer.session_ready(session);
                }
                Err(status) => {
                    warn!("failed to create multiplexed session: {status}");
                    consumer.session_creation_failed(status.into(), 1, true);
                }
            }
        });

        let mut handles = self.workers.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);

        Ok(())
    }

    /// Stop accepting work, wait for background workers, then close every
    /// connection.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("session worker ended abnormally: {err}");
            }
        }

        for connection in self.selector.connections() {
            connection.stub().close().await;
        }

        info!("session client {} closed", self.id);
    }
}

// -----------------------------------------------------------------------------
// ----- SessionClient: Private ------------------------------------------------

impl SessionClient {
    async fn create_on(
        &self,
        connection: &Connection,
        template: SessionTemplate,
    ) -> Result<SessionMetadata, SessionError> {
        let stub = connection.stub();
        let request = CreateSessionRequest {
            database: self.database.clone(),
            template,
        };
        let setting = self.call_options.get(CallKind::CreateSession);

        let metadata = retry::invoke(CallKind::CreateSession, setting, move || {
            stub.create_session(request.clone())
        })
        .await?;
        Ok(metadata)
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
