use std::sync::Arc;
use std::time::Instant;

use crate::backend::SessionMetadata;
use crate::call_options::{CallOptions, retry};
use crate::errors::SessionError;
use crate::shared_types::CallKind;

use super::selector::Connection;

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

/// A server-allocated session, bound to the connection that created it.
///
/// Follow-up calls (get, delete) always go back to that connection. Deleting
/// consumes the handle, so a deleted session cannot be used again.
#[derive(Debug)]
pub struct Session {
    id: String,
    connection: Arc<Connection>,
    creator_role: Option<String>,
    multiplexed: bool,
    created_at: Instant,
    call_options: Arc<CallOptions>,
}

// -----------------------------------------------------------------------------
// ----- Session: Static -------------------------------------------------------

impl Session {
    pub(crate) fn new(
        metadata: SessionMetadata,
        connection: Arc<Connection>,
        call_options: Arc<CallOptions>,
    ) -> Self {
        Self {
            id: metadata.name,
            connection,
            creator_role: metadata.creator_role,
            multiplexed: metadata.multiplexed,
            created_at: Instant::now(),
            call_options,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Public -------------------------------------------------------

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creator_role(&self) -> Option<&str> {
        self.creator_role.as_deref()
    }

    pub fn is_multiplexed(&self) -> bool {
        self.multiplexed
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn connection_index(&self) -> usize {
        self.connection.index()
    }

    /// Fetch the server-side view of this session.
    pub async fn metadata(&self) -> Result<SessionMetadata, SessionError> {
        let stub = self.connection.stub();
        let id = self.id.as_str();
        let setting = self.call_options.get(CallKind::GetSession);

        let metadata = retry::invoke(CallKind::GetSession, setting, move || stub.get_session(id)).await?;
        Ok(metadata)
    }

    /// Delete the session on the connection that owns it.
    pub async fn delete(self) -> Result<(), SessionError> {
        let stub = self.connection.stub();
        let id = self.id.as_str();
        let setting = self.call_options.get(CallKind::DeleteSession);

        retry::invoke(CallKind::DeleteSession, setting, move || stub.delete_session(id)).await?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
