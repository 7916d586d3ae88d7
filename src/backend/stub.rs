use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::Status;

// -----------------------------------------------------------------------------
// ----- Requests --------------------------------------------------------------

/// Attributes every session created by one request shares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTemplate {
    pub creator_role: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub multiplexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionRequest {
    pub database: String,
    pub template: SessionTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCreateSessionsRequest {
    pub database: String,
    pub session_count: usize,
    pub template: SessionTemplate,
}

// -----------------------------------------------------------------------------
// ----- SessionMetadata -------------------------------------------------------

/// Server-side view of a session, as returned by create and get calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub name: String,
    pub creator_role: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub multiplexed: bool,
}

// -----------------------------------------------------------------------------
// ----- SessionStub -----------------------------------------------------------

/// RPC stub bound to one backend connection.
///
/// Implementations own the wire encoding and transport; the session client
/// only sees results or classified [`Status`] errors. A batch call may return
/// fewer sessions than requested.
#[async_trait]
pub trait SessionStub: Send + Sync {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionMetadata, Status>;

    async fn batch_create_sessions(
        &self,
        request: BatchCreateSessionsRequest,
    ) -> Result<Vec<SessionMetadata>, Status>;

    async fn get_session(&self, name: &str) -> Result<SessionMetadata, Status>;

    async fn delete_session(&self, name: &str) -> Result<(), Status>;

    /// Largest session count the server accepts per batch call, if it
    /// advertises one.
    fn max_sessions_per_request(&self) -> Option<usize> {
        None
    }

    /// Tear down the underlying connection.
    async fn close(&self) {}
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
