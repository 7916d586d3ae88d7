use std::time::Duration;

use thiserror::Error;

use crate::shared_types::Code;

// -----------------------------------------------------------------------------
// ----- Status ----------------------------------------------------------------

/// Error returned by a remote call: a status code plus a free-form message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
}

// -----------------------------------------------------------------------------
// ----- Status: Static --------------------------------------------------------

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(Code::OutOfRange, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }
}

// -----------------------------------------------------------------------------
// ----- Status: Public --------------------------------------------------------

impl Status {
    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// -----------------------------------------------------------------------------
// ----- SessionError ----------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The client was built without any backend connection.
    #[error("session client has no connections")]
    NoConnections,

    #[error("session client is closed")]
    ClientClosed,

    /// The batch operation's own deadline elapsed. Distinct from a
    /// `DeadlineExceeded` status returned by the backend.
    #[error("batch deadline of {timeout:?} exceeded")]
    BatchDeadlineExceeded { timeout: Duration },

    #[error(transparent)]
    Status(#[from] Status),
}

impl SessionError {
    pub fn code(&self) -> Code {
        match self {
            SessionError::NoConnections => Code::FailedPrecondition,
            SessionError::ClientClosed => Code::FailedPrecondition,
            SessionError::BatchDeadlineExceeded { .. } => Code::DeadlineExceeded,
            SessionError::Status(status) => status.code(),
        }
    }

    pub fn is_batch_deadline(&self) -> bool {
        matches!(self, SessionError::BatchDeadlineExceeded { .. })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
