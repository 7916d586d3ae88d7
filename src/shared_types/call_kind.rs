use std::fmt;

// -----------------------------------------------------------------------------
// ----- CallKind --------------------------------------------------------------

/// The remote operations a session client issues. Each kind carries its own
/// retry policy in a [`CallOptions`](crate::call_options::CallOptions) table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    CreateSession,
    BatchCreateSessions,
    GetSession,
    DeleteSession,
}

impl CallKind {
    pub const ALL: [CallKind; 4] = [
        CallKind::CreateSession,
        CallKind::BatchCreateSessions,
        CallKind::GetSession,
        CallKind::DeleteSession,
    ];

    /// Name used for the kind in config files.
    pub fn config_key(self) -> &'static str {
        match self {
            CallKind::CreateSession => "create_session",
            CallKind::BatchCreateSessions => "batch_create_sessions",
            CallKind::GetSession => "get_session",
            CallKind::DeleteSession => "delete_session",
        }
    }

    pub fn from_config_key(key: &str) -> Option<CallKind> {
        CallKind::ALL.into_iter().find(|kind| kind.config_key() == key)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::CreateSession => "CreateSession",
            CallKind::BatchCreateSessions => "BatchCreateSessions",
            CallKind::GetSession => "GetSession",
            CallKind::DeleteSession => "DeleteSession",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
