pub mod memory;
pub mod stub;

pub use memory::{CallRecord, MemoryBackend};
pub use stub::{
    BatchCreateSessionsRequest, CreateSessionRequest, SessionMetadata, SessionStub,
    SessionTemplate,
};

// RPC boundary; wire encoding and transport live behind SessionStub.
