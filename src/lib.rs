pub mod backend;
pub mod call_options;
pub mod client_id;
pub mod config;
pub mod errors;
pub mod session_client;
pub mod shared_types;

pub use call_options::{CallOptions, CallSetting, RetryPolicy, merge_call_options};
pub use client_id::ClientIdGenerator;
pub use config::Config;
pub use errors::{SessionError, Status};
pub use session_client::{
    BatchCollector, BatchOutcome, Session, SessionClient, SessionClientConfig, SessionConsumer,
};
pub use shared_types::{CallKind, Code};
