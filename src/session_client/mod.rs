mod batch;
pub mod client;
pub mod consumer;
pub mod selector;
pub mod session;

pub use client::{SessionClient, SessionClientConfig};
pub use consumer::{BatchCollector, BatchOutcome, CreationFailure, SessionConsumer};
pub use selector::{Connection, ConnectionSelector};
pub use session::Session;
