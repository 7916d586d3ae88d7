use std::{sync::Arc, sync::Once, time::Duration};

use sessioncrab::backend::MemoryBackend;
use sessioncrab::{
    BatchCollector, BatchOutcome, CallKind, CallOptions, CallSetting, Code, RetryPolicy,
    SessionClient, SessionClientConfig,
};
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

pub const DATABASE: &str = "projects/p/instances/i/databases/d";

static TRACING: Once = Once::new();

// Opt-in logs for debugging a failing test: RUST_LOG=debug cargo test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn backend() -> Arc<MemoryBackend> {
    init_tracing();
    MemoryBackend::new(DATABASE)
}

pub fn client(backend: &Arc<MemoryBackend>, connections: usize) -> SessionClient {
    client_with(backend, connections, SessionClientConfig::new(DATABASE))
}

pub fn client_with(
    backend: &Arc<MemoryBackend>,
    connections: usize,
    config: SessionClientConfig,
) -> SessionClient {
    SessionClient::new(config, backend.connect(connections)).expect("build session client")
}

/// Call options that retry `codes` almost immediately.
#[allow(dead_code)]
pub fn fast_retry(kind: CallKind, codes: &[Code]) -> CallOptions {
    CallOptions::new().with(
        kind,
        CallSetting {
            retry: Some(RetryPolicy::on_codes(
                codes,
                Duration::from_millis(1),
                Duration::from_millis(5),
                1.5,
            )),
            timeout: Some(Duration::from_secs(5)),
        },
    )
}

/// Run one batch to completion and return everything the consumer saw.
#[allow(dead_code)]
pub async fn batch(client: &SessionClient, count: usize, distribute: bool) -> BatchOutcome {
    let collector = Arc::new(BatchCollector::new(count));
    client
        .batch_create_sessions(count, distribute, collector.clone())
        .expect("start batch");

    timeout(Duration::from_secs(10), collector.wait())
        .await
        .expect("batch did not complete in time")
}

/// Sessions per connection index, for `connections` connections.
#[allow(dead_code)]
pub fn per_connection(outcome: &BatchOutcome, connections: usize) -> Vec<usize> {
    let mut counts = vec![0; connections];
    for session in &outcome.sessions {
        counts[session.connection_index()] += 1;
    }
    counts
}
