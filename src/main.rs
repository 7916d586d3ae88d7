use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::signal;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::fmt;

use sessioncrab::backend::MemoryBackend;
use sessioncrab::{BatchCollector, BatchOutcome, CallKind, Config, SessionClient, SessionError};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🦀 sessioncrab";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    setup().await;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} interrupted", APP_NAME);
            Ok(())
        }

        res = run_once() => res,
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let _ = fmt()
        .with_env_filter(config.log_level.env_filter())
        .with_target(false)
        .try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_once() -> Result<(), SessionError> {
    let config = Config::snapshot();
    let workload = &config.workload;

    let backend = MemoryBackend::new(config.session_client.database.clone());
    backend.set_latency(CallKind::BatchCreateSessions, workload.latency);
    if let Some(max) = workload.max_sessions_per_batch {
        backend.set_max_sessions_per_batch(max);
    }
    if let Some(max) = workload.max_sessions_total {
        backend.set_max_sessions_total(max);
    }

    let stubs =
        backend.connect_with_advertised_max(config.num_connections, workload.advertised_max_per_request);
    let client = SessionClient::new(config.session_client.clone(), stubs)?;

    info!(
        "{} requesting {} sessions from {} (distribute: {})",
        APP_NAME, workload.sessions, client.database(), config.distribute_over_connections
    );

    let started = Instant::now();
    let collector = Arc::new(BatchCollector::new(workload.sessions));
    client.batch_create_sessions(
        workload.sessions,
        config.distribute_over_connections,
        collector.clone(),
    )?;
    let outcome = collector.wait().await;

    report(&outcome, started);
    release(outcome).await;

    client.close().await;
    info!(
        "{} done: {} created, {} deleted, {} live",
        APP_NAME,
        backend.total_sessions_created(),
        backend.total_sessions_deleted(),
        backend.live_sessions()
    );

    Ok(())
}

fn report(outcome: &BatchOutcome, started: Instant) {
    info!(
        "batch finished in {:?}: {} sessions, {} failed",
        started.elapsed(),
        outcome.sessions.len(),
        outcome.failed_count()
    );

    let mut per_connection: BTreeMap<usize, usize> = BTreeMap::new();
    for session in &outcome.sessions {
        *per_connection.entry(session.connection_index()).or_default() += 1;
    }
    for (connection, sessions) in per_connection {
        info!("  connection {connection}: {sessions} sessions");
    }

    for failure in &outcome.failures {
        warn!("  {} sessions failed: {}", failure.count, failure.error);
    }
}

async fn release(outcome: BatchOutcome) {
    for session in outcome.sessions {
        let id = session.id().to_string();
        if let Err(e) = session.delete().await {
            error!("failed to delete {id}: {e}");
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
