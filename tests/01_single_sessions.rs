mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sessioncrab::{
    BatchCollector, CallKind, CallOptions, Code, SessionClientConfig, SessionError, Status,
};
use tokio::time::timeout;

#[tokio::test]
async fn create_and_delete_a_session() {
    let backend = support::backend();
    let client = support::client(&backend, 2);

    let session = client.create_session().await.unwrap();
    assert!(session.id().starts_with(support::DATABASE));
    assert!(!session.is_multiplexed());
    assert_eq!(backend.live_sessions(), 1);

    session.delete().await.unwrap();
    assert_eq!(backend.live_sessions(), 0);
    assert_eq!(backend.total_sessions_deleted(), 1);
}

#[tokio::test]
async fn database_role_and_labels_reach_the_server() {
    let backend = support::backend();
    let mut labels = BTreeMap::new();
    labels.insert("team".to_string(), "payments".to_string());
    let config = SessionClientConfig {
        database_role: Some("reader".into()),
        labels: labels.clone(),
        ..SessionClientConfig::new(support::DATABASE)
    };
    let client = support::client_with(&backend, 2, config);
    assert_eq!(client.database_role(), Some("reader"));

    let session = client.create_session().await.unwrap();
    assert_eq!(session.creator_role(), Some("reader"));

    let metadata = session.metadata().await.unwrap();
    assert_eq!(metadata.creator_role.as_deref(), Some("reader"));
    assert_eq!(metadata.labels, labels);
    assert_eq!(metadata.name, session.id());
}

#[tokio::test]
async fn retryable_errors_are_retried() {
    let backend = support::backend();
    let config = SessionClientConfig {
        call_options: support::fast_retry(CallKind::CreateSession, &[Code::Unavailable]),
        ..SessionClientConfig::new(support::DATABASE)
    };
    let client = support::client_with(&backend, 1, config);
    backend.push_errors(
        CallKind::CreateSession,
        [
            Some(Status::unavailable("try again")),
            Some(Status::unavailable("try again")),
        ],
    );

    let session = client.create_session().await.unwrap();

    assert_eq!(backend.calls_of(CallKind::CreateSession).len(), 3);
    assert_eq!(backend.live_sessions(), 1);
    session.delete().await.unwrap();
}

#[tokio::test]
async fn non_retryable_error_leaves_nothing_behind() {
    let backend = support::backend();
    let client = support::client(&backend, 1);
    backend.push_errors(
        CallKind::CreateSession,
        [Some(Status::failed_precondition("not allowed"))],
    );

    let err = client.create_session().await.unwrap_err();

    assert_eq!(err.code(), Code::FailedPrecondition);
    assert_eq!(backend.calls_of(CallKind::CreateSession).len(), 1);
    assert_eq!(backend.live_sessions(), 0);
}

#[tokio::test]
async fn call_timeout_bounds_the_whole_call() {
    let backend = support::backend();
    let mut overrides = support::fast_retry(CallKind::CreateSession, &[Code::Unavailable]);
    if let Some(setting) = overrides.get(CallKind::CreateSession).cloned() {
        overrides.insert(
            CallKind::CreateSession,
            sessioncrab::CallSetting {
                timeout: Some(Duration::from_millis(20)),
                ..setting
            },
        );
    }
    let config = SessionClientConfig {
        call_options: overrides,
        ..SessionClientConfig::new(support::DATABASE)
    };
    let client = support::client_with(&backend, 1, config);
    backend.set_latency(CallKind::CreateSession, Duration::from_secs(1));

    let err = client.create_session().await.unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert!(!err.is_batch_deadline());
}

#[tokio::test]
async fn overrides_merge_onto_library_defaults() {
    let backend = support::backend();
    let overrides = support::fast_retry(CallKind::GetSession, &[Code::Unavailable]);
    let config = SessionClientConfig {
        call_options: overrides.clone(),
        ..SessionClientConfig::new(support::DATABASE)
    };
    let client = support::client_with(&backend, 1, config);

    let defaults = CallOptions::session_defaults();
    assert_eq!(
        client.call_options().get(CallKind::GetSession),
        overrides.get(CallKind::GetSession)
    );
    for kind in [
        CallKind::CreateSession,
        CallKind::BatchCreateSessions,
        CallKind::DeleteSession,
    ] {
        assert_eq!(client.call_options().get(kind), defaults.get(kind));
    }
}

#[tokio::test]
async fn multiplexed_session_is_reported_to_the_consumer() {
    let backend = support::backend();
    let client = support::client(&backend, 2);
    let collector = Arc::new(BatchCollector::new(1));

    client.create_multiplexed_session(collector.clone()).unwrap();
    let outcome = timeout(Duration::from_secs(5), collector.wait()).await.unwrap();

    assert_eq!(outcome.sessions.len(), 1);
    let session = &outcome.sessions[0];
    assert!(session.is_multiplexed());
    assert!(session.metadata().await.unwrap().multiplexed);
}

#[tokio::test]
async fn failed_multiplexed_session_is_flagged() {
    let backend = support::backend();
    let client = support::client(&backend, 1);
    backend.push_errors(
        CallKind::CreateSession,
        [Some(Status::failed_precondition("multiplexing disabled"))],
    );
    let collector = Arc::new(BatchCollector::new(1));

    client.create_multiplexed_session(collector.clone()).unwrap();
    let outcome = timeout(Duration::from_secs(5), collector.wait()).await.unwrap();

    assert!(outcome.sessions.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].multiplexed);
    assert_eq!(outcome.failures[0].count, 1);
}

#[tokio::test]
async fn closed_client_rejects_new_work() {
    let backend = support::backend();
    let client = support::client(&backend, 3);

    client.close().await;

    assert!(client.is_closed());
    assert_eq!(backend.closed_connections(), 3);
    assert_eq!(client.create_session().await.unwrap_err(), SessionError::ClientClosed);

    let collector = Arc::new(BatchCollector::new(10));
    assert_eq!(
        client.batch_create_sessions(10, true, collector).unwrap_err(),
        SessionError::ClientClosed
    );
    assert!(backend.calls().is_empty());
}
