mod support;

use std::sync::Arc;

use sessioncrab::backend::MemoryBackend;
use sessioncrab::{CallKind, SessionClient, SessionClientConfig, SessionError};

#[tokio::test]
async fn next_connection_cycles_in_a_fixed_order() {
    let backend = support::backend();
    let client = support::client(&backend, 4);

    let first: Vec<_> = (0..4).map(|_| client.next_connection()).collect();
    let indices: Vec<_> = first.iter().map(|c| c.index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    for expected in &first {
        let again = client.next_connection();
        assert!(Arc::ptr_eq(expected, &again));
    }
}

#[tokio::test]
async fn client_without_connections_is_rejected() {
    let backend = MemoryBackend::new(support::DATABASE);
    let err = SessionClient::new(SessionClientConfig::new(support::DATABASE), backend.connect(0))
        .unwrap_err();

    assert_eq!(err, SessionError::NoConnections);
}

#[tokio::test]
async fn single_creates_rotate_over_connections() {
    let backend = support::backend();
    let client = support::client(&backend, 3);

    let mut sessions = Vec::new();
    for _ in 0..6 {
        sessions.push(client.create_session().await.unwrap());
    }

    let indices: Vec<_> = sessions.iter().map(|s| s.connection_index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);

    let cycle: Vec<_> = (0..3).map(|_| client.next_connection()).collect();
    for session in &sessions {
        assert!(Arc::ptr_eq(session.connection(), &cycle[session.connection_index()]));
    }
    for pair in sessions.windows(2) {
        assert!(pair[0].created_at() <= pair[1].created_at());
    }
}

#[tokio::test]
async fn delete_goes_to_the_creating_connection() {
    let backend = support::backend();
    let client = support::client(&backend, 3);

    let mut sessions = Vec::new();
    for _ in 0..3 {
        sessions.push(client.create_session().await.unwrap());
    }
    for _ in 0..7 {
        client.next_connection();
    }

    let owners: Vec<_> = sessions
        .iter()
        .map(|s| (s.id().to_string(), s.connection_index()))
        .collect();
    for session in sessions.into_iter().rev() {
        session.delete().await.unwrap();
    }

    let deletes = backend.calls_of(CallKind::DeleteSession);
    assert_eq!(deletes.len(), 3);
    for call in deletes {
        let name = call.session.expect("delete names its session");
        let (_, owner) = owners.iter().find(|(id, _)| *id == name).unwrap();
        assert_eq!(call.connection, *owner);
    }
    assert_eq!(backend.live_sessions(), 0);
}

#[tokio::test]
async fn batch_sessions_delete_on_their_own_connection() {
    let backend = support::backend();
    let client = support::client(&backend, 4);

    let outcome = support::batch(&client, 40, true).await;
    let owners: Vec<_> = outcome
        .sessions
        .iter()
        .map(|s| (s.id().to_string(), s.connection_index()))
        .collect();

    for session in outcome.sessions {
        session.delete().await.unwrap();
    }

    for call in backend.calls_of(CallKind::DeleteSession) {
        let name = call.session.unwrap();
        let (_, owner) = owners.iter().find(|(id, _)| *id == name).unwrap();
        assert_eq!(call.connection, *owner);
    }
    assert_eq!(backend.total_sessions_deleted(), 40);
}

#[test]
fn client_ids_count_per_database() {
    let ids = sessioncrab::ClientIdGenerator::new();
    let backend = MemoryBackend::new(support::DATABASE);

    let a = SessionClient::with_id_generator(SessionClientConfig::new("db"), backend.connect(1), &ids)
        .unwrap();
    let b = SessionClient::with_id_generator(
        SessionClientConfig::new("db-new"),
        backend.connect(1),
        &ids,
    )
    .unwrap();
    let c = SessionClient::with_id_generator(SessionClientConfig::new("db"), backend.connect(1), &ids)
        .unwrap();

    assert_eq!(a.id(), "client-1");
    assert_eq!(b.id(), "client-1");
    assert_eq!(c.id(), "client-2");
}
