use super::*;
use crate::state::test_helpers::{
    StaticPermissions, assert_no_frame, connect, identity, recv_frame, test_app_state,
};

#[test]
fn parse_board_id_accepts_uuid_and_rejects_garbage() {
    let id = Uuid::new_v4();
    assert_eq!(parse_board_id(&id.to_string()), Ok(id));
    assert_eq!(parse_board_id("not-a-guid"), Err(HubError::InvalidId("not-a-guid".into())));
    assert_eq!(parse_board_id(""), Err(HubError::InvalidId(String::new())));
}

#[test]
fn error_codes_are_stable() {
    let board = Uuid::new_v4();
    assert_eq!(HubError::InvalidId("x".into()).error_code(), "E_INVALID_ID");
    assert_eq!(HubError::Malformed("x".into()).error_code(), "E_MALFORMED");
    assert_eq!(HubError::Forbidden(board).error_code(), "E_FORBIDDEN");
    assert_eq!(HubError::PermissionUnavailable(board).error_code(), "E_PERMISSION_UNAVAILABLE");
    assert_eq!(HubError::NotJoined(board).error_code(), "E_NOT_JOINED");
    assert!(HubError::PermissionUnavailable(board).retryable());
    assert!(!HubError::Forbidden(board).retryable());
}

#[tokio::test]
async fn join_registers_presence_and_notifies_others() {
    let board = Uuid::new_v4();
    let alice = identity("Alice");
    let bob = identity("Bob");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board, alice.user_id, PermissionLevel::Editor)
            .grant(board, bob.user_id, PermissionLevel::Viewer),
    );
    let (mut conn_a, mut rx_a) = connect(&state, alice.clone());
    let (mut conn_b, mut rx_b) = connect(&state, bob.clone());

    let roster_a = join_board(&state, &mut conn_a, board).await.unwrap();
    assert!(roster_a.is_empty());

    let roster_b = join_board(&state, &mut conn_b, board).await.unwrap();
    assert_eq!(roster_b, vec![PresenceEntry { user_id: alice.user_id, display_name: "Alice".into() }]);

    let joined = recv_frame(&mut rx_a).await;
    assert_eq!(joined.board_id, Some(board));
    assert_eq!(joined.event, Event::UserJoinedBoard { user_id: bob.user_id, display_name: "Bob".into() });
    // The joiner never hears its own join.
    assert_no_frame(&mut rx_b).await;

    assert!(conn_b.has_joined(board));
    assert!(state.groups.is_member(conn_b.id, board));
    assert!(state.presence.contains(board, bob.user_id));
}

#[tokio::test]
async fn join_below_viewer_is_forbidden_and_mutates_nothing() {
    let board = Uuid::new_v4();
    let state = test_app_state(StaticPermissions::new());
    let (mut conn, _rx) = connect(&state, identity("Mallory"));

    let err = join_board(&state, &mut conn, board).await.unwrap_err();

    assert_eq!(err, HubError::Forbidden(board));
    assert!(!conn.has_joined(board));
    assert!(!state.groups.is_member(conn.id, board));
    assert_eq!(state.presence.board_count(), 0);
}

#[tokio::test]
async fn join_fails_closed_when_permission_lookup_errors() {
    let board = Uuid::new_v4();
    let user = identity("Alice");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board, user.user_id, PermissionLevel::Owner)
            .failing(),
    );
    let (mut conn, _rx) = connect(&state, user);

    let err = join_board(&state, &mut conn, board).await.unwrap_err();

    assert_eq!(err, HubError::PermissionUnavailable(board));
    assert_eq!(state.presence.board_count(), 0);
    assert!(state.groups.members(board).is_empty());
}

#[tokio::test]
async fn repeat_join_rebroadcasts_without_duplicating_presence() {
    let board = Uuid::new_v4();
    let alice = identity("Alice");
    let bob = identity("Bob");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board, alice.user_id, PermissionLevel::Viewer)
            .grant(board, bob.user_id, PermissionLevel::Viewer),
    );
    let (mut conn_a, mut rx_a) = connect(&state, alice);
    let (mut conn_b, _rx_b) = connect(&state, bob.clone());
    join_board(&state, &mut conn_a, board).await.unwrap();

    join_board(&state, &mut conn_b, board).await.unwrap();
    join_board(&state, &mut conn_b, board).await.unwrap();

    for _ in 0..2 {
        let frame = recv_frame(&mut rx_a).await;
        assert!(matches!(frame.event, Event::UserJoinedBoard { user_id, .. } if user_id == bob.user_id));
    }
    assert_eq!(state.presence.roster(board).len(), 2);
}

#[tokio::test]
async fn leave_removes_presence_and_notifies_others() {
    let board = Uuid::new_v4();
    let alice = identity("Alice");
    let bob = identity("Bob");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board, alice.user_id, PermissionLevel::Viewer)
            .grant(board, bob.user_id, PermissionLevel::Viewer),
    );
    let (mut conn_a, mut rx_a) = connect(&state, alice);
    let (mut conn_b, mut rx_b) = connect(&state, bob.clone());
    join_board(&state, &mut conn_a, board).await.unwrap();
    join_board(&state, &mut conn_b, board).await.unwrap();
    let _ = recv_frame(&mut rx_a).await;

    leave_board(&state, &mut conn_b, board);

    let left = recv_frame(&mut rx_a).await;
    assert_eq!(left.event, Event::UserLeftBoard { user_id: bob.user_id, display_name: "Bob".into() });
    assert_no_frame(&mut rx_b).await;
    assert!(!state.presence.contains(board, bob.user_id));
    assert!(!state.groups.is_member(conn_b.id, board));
    assert!(!conn_b.has_joined(board));
}

#[tokio::test]
async fn leave_without_join_is_noop() {
    let board = Uuid::new_v4();
    let alice = identity("Alice");
    let state = test_app_state(StaticPermissions::new().grant(board, alice.user_id, PermissionLevel::Viewer));
    let (mut conn_a, mut rx_a) = connect(&state, alice);
    let (mut stranger, _rx) = connect(&state, identity("Stranger"));
    join_board(&state, &mut conn_a, board).await.unwrap();

    leave_board(&state, &mut stranger, board);
    leave_board(&state, &mut stranger, Uuid::new_v4());

    assert_no_frame(&mut rx_a).await;
    assert_eq!(state.presence.board_count(), 1);
    assert_eq!(state.presence.roster(board).len(), 1);
}
