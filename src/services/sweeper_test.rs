use super::*;
use crate::services::board::join_board;
use crate::services::permission::PermissionLevel;
use crate::state::test_helpers::{
    StaticPermissions, assert_no_frame, connect, identity, recv_frame, test_app_state,
};
use tokio::sync::mpsc;

#[tokio::test]
async fn disconnect_cleans_every_board_and_notifies_remaining_members() {
    let boards = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let leaver = identity("Alice");
    let mut perms = StaticPermissions::new();
    for board in boards {
        perms = perms.grant(board, leaver.user_id, PermissionLevel::Editor);
    }

    // One watcher per board.
    let watchers: Vec<_> = boards.iter().map(|_| identity("Watcher")).collect();
    for (board, watcher) in boards.iter().zip(&watchers) {
        perms = perms.grant(*board, watcher.user_id, PermissionLevel::Viewer);
    }
    let state = test_app_state(perms);

    let mut receivers: Vec<mpsc::Receiver<Frame>> = Vec::new();
    for (board, watcher) in boards.iter().zip(&watchers) {
        let (mut conn, rx) = connect(&state, watcher.clone());
        join_board(&state, &mut conn, *board).await.unwrap();
        receivers.push(rx);
    }

    let (mut conn, mut rx) = connect(&state, leaver.clone());
    for board in boards {
        join_board(&state, &mut conn, board).await.unwrap();
    }
    for rx in &mut receivers {
        let _ = recv_frame(rx).await;
    }

    let report = sweep_disconnect(&state, &conn);

    let mut expected = boards.to_vec();
    expected.sort();
    assert_eq!(report.boards, expected);
    assert_eq!(report.failed_notifications, 0);
    for (board, rx) in boards.iter().zip(&mut receivers) {
        assert!(!state.presence.contains(*board, leaver.user_id));
        assert!(!state.groups.is_member(conn.id, *board));
        let left = recv_frame(rx).await;
        assert_eq!(left.board_id, Some(*board));
        assert_eq!(left.event, Event::UserLeftBoard { user_id: leaver.user_id, display_name: "Alice".into() });
    }
    assert_no_frame(&mut rx).await;
}

#[tokio::test]
async fn sweep_of_never_joined_connection_is_noop() {
    let state = test_app_state(StaticPermissions::new());
    let (conn, _rx) = connect(&state, identity("Ghost"));

    let report = sweep_disconnect(&state, &conn);

    assert_eq!(report, SweepReport::default());
    assert_eq!(state.presence.board_count(), 0);
}

#[tokio::test]
async fn sweep_continues_past_failed_notifications() {
    let (board_x, board_y) = (Uuid::new_v4(), Uuid::new_v4());
    let leaver = identity("Alice");
    let gone = identity("Gone");
    let watcher = identity("Watcher");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board_x, leaver.user_id, PermissionLevel::Viewer)
            .grant(board_y, leaver.user_id, PermissionLevel::Viewer)
            .grant(board_x, gone.user_id, PermissionLevel::Viewer)
            .grant(board_y, watcher.user_id, PermissionLevel::Viewer),
    );

    // The only peer on X has a dead receiver.
    let (mut gone_conn, gone_rx) = connect(&state, gone);
    join_board(&state, &mut gone_conn, board_x).await.unwrap();
    drop(gone_rx);
    let (mut watcher_conn, mut watcher_rx) = connect(&state, watcher);
    join_board(&state, &mut watcher_conn, board_y).await.unwrap();

    let (mut conn, _rx) = connect(&state, leaver.clone());
    join_board(&state, &mut conn, board_x).await.unwrap();
    join_board(&state, &mut conn, board_y).await.unwrap();
    let _ = recv_frame(&mut watcher_rx).await;

    let report = sweep_disconnect(&state, &conn);

    assert_eq!(report.boards.len(), 2);
    assert_eq!(report.failed_notifications, 1);
    assert!(!state.presence.contains(board_x, leaver.user_id));
    assert!(!state.presence.contains(board_y, leaver.user_id));
    assert!(matches!(recv_frame(&mut watcher_rx).await.event, Event::UserLeftBoard { .. }));
}

#[tokio::test]
async fn rejoin_after_sweep_starts_from_scratch() {
    let board = Uuid::new_v4();
    let alice = identity("Alice");
    let state = test_app_state(StaticPermissions::new().grant(board, alice.user_id, PermissionLevel::Viewer));
    let (mut first, _rx1) = connect(&state, alice.clone());
    join_board(&state, &mut first, board).await.unwrap();
    sweep_disconnect(&state, &first);
    state.groups.unregister(first.id);

    let (mut second, _rx2) = connect(&state, alice.clone());
    assert!(!state.presence.contains(board, alice.user_id));
    join_board(&state, &mut second, board).await.unwrap();

    assert_eq!(state.groups.members(board), std::collections::HashSet::from([second.id]));
    assert_eq!(state.presence.roster(board).len(), 1);
}

#[tokio::test]
async fn sweep_leaves_other_tabs_group_membership_alone() {
    let (board_x, board_y) = (Uuid::new_v4(), Uuid::new_v4());
    let alice = identity("Alice");
    let state = test_app_state(
        StaticPermissions::new()
            .grant(board_x, alice.user_id, PermissionLevel::Viewer)
            .grant(board_y, alice.user_id, PermissionLevel::Viewer),
    );
    let (mut first_tab, _rx1) = connect(&state, alice.clone());
    let (mut second_tab, _rx2) = connect(&state, alice.clone());
    join_board(&state, &mut first_tab, board_x).await.unwrap();
    join_board(&state, &mut second_tab, board_y).await.unwrap();

    let report = sweep_disconnect(&state, &first_tab);

    // Presence is per user, so both boards are cleared.
    assert_eq!(report.boards.len(), 2);
    assert!(!state.presence.contains(board_y, alice.user_id));
    assert!(!state.groups.is_member(first_tab.id, board_x));
    assert!(state.groups.is_member(second_tab.id, board_y));
}
