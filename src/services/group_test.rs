use super::*;
use crate::protocol::Event;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

fn ping(board_id: Uuid) -> Frame {
    Frame::for_board(board_id, Event::TaskDragEnded { task_id: "t1".into() })
}

#[test]
fn group_name_uses_board_prefix() {
    let board_id = Uuid::new_v4();
    assert_eq!(group_name(board_id), format!("Board_{board_id}"));
}

#[tokio::test]
async fn send_to_group_excludes_caller() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let (tx_c, mut rx_c) = mpsc::channel(8);
    router.register(a, tx_a);
    router.register(b, tx_b);
    router.register(c, tx_c);
    for id in [a, b, c] {
        router.add_to_group(id, board_id);
    }

    let delivery = router.send_to_group(board_id, &ping(board_id), Some(a));

    assert_eq!(delivery, Delivery { delivered: 2, failed: 0 });
    assert_channel_has_frame(&mut rx_b).await;
    assert_channel_has_frame(&mut rx_c).await;
    assert_channel_empty(&mut rx_a).await;
}

#[tokio::test]
async fn send_to_group_without_exclusion_includes_everyone() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let a = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    router.register(a, tx_a);
    router.add_to_group(a, board_id);

    let delivery = router.send_to_group(board_id, &ping(board_id), None);

    assert_eq!(delivery.delivered, 1);
    assert_eq!(assert_channel_has_frame(&mut rx_a).await.board_id, Some(board_id));
}

#[tokio::test]
async fn send_to_group_only_reaches_that_board() {
    let router = GroupRouter::new();
    let (board_x, board_y) = (Uuid::new_v4(), Uuid::new_v4());
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    router.register(a, tx_a);
    router.register(b, tx_b);
    router.add_to_group(a, board_x);
    router.add_to_group(b, board_y);

    router.send_to_group(board_x, &ping(board_x), None);

    assert_channel_has_frame(&mut rx_a).await;
    assert_channel_empty(&mut rx_b).await;
}

#[test]
fn send_to_unknown_group_is_noop() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    assert_eq!(router.send_to_group(board_id, &ping(board_id), None), Delivery::default());
}

#[tokio::test]
async fn full_or_closed_members_do_not_block_others() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let (full, closed, healthy) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let (tx_full, _rx_full) = mpsc::channel(1);
    tx_full.try_send(ping(board_id)).expect("prefill should fit");
    let (tx_closed, rx_closed) = mpsc::channel(8);
    drop(rx_closed);
    let (tx_healthy, mut rx_healthy) = mpsc::channel(8);

    router.register(full, tx_full);
    router.register(closed, tx_closed);
    router.register(healthy, tx_healthy);
    for id in [full, closed, healthy] {
        router.add_to_group(id, board_id);
    }

    let delivery = router.send_to_group(board_id, &ping(board_id), None);

    assert_eq!(delivery, Delivery { delivered: 1, failed: 2 });
    assert_channel_has_frame(&mut rx_healthy).await;
}

#[test]
fn send_to_connection_reports_errors() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let missing = Uuid::new_v4();
    assert_eq!(
        router.send_to_connection(missing, ping(board_id)),
        Err(SendError::NotConnected(missing))
    );

    let closed = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    router.register(closed, tx);
    assert_eq!(router.send_to_connection(closed, ping(board_id)), Err(SendError::Closed(closed)));
}

#[test]
fn remove_from_group_drops_empty_groups() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let a = Uuid::new_v4();
    router.add_to_group(a, board_id);
    assert!(router.is_member(a, board_id));

    router.remove_from_group(a, board_id);
    router.remove_from_group(a, board_id);

    assert!(!router.is_member(a, board_id));
    assert!(router.members(board_id).is_empty());
}

#[tokio::test]
async fn unregistered_member_counts_as_failed() {
    let router = GroupRouter::new();
    let board_id = Uuid::new_v4();
    let a = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    router.register(a, tx);
    router.add_to_group(a, board_id);
    router.unregister(a);

    let delivery = router.send_to_group(board_id, &ping(board_id), None);
    assert_eq!(delivery, Delivery { delivered: 0, failed: 1 });
}
