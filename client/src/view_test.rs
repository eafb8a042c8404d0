use std::time::Duration;

use tokio::time::timeout;

use protocol::{ClientMessage, CursorEvent, Element, ElementId, ElementPatch, ServerMessage};

use super::*;
use crate::test_support::{FakeConnection, FakeRelay};

const WAIT: Duration = Duration::from_millis(1500);

fn board_json(id: Uuid, title: &str) -> String {
    serde_json::json!({
        "id": id,
        "title": title,
        "elements": [Element::rectangle("E1", 10.0, 10.0, 50.0, 50.0)],
        "updatedAt": "2025-01-01T00:00:00Z",
    })
    .to_string()
}

async fn next(view: &mut BoardView) -> ViewEvent {
    timeout(WAIT, view.next_event()).await.expect("timed out waiting for view event").expect("view ended")
}

/// Open a view and pump until both the snapshot and the welcome arrived.
async fn open_ready(relay: &mut FakeRelay, config: &ClientConfig, board_id: Uuid) -> (BoardView, FakeConnection) {
    relay.respond("GET", &format!("/api/v1/boards/{board_id}"), 200, board_json(board_id, "Retro"));
    let mut view = BoardView::open(config, board_id).await.expect("open view");
    let mut conn = relay.accept().await;
    assert_eq!(conn.recv().await, ClientMessage::JoinBoard { board_id });

    let (mut loaded, mut welcomed) = (false, false);
    while !(loaded && welcomed) {
        match next(&mut view).await {
            ViewEvent::SnapshotLoaded { .. } => loaded = true,
            ViewEvent::Welcome { client_id } => {
                assert_eq!(client_id, conn.client_id);
                welcomed = true;
            }
            other => panic!("unexpected event while opening: {other:?}"),
        }
    }
    (view, conn)
}

#[tokio::test]
async fn open_loads_snapshot_into_store() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (view, _conn) = open_ready(&mut relay, &config, board_id).await;

    assert_eq!(view.title(), Some("Retro"));
    assert_eq!(view.store().elements().len(), 1);
    assert!(view.store().element(&ElementId::from("E1")).is_some());
    assert!(!view.store().can_undo());
}

#[tokio::test]
async fn missing_board_reports_snapshot_failure() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let mut view = BoardView::open(&relay.config(), board_id).await.expect("open view");
    let _conn = relay.accept().await;

    loop {
        match next(&mut view).await {
            ViewEvent::SnapshotFailed(ApiError::NotFound(id)) => {
                assert_eq!(id, board_id);
                break;
            }
            ViewEvent::Welcome { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(view.store().elements().is_empty());
}

#[tokio::test]
async fn remote_operation_is_applied_without_history() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (mut view, mut conn) = open_ready(&mut relay, &config, board_id).await;

    conn.send(&ServerMessage::Op(Operation::update(board_id, "E1", ElementPatch::stroke_width(6.0))))
        .await;

    let ViewEvent::RemoteOperation { kind, changed } = next(&mut view).await else {
        panic!("expected remote operation");
    };
    assert_eq!(kind, "update");
    assert!(changed);
    let element = view.store().element(&ElementId::from("E1")).expect("element");
    assert!((element.stroke_width - 6.0).abs() < f64::EPSILON);
    assert!(!view.store().can_undo());
    conn.assert_silent(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn operations_for_other_boards_are_ignored() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (mut view, mut conn) = open_ready(&mut relay, &config, board_id).await;

    conn.send(&ServerMessage::Op(Operation::clear(Uuid::new_v4()))).await;
    conn.send(&ServerMessage::Op(Operation::delete(board_id, "E1"))).await;

    let ViewEvent::RemoteOperation { kind, .. } = next(&mut view).await else {
        panic!("expected remote operation");
    };
    assert_eq!(kind, "delete");
    assert!(view.store().elements().is_empty());
}

#[tokio::test]
async fn local_edit_is_broadcast_and_undoable() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (mut view, mut conn) = open_ready(&mut relay, &config, board_id).await;

    let circle = Element::circle("C1", 5.0, 5.0, 2.0);
    assert!(view.apply_local(Operation::add(Uuid::nil(), circle.clone())));
    assert_eq!(conn.recv().await, ClientMessage::Op(Operation::add(board_id, circle)));
    assert!(view.store().can_undo());

    assert!(view.undo());
    assert_eq!(conn.recv().await, ClientMessage::Op(Operation::delete(board_id, "C1")));
    assert_eq!(view.store().elements().len(), 1);
}

#[tokio::test]
async fn own_cursor_echo_is_ignored() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (mut view, mut conn) = open_ready(&mut relay, &config, board_id).await;
    let peer = Uuid::new_v4();

    conn.send(&ServerMessage::Cursor(CursorEvent { board_id, x: 1.0, y: 1.0, client_id: conn.client_id }))
        .await;
    conn.send(&ServerMessage::Cursor(CursorEvent { board_id, x: 2.0, y: 3.0, client_id: peer }))
        .await;

    let ViewEvent::CursorMoved { client_id } = next(&mut view).await else {
        panic!("expected cursor event");
    };
    assert_eq!(client_id, peer);
    assert_eq!(view.cursors().len(), 1);
    let info = view.cursors().get(&peer).expect("peer cursor");
    assert!((info.y - 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn idle_cursors_expire_on_cleanup_tick() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = ClientConfig { cursor_ttl: Duration::from_millis(50), ..relay.config() };
    let (mut view, mut conn) = open_ready(&mut relay, &config, board_id).await;
    let peer = Uuid::new_v4();

    conn.send(&ServerMessage::Cursor(CursorEvent { board_id, x: 0.0, y: 0.0, client_id: peer }))
        .await;
    assert!(matches!(next(&mut view).await, ViewEvent::CursorMoved { .. }));

    let event = timeout(Duration::from_secs(3), view.next_event())
        .await
        .expect("cleanup tick never fired")
        .expect("view ended");
    let ViewEvent::CursorsExpired(expired) = event else {
        panic!("expected expiry, got {event:?}");
    };
    assert_eq!(expired, vec![peer]);
    assert!(view.cursors().is_empty());
}

#[tokio::test]
async fn close_leaves_board_and_disconnects() {
    let mut relay = FakeRelay::start().await;
    let board_id = Uuid::new_v4();
    let config = relay.config();
    let (view, mut conn) = open_ready(&mut relay, &config, board_id).await;

    view.close().await.expect("close");

    assert_eq!(conn.recv_or_close().await, Some(ClientMessage::LeaveBoard { board_id }));
    assert_eq!(conn.recv_or_close().await, None);
}

#[test]
fn snapshot_for_closed_view_is_discarded() {
    let board_id = Uuid::new_v4();
    let alive = AtomicBool::new(false);
    let (tx, mut rx) = oneshot::channel();

    assert!(!deliver_if_alive(&alive, tx, Err(ApiError::NotFound(board_id))));
    assert!(rx.try_recv().is_err());

    alive.store(true, Ordering::Release);
    let (tx, mut rx) = oneshot::channel();
    assert!(deliver_if_alive(&alive, tx, Err(ApiError::NotFound(board_id))));
    assert!(matches!(rx.try_recv(), Ok(Err(ApiError::NotFound(_)))));
}
