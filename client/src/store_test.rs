use super::*;
use protocol::ElementPatch;
use std::sync::Mutex;

/// Sink that records every broadcast operation.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Operation>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<Operation> {
        self.sent.lock().expect("sink mutex").clone()
    }
}

impl OperationSink for RecordingSink {
    fn send_operation(&self, op: &Operation) {
        self.sent.lock().expect("sink mutex").push(op.clone());
    }
}

fn board() -> Uuid {
    Uuid::from_u128(0xB)
}

fn e1() -> Element {
    Element::rectangle("E1", 10.0, 10.0, 50.0, 50.0)
}

fn store() -> SyncStore<RecordingSink> {
    SyncStore::new(RecordingSink::default())
}

fn ids(store: &SyncStore<RecordingSink>) -> Vec<String> {
    store.elements().keys().map(ToString::to_string).collect()
}

#[test]
fn add_undo_redo_round_trip() {
    let mut store = store();

    store.apply_operation(Operation::add(board(), e1()), ApplyOptions::local());
    assert_eq!(ids(&store), vec!["E1"]);

    assert!(store.undo(board()));
    assert!(store.elements().is_empty());

    assert!(store.redo(board()));
    assert_eq!(store.element(&ElementId::from("E1")), Some(&e1()));
}

#[test]
fn update_undo_redo_round_trip() {
    let mut store = store();
    store.set_initial_elements(vec![e1()]);

    let patch = ElementPatch { stroke_width: Some(6.0), width: Some(80.0), ..ElementPatch::default() };
    store.apply_operation(Operation::update(board(), "E1", patch), ApplyOptions::local());
    let after_update = ElementMap::clone(store.elements());

    assert!(store.undo(board()));
    assert_eq!(store.element(&ElementId::from("E1")), Some(&e1()));

    assert!(store.redo(board()));
    assert_eq!(**store.elements(), after_update);
    assert!(store.can_undo());
    assert!(!store.can_redo());
}

#[test]
fn delete_undo_redo_round_trip() {
    let mut store = store();
    let styled = e1().with_stroke("#ff0000", 4.0).with_fill("#00ff00");
    store.set_initial_elements(vec![styled.clone(), Element::circle("C1", 0.0, 0.0, 3.0)]);

    assert!(store.delete_element(board(), "E1"));
    assert_eq!(ids(&store), vec!["C1"]);

    assert!(store.undo(board()));
    assert_eq!(store.element(&ElementId::from("E1")), Some(&styled));

    assert!(store.redo(board()));
    assert_eq!(ids(&store), vec!["C1"]);
    assert!(store.element(&ElementId::from("E1")).is_none());
}

#[test]
fn undo_is_lifo_across_update_and_delete() {
    let mut store = store();
    store.set_initial_elements(vec![e1()]);

    store.apply_operation(Operation::update(board(), "E1", ElementPatch::stroke_width(6.0)), ApplyOptions::local());
    store.delete_element(board(), "E1");
    assert!(store.elements().is_empty());

    store.undo(board());
    let restored = store.element(&ElementId::from("E1")).expect("re-added");
    assert!((restored.stroke_width - 6.0).abs() < f64::EPSILON);

    store.undo(board());
    let reverted = store.element(&ElementId::from("E1")).expect("still present");
    assert!((reverted.stroke_width - 2.0).abs() < f64::EPSILON);
    assert!(!store.can_undo());
}

#[test]
fn remote_operations_are_applied_but_never_recorded_or_echoed() {
    let mut store = store();
    let op = Operation::add(board(), Element::circle("E2", 0.0, 0.0, 4.0));

    assert!(store.apply_operation(op, ApplyOptions::remote()));
    assert_eq!(ids(&store), vec!["E2"]);
    assert!(!store.can_undo());
    assert!(store.sink().sent().is_empty());
}

#[test]
fn local_operations_are_broadcast_once() {
    let mut store = store();
    let op = Operation::add(board(), e1());
    store.apply_operation(op.clone(), ApplyOptions::local());
    assert_eq!(store.sink().sent(), vec![op]);
}

#[test]
fn undo_and_redo_broadcast_restamped_operations() {
    let mut store = store();
    let other_board = Uuid::from_u128(0xC);
    store.apply_operation(Operation::add(board(), e1()), ApplyOptions::local());

    store.undo(other_board);
    store.redo(other_board);

    let sent = store.sink().sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1], Operation::delete(other_board, "E1"));
    assert_eq!(sent[2], Operation::add(other_board, e1()));
}

#[test]
fn history_is_capped_and_evicts_oldest() {
    let mut store = store();
    for i in 0..(MAX_HISTORY + 10) {
        let el = Element::circle(format!("c{i}"), 0.0, 0.0, 1.0);
        store.apply_operation(Operation::add(board(), el), ApplyOptions::local());
    }
    assert_eq!(store.undo_depth(), MAX_HISTORY);

    while store.undo(board()) {}
    assert_eq!(store.redo_depth(), MAX_HISTORY);
    // The ten oldest adds fell off the stack and can no longer be undone.
    assert_eq!(store.elements().len(), 10);
    assert!(store.element(&ElementId::from("c0")).is_some());
    assert!(store.element(&ElementId::from("c10")).is_none());
}

#[test]
fn new_local_operation_clears_redo() {
    let mut store = store();
    store.apply_operation(Operation::add(board(), e1()), ApplyOptions::local());
    store.undo(board());
    assert!(store.can_redo());

    store.apply_operation(Operation::add(board(), Element::circle("E2", 0.0, 0.0, 1.0)), ApplyOptions::local());
    assert!(!store.can_redo());
}

#[test]
fn clear_is_applied_but_never_undoable() {
    let mut store = store();
    store.set_initial_elements(vec![e1()]);

    assert!(store.apply_operation(Operation::clear(board()), ApplyOptions::local()));
    assert!(store.elements().is_empty());
    assert!(!store.can_undo());
    assert_eq!(store.sink().sent(), vec![Operation::clear(board())]);
}

#[test]
fn update_on_missing_target_is_silent_noop() {
    let mut store = store();
    let before = Arc::clone(store.elements());
    let revision = store.revision();

    let changed = store.apply_operation(Operation::update(board(), "ghost", ElementPatch::stroke_width(3.0)), ApplyOptions::local());

    assert!(!changed);
    assert!(Arc::ptr_eq(&before, store.elements()));
    assert_eq!(store.revision(), revision);
    assert!(!store.can_undo());
}

#[test]
fn undo_with_empty_stack_is_noop() {
    let mut store = store();
    assert!(!store.undo(board()));
    assert!(!store.redo(board()));
    assert!(store.sink().sent().is_empty());
}

#[test]
fn stale_undo_degrades_silently() {
    let mut store = store();
    store.apply_operation(Operation::update(board(), "E1", ElementPatch::stroke_width(6.0)), ApplyOptions::local());
    assert!(!store.can_undo());

    store.set_initial_elements(vec![e1()]);
    store.apply_operation(Operation::update(board(), "E1", ElementPatch::stroke_width(6.0)), ApplyOptions::local());
    store.apply_operation(Operation::delete(board(), "E1"), ApplyOptions::remote());

    // The target vanished remotely; the inverse update finds nothing.
    let revision = store.revision();
    assert!(store.undo(board()));
    assert_eq!(store.revision(), revision);
    assert!(store.elements().is_empty());
}

#[test]
fn set_initial_elements_resets_history() {
    let mut store = store();
    store.apply_operation(Operation::add(board(), e1()), ApplyOptions::local());
    store.undo(board());

    store.set_initial_elements(vec![Element::circle("a", 0.0, 0.0, 1.0), Element::circle("b", 0.0, 0.0, 1.0)]);
    assert_eq!(ids(&store), vec!["a", "b"]);
    assert!(!store.can_undo());
    assert!(!store.can_redo());
}

#[test]
fn local_without_history_broadcasts_but_does_not_record() {
    let mut store = store();
    store.apply_operation(Operation::add(board(), e1()), ApplyOptions::local().with_history(false));
    assert!(!store.can_undo());
    assert_eq!(store.sink().sent().len(), 1);
}
