use super::*;
use crate::element::{Element, ElementPatch};

#[test]
fn join_board_uses_event_name_and_camel_case_payload() {
    let board_id = Uuid::new_v4();
    let json: serde_json::Value =
        serde_json::from_str(&encode(&ClientMessage::JoinBoard { board_id }).expect("encode")).expect("json");

    assert_eq!(json["event"], "join-board");
    assert_eq!(json["data"]["boardId"], board_id.to_string());
}

#[test]
fn op_payload_is_the_bare_operation() {
    let board_id = Uuid::new_v4();
    let op = Operation::update(board_id, "E1", ElementPatch::stroke_width(6.0));
    let json = serde_json::to_value(ClientMessage::Op(op.clone())).expect("serialize");

    assert_eq!(json["event"], "op");
    assert_eq!(json["data"], serde_json::to_value(&op).expect("serialize op"));
}

#[test]
fn client_frames_decode() {
    let board_id = Uuid::new_v4();
    let text = format!(r#"{{"event":"cursor","data":{{"boardId":"{board_id}","x":1.5,"y":2}}}}"#);
    let msg = decode_client(&text).expect("decode");
    assert_eq!(msg, ClientMessage::Cursor(CursorPosition { board_id, x: 1.5, y: 2.0 }));

    let leave = format!(r#"{{"event":"leave-board","data":{{"boardId":"{board_id}"}}}}"#);
    assert_eq!(decode_client(&leave).expect("decode"), ClientMessage::LeaveBoard { board_id });
}

#[test]
fn server_op_frame_decodes_to_same_operation() {
    let board_id = Uuid::new_v4();
    let op = Operation::add(board_id, Element::rectangle("E2", 0.0, 0.0, 5.0, 5.0));
    let text = encode(&ServerMessage::Op(op.clone())).expect("encode");

    assert_eq!(decode_server(&text).expect("decode"), ServerMessage::Op(op));
}

#[test]
fn cursor_relay_adds_sender_id() {
    let board_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    let event = CursorPosition { board_id, x: 3.0, y: 4.0 }.from_client(client_id);
    let json = serde_json::to_value(ServerMessage::Cursor(event)).expect("serialize");

    assert_eq!(json["event"], "cursor");
    assert_eq!(json["data"]["clientId"], client_id.to_string());
    assert_eq!(json["data"]["x"], 3.0);
}

#[test]
fn unknown_event_is_a_decode_error() {
    let err = decode_client(r#"{"event":"teleport","data":{}}"#).expect_err("should fail");
    assert_eq!(err.error_code(), "E_INVALID_FRAME");
    assert!(!err.retryable());
}

#[test]
fn error_from_typed_error() {
    let err = decode_client("not json").expect_err("should fail");
    let ServerMessage::Error(payload) = ServerMessage::error_from(&err) else {
        panic!("expected error frame");
    };
    assert_eq!(payload.code, "E_INVALID_FRAME");
    assert!(payload.message.starts_with("failed to decode message"));
    assert!(!payload.retryable);
}

#[test]
fn op_payload_is_forwarded_byte_for_byte() {
    let data = r##"{"type":"add","boardId":"00000000-0000-0000-0000-000000000001","element":{"id":"E1","type":"rectangle","x":10,"y":0,"width":5,"height":5,"strokeColor":"#000","strokeWidth":1,"strokeDashPattern":[4,2],"rotation":45}}"##;
    let text = format!(r#"{{"event": "op", "data": {data}}}"#);

    let payload = frame_payload(&text).expect("payload");
    assert_eq!(payload.get(), data);

    let relayed = encode_op_payload(payload).expect("encode");
    assert_eq!(relayed, format!(r#"{{"event":"op","data":{data}}}"#));
    assert!(matches!(decode_server(&relayed).expect("decode"), ServerMessage::Op(Operation::Add { .. })));
}

#[test]
fn frame_without_data_has_no_payload() {
    let err = frame_payload(r#"{"event":"op"}"#).expect_err("should fail");
    assert_eq!(err.error_code(), "E_INVALID_FRAME");
}
