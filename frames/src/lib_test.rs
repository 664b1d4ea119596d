use super::*;

fn login_route() -> ServiceMethod {
    ServiceMethod::new("gamepb.userpb.UserService", "Login")
}

fn sample_request() -> Frame {
    let mut frame = Frame::request(&login_route(), 7, 3, vec![1, 2, 3]);
    frame.metadata.insert("trace".to_owned(), vec![0xab]);
    frame
}

#[test]
fn message_kind_numeric_mapping_matches_wire() {
    assert_eq!(MessageKind::Request.as_i32(), 1);
    assert_eq!(MessageKind::Response.as_i32(), 2);
    assert_eq!(MessageKind::Notify.as_i32(), 3);
}

#[test]
fn message_kind_from_wire_rejects_unknown_value() {
    let err = MessageKind::from_i32(0).expect_err("kind should be invalid");
    assert!(matches!(err, CodecError::InvalidMessageType(0)));
}

#[test]
fn encode_decode_round_trip_preserves_frame() {
    let frame = sample_request();
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode should succeed");
    assert_eq!(decoded, frame);
}

#[test]
fn round_trip_preserves_large_payloads() {
    for size in [0_usize, 1, 4 * 1024, 64 * 1024, 1024 * 1024] {
        #[allow(clippy::cast_possible_truncation)]
        let body = (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let frame = Frame::request(&login_route(), 42, 0, body.clone());
        let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
        assert_eq!(decoded.body, body, "payload of {size} bytes");
        assert_eq!(decoded.client_seq, 42);
        assert_eq!(decoded.route(), login_route());
    }
}

#[test]
fn round_trip_preserves_max_sequence() {
    #[allow(clippy::cast_sign_loss)]
    let max = i64::MAX as u64;
    let frame = Frame::request(&login_route(), max, max, Vec::new());
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.client_seq, max);
    assert_eq!(decoded.server_seq, max);
}

#[test]
fn decode_frame_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_truncated_bytes() {
    let bytes = encode_frame(&sample_request());
    let err = decode_frame(&bytes[..bytes.len() - 2]).expect_err("truncated should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_missing_meta() {
    let wire = WireMessage { meta: None, body: vec![9] };
    let err = decode_frame(&wire.encode_to_vec()).expect_err("meta should be required");
    assert!(matches!(err, CodecError::MissingMeta));
}

#[test]
fn decode_frame_rejects_unknown_message_type() {
    let mut wire = frame_to_wire(&sample_request());
    if let Some(meta) = wire.meta.as_mut() {
        meta.message_type = 9;
    }
    let err = decode_frame(&wire.encode_to_vec()).expect_err("type should fail");
    assert!(matches!(err, CodecError::InvalidMessageType(9)));
}

#[test]
fn decode_frame_rejects_negative_sequence() {
    let mut wire = frame_to_wire(&sample_request());
    if let Some(meta) = wire.meta.as_mut() {
        meta.client_seq = -5;
    }
    let err = decode_frame(&wire.encode_to_vec()).expect_err("seq should fail");
    assert!(matches!(err, CodecError::InvalidSeq(-5)));
}

#[test]
fn service_method_parses_on_last_dot() {
    let route = ServiceMethod::parse("gamepb.plantpb.PlantService.Harvest").expect("parse");
    assert_eq!(route.service, "gamepb.plantpb.PlantService");
    assert_eq!(route.method, "Harvest");
    assert_eq!(route.to_string(), "gamepb.plantpb.PlantService.Harvest");
}

#[test]
fn service_method_rejects_missing_halves() {
    for raw in ["", "NoDot", ".Login", "UserService."] {
        let err = ServiceMethod::parse(raw).expect_err("should fail");
        assert!(matches!(err, CodecError::InvalidServiceMethod(_)), "{raw}");
    }
}

#[test]
fn classify_success_reply() {
    let request = sample_request();
    let reply = Frame::reply_to(&request, 11, vec![4, 5]);
    let decoded = decode_frame(&encode_frame(&reply)).expect("decode");
    assert_eq!(decoded.server_seq, 11);

    let Inbound::Reply(reply) = decoded.classify().expect("classify") else {
        panic!("expected reply");
    };
    assert_eq!(reply.seq, 7);
    assert_eq!(reply.route, login_route());
    assert_eq!(reply.outcome, Ok(vec![4, 5]));
}

#[test]
fn classify_error_reply() {
    let reply = Frame::error_reply_to(&sample_request(), 1, 1_000_017, "code expired");
    let Inbound::Reply(reply) = reply.classify().expect("classify") else {
        panic!("expected reply");
    };
    assert_eq!(
        reply.outcome,
        Err(ErrorStatus { code: 1_000_017, message: "code expired".to_owned() })
    );
}

#[test]
fn classify_event_unwraps_event_message() {
    let frame = Frame::event("gamepb.userpb.BasicNotify", 2, vec![8, 1]);
    assert_eq!(frame.kind, MessageKind::Notify);
    assert_eq!(frame.client_seq, 0);

    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    let inbound = decoded.classify().expect("classify");
    assert_eq!(
        inbound,
        Inbound::Event(Event { message_type: "gamepb.userpb.BasicNotify".to_owned(), body: vec![8, 1] })
    );
}

#[test]
fn classify_kickout_carries_reason() {
    let frame = Frame::kickout(3, "重复登录", 5);
    let inbound = decode_frame(&encode_frame(&frame))
        .expect("decode")
        .classify()
        .expect("classify");
    assert_eq!(inbound, Inbound::Kickout(Kickout { reason: 3, reason_message: "重复登录".to_owned() }));
}

#[test]
fn classify_notify_with_garbage_body_fails() {
    let mut frame = Frame::event("x", 0, Vec::new());
    frame.body = vec![0xff, 0xff, 0xff];
    let err = frame.classify().expect_err("body should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn classify_server_request_is_passed_through() {
    let frame = sample_request();
    let inbound = frame.clone().classify().expect("classify");
    assert_eq!(inbound, Inbound::Request(frame));
}
