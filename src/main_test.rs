use super::*;

#[test]
fn requested_shutdown_exits_cleanly() {
    assert!(session_outcome(None).is_ok());
}

#[test]
fn unrequested_disconnect_is_an_error() {
    let err = session_outcome(Some(DisconnectReason::Kicked("重复登录".to_owned()))).unwrap_err();
    assert!(matches!(err, MainError::Disconnected(DisconnectReason::Kicked(ref m)) if m == "重复登录"));
    assert!(err.to_string().contains("重复登录"), "{err}");

    let err = session_outcome(Some(DisconnectReason::HeartbeatLost { misses: 3 })).unwrap_err();
    assert!(matches!(err, MainError::Disconnected(DisconnectReason::HeartbeatLost { misses: 3 })));
}
