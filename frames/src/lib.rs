//! Gateway envelope model and protobuf codec for the game websocket.
//!
//! This crate owns the wire representation used by every account session.
//! One websocket binary message carries exactly one protobuf `gatepb.Message`,
//! so the websocket message boundary is the frame delimiter. Payload bodies
//! stay opaque (`Vec<u8>`); only the gateway-level messages (envelope, event
//! wrapper, kickout notice) are decoded here.

use std::collections::HashMap;
use std::fmt;

use prost::Message;
use serde::{Deserialize, Serialize};

/// Error returned by [`decode_frame`] and [`Frame::classify`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf message.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The envelope has no `meta` header.
    #[error("frame has no meta header")]
    MissingMeta,
    /// The `message_type` integer on the wire does not map to a known [`MessageKind`].
    #[error("invalid message type: {0}")]
    InvalidMessageType(i32),
    /// A sequence number on the wire is negative.
    #[error("invalid sequence number: {0}")]
    InvalidSeq(i64),
    /// A route string is not of the form `Service.Method`.
    #[error("invalid service method: {0:?}")]
    InvalidServiceMethod(String),
}

/// Role of a frame in the gateway protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Client-initiated request carrying a fresh `client_seq`.
    Request,
    /// Reply to a request; `client_seq` echoes the request's.
    Response,
    /// Server push; the body is an `EventMessage`.
    Notify,
}

impl MessageKind {
    /// Convert kind into wire integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Notify => 3,
        }
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match value {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::Notify),
            other => Err(CodecError::InvalidMessageType(other)),
        }
    }
}

/// Fully qualified RPC route, e.g. `gamepb.userpb.UserService` + `Login`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceMethod {
    pub service: String,
    pub method: String,
}

impl ServiceMethod {
    #[must_use]
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self { service: service.into(), method: method.into() }
    }

    /// Parse `"Service.Method"`; the method is everything after the last dot.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidServiceMethod`] when either half is empty.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        match raw.rsplit_once('.') {
            Some((service, method)) if !service.is_empty() && !method.is_empty() => {
                Ok(Self::new(service, method))
            }
            _ => Err(CodecError::InvalidServiceMethod(raw.to_owned())),
        }
    }
}

impl fmt::Display for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.method)
    }
}

/// A single message on the gateway wire protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Service half of the route. Empty on most notify frames.
    pub service: String,
    /// Method half of the route.
    pub method: String,
    /// Request, response, or notify.
    pub kind: MessageKind,
    /// Correlation id. Zero on push frames.
    pub client_seq: u64,
    /// Server-side sequence counter; the client echoes its high-water mark.
    pub server_seq: u64,
    /// Non-zero on failed replies.
    pub error_code: i64,
    pub error_message: String,
    /// Envelope meta flags.
    pub metadata: HashMap<String, Vec<u8>>,
    /// Opaque payload.
    pub body: Vec<u8>,
}

/// Non-zero reply status carried in the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorStatus {
    pub code: i64,
    pub message: String,
}

/// Reply to a client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub seq: u64,
    pub route: ServiceMethod,
    pub outcome: Result<Vec<u8>, ErrorStatus>,
}

/// Server push unwrapped from its `EventMessage`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Fully qualified notification type, e.g. `gamepb.userpb.BasicNotify`.
    pub message_type: String,
    pub body: Vec<u8>,
}

/// Forced logout notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kickout {
    pub reason: i64,
    pub reason_message: String,
}

/// Closed set of inbound frame shapes, resolved once at the codec boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Reply(Reply),
    Event(Event),
    Kickout(Kickout),
    /// Server-initiated request; the client has no handler for these.
    Request(Frame),
}

impl Frame {
    /// Build a client request frame.
    #[must_use]
    pub fn request(route: &ServiceMethod, client_seq: u64, server_seq: u64, body: Vec<u8>) -> Self {
        Self {
            service: route.service.clone(),
            method: route.method.clone(),
            kind: MessageKind::Request,
            client_seq,
            server_seq,
            error_code: 0,
            error_message: String::new(),
            metadata: HashMap::new(),
            body,
        }
    }

    /// Build a successful response to `request`.
    #[must_use]
    pub fn reply_to(request: &Frame, server_seq: u64, body: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Response,
            server_seq,
            metadata: HashMap::new(),
            body,
            ..request.clone()
        }
    }

    /// Build a failed response to `request`.
    #[must_use]
    pub fn error_reply_to(request: &Frame, server_seq: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_message: message.into(),
            ..Self::reply_to(request, server_seq, Vec::new())
        }
    }

    /// Build a push frame wrapping an event.
    #[must_use]
    pub fn event(message_type: impl Into<String>, server_seq: u64, body: Vec<u8>) -> Self {
        let event = WireEvent { message_type: message_type.into(), body };
        Self {
            service: String::new(),
            method: String::new(),
            kind: MessageKind::Notify,
            client_seq: 0,
            server_seq,
            error_code: 0,
            error_message: String::new(),
            metadata: HashMap::new(),
            body: event.encode_to_vec(),
        }
    }

    /// Build a kickout push frame.
    #[must_use]
    pub fn kickout(reason: i64, reason_message: impl Into<String>, server_seq: u64) -> Self {
        let notice = WireKickout { reason, reason_message: reason_message.into() };
        Self::event(KICKOUT_MESSAGE_TYPE, server_seq, notice.encode_to_vec())
    }

    #[must_use]
    pub fn route(&self) -> ServiceMethod {
        ServiceMethod::new(self.service.clone(), self.method.clone())
    }

    /// Resolve the frame into its [`Inbound`] shape.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when a notify body is not a valid
    /// `EventMessage` or a kickout body is not a valid `KickoutNotify`.
    pub fn classify(self) -> Result<Inbound, CodecError> {
        match self.kind {
            MessageKind::Response => {
                let route = self.route();
                let outcome = if self.error_code == 0 {
                    Ok(self.body)
                } else {
                    Err(ErrorStatus { code: self.error_code, message: self.error_message })
                };
                Ok(Inbound::Reply(Reply { seq: self.client_seq, route, outcome }))
            }
            MessageKind::Notify => {
                let event = WireEvent::decode(self.body.as_slice())?;
                if event.message_type.contains("Kickout") {
                    let notice = WireKickout::decode(event.body.as_slice())?;
                    return Ok(Inbound::Kickout(Kickout {
                        reason: notice.reason,
                        reason_message: notice.reason_message,
                    }));
                }
                Ok(Inbound::Event(Event { message_type: event.message_type, body: event.body }))
            }
            MessageKind::Request => Ok(Inbound::Request(self)),
        }
    }
}

/// Notification type the gateway uses for forced logout.
pub const KICKOUT_MESSAGE_TYPE: &str = "gatepb.KickoutNotify";

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    frame_to_wire(frame).encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes, [`CodecError::MissingMeta`]
/// when the header is absent, [`CodecError::InvalidMessageType`] for an
/// unknown kind, and [`CodecError::InvalidSeq`] for negative sequence numbers.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireMessage::decode(bytes)?;
    wire_to_frame(wire)
}

#[allow(clippy::cast_possible_wrap)]
fn frame_to_wire(frame: &Frame) -> WireMessage {
    WireMessage {
        meta: Some(WireMeta {
            service_name: frame.service.clone(),
            method_name: frame.method.clone(),
            message_type: frame.kind.as_i32(),
            // Sequence numbers are kept below i64::MAX by the allocator.
            client_seq: frame.client_seq as i64,
            server_seq: frame.server_seq as i64,
            error_code: frame.error_code,
            error_message: frame.error_message.clone(),
            metadata: frame.metadata.clone(),
        }),
        body: frame.body.clone(),
    }
}

fn wire_to_frame(wire: WireMessage) -> Result<Frame, CodecError> {
    let meta = wire.meta.ok_or(CodecError::MissingMeta)?;
    Ok(Frame {
        service: meta.service_name,
        method: meta.method_name,
        kind: MessageKind::from_i32(meta.message_type)?,
        client_seq: seq_from_wire(meta.client_seq)?,
        server_seq: seq_from_wire(meta.server_seq)?,
        error_code: meta.error_code,
        error_message: meta.error_message,
        metadata: meta.metadata,
        body: wire.body,
    })
}

fn seq_from_wire(value: i64) -> Result<u64, CodecError> {
    u64::try_from(value).map_err(|_| CodecError::InvalidSeq(value))
}

#[derive(Clone, PartialEq, Message)]
struct WireMessage {
    #[prost(message, optional, tag = "1")]
    meta: Option<WireMeta>,
    #[prost(bytes = "vec", tag = "2")]
    body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
struct WireMeta {
    #[prost(string, tag = "1")]
    service_name: String,
    #[prost(string, tag = "2")]
    method_name: String,
    #[prost(int32, tag = "3")]
    message_type: i32,
    #[prost(int64, tag = "4")]
    client_seq: i64,
    #[prost(int64, tag = "5")]
    server_seq: i64,
    #[prost(int64, tag = "6")]
    error_code: i64,
    #[prost(string, tag = "7")]
    error_message: String,
    #[prost(map = "string, bytes", tag = "8")]
    metadata: HashMap<String, Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
struct WireEvent {
    #[prost(string, tag = "1")]
    message_type: String,
    #[prost(bytes = "vec", tag = "2")]
    body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
struct WireKickout {
    #[prost(int64, tag = "1")]
    reason: i64,
    #[prost(string, tag = "2")]
    reason_message: String,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
