//! Game messages the session engine itself has to understand.
//!
//! Everything else on the wire is opaque bytes handed to game loops; only
//! login, heartbeat, and the resource notifications that feed
//! [`SessionState`](crate::SessionState) are modeled here.

use frames::ServiceMethod;
use prost::Message;

pub const USER_SERVICE: &str = "gamepb.userpb.UserService";

/// Item ids whose counts are authoritative gold totals.
pub const GOLD_ITEM_IDS: [i64; 2] = [1, 1001];
/// Item id whose count is the authoritative experience total.
pub const EXP_ITEM_ID: i64 = 1101;

/// Scene id the official client reports on login.
pub const LOGIN_SCENE_ID: &str = "1256";

#[must_use]
pub fn login_route() -> ServiceMethod {
    ServiceMethod::new(USER_SERVICE, "Login")
}

#[must_use]
pub fn heartbeat_route() -> ServiceMethod {
    ServiceMethod::new(USER_SERVICE, "Heartbeat")
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceInfo {
    #[prost(string, tag = "1")]
    pub client_version: String,
    #[prost(string, tag = "2")]
    pub sys_software: String,
    #[prost(string, tag = "3")]
    pub network: String,
    #[prost(string, tag = "4")]
    pub memory: String,
    #[prost(string, tag = "5")]
    pub device_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct LoginRequest {
    #[prost(int64, tag = "1")]
    pub sharer_id: i64,
    #[prost(string, tag = "2")]
    pub sharer_open_id: String,
    #[prost(message, optional, tag = "3")]
    pub device_info: Option<DeviceInfo>,
    #[prost(int64, tag = "4")]
    pub share_cfg_id: i64,
    #[prost(string, tag = "5")]
    pub scene_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct BasicInfo {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub level: i64,
    #[prost(int64, tag = "4")]
    pub exp: i64,
    #[prost(int64, tag = "5")]
    pub gold: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct LoginReply {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<BasicInfo>,
    #[prost(int64, tag = "2")]
    pub time_now_millis: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct HeartbeatRequest {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub client_version: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct HeartbeatReply {
    #[prost(int64, tag = "1")]
    pub server_time: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BasicNotify {
    #[prost(message, optional, tag = "1")]
    pub basic: Option<BasicInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Item {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ItemChange {
    #[prost(message, optional, tag = "1")]
    pub item: Option<Item>,
    #[prost(int64, tag = "2")]
    pub delta: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ItemNotify {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<ItemChange>,
}
