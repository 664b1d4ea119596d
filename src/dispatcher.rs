//! Server push fan-out.
//!
//! Events are decoded once into a [`PushEvent`] and handed to every handler
//! subscribed to its [`EventName`], in registration order, on the reader task.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use frames::Event;
use prost::Message;
use tracing::{debug, error, warn};

use crate::proto::{BasicInfo, BasicNotify, ItemChange, ItemNotify};

/// Push subscriber. Identity (for [`Client::off`](crate::Client::off)) is the
/// `Arc` pointer.
pub type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Notification names the game emits, keyed by `message_type` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Basic,
    Item,
    Lands,
    FriendApplicationReceived,
    FriendAdded,
    GoodsUnlock,
    TaskInfo,
    Other(String),
}

impl EventName {
    /// Map `gamepb.userpb.BasicNotify` to [`EventName::Basic`], and so on.
    #[must_use]
    pub fn from_message_type(message_type: &str) -> Self {
        let short = message_type.rsplit('.').next().unwrap_or(message_type);
        let short = short.strip_suffix("Notify").unwrap_or(short);
        match short {
            "Basic" => Self::Basic,
            "Item" => Self::Item,
            "Lands" => Self::Lands,
            "FriendApplicationReceived" => Self::FriendApplicationReceived,
            "FriendAdded" => Self::FriendAdded,
            "GoodsUnlock" => Self::GoodsUnlock,
            "TaskInfo" => Self::TaskInfo,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Item => f.write_str("item"),
            Self::Lands => f.write_str("lands"),
            Self::FriendApplicationReceived => f.write_str("friend_application_received"),
            Self::FriendAdded => f.write_str("friend_added"),
            Self::GoodsUnlock => f.write_str("goods_unlock"),
            Self::TaskInfo => f.write_str("task_info"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A decoded server push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Basic(BasicInfo),
    Items(Vec<ItemChange>),
    /// Any push the core does not model; the body is the raw notify payload.
    Opaque { name: EventName, message_type: String, body: Vec<u8> },
}

impl PushEvent {
    /// Decode the payloads the session engine understands. A body that fails
    /// to decode is passed through as [`PushEvent::Opaque`].
    #[must_use]
    pub fn decode(event: Event) -> Self {
        let name = EventName::from_message_type(&event.message_type);
        let decoded = match name {
            EventName::Basic => BasicNotify::decode(event.body.as_slice())
                .map(|notify| Self::Basic(notify.basic.unwrap_or_default())),
            EventName::Item => {
                ItemNotify::decode(event.body.as_slice()).map(|notify| Self::Items(notify.items))
            }
            _ => return Self::Opaque { name, message_type: event.message_type, body: event.body },
        };
        decoded.unwrap_or_else(|e| {
            warn!(message_type = %event.message_type, error = %e, "dispatcher: undecodable push body");
            Self::Opaque { name, message_type: event.message_type, body: event.body }
        })
    }

    #[must_use]
    pub fn name(&self) -> EventName {
        match self {
            Self::Basic(_) => EventName::Basic,
            Self::Items(_) => EventName::Item,
            Self::Opaque { name, .. } => name.clone(),
        }
    }
}

pub(crate) struct Dispatcher {
    account: String,
    handlers: Mutex<HashMap<EventName, Vec<Handler>>>,
}

impl Dispatcher {
    pub(crate) fn new(account: impl Into<String>) -> Self {
        Self { account: account.into(), handlers: Mutex::new(HashMap::new()) }
    }

    /// Returns `false` when this exact handler is already registered.
    pub(crate) fn on(&self, name: EventName, handler: Handler) -> bool {
        let mut handlers = self
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let list = handlers.entry(name).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// Returns `false` when the handler was not registered.
    pub(crate) fn off(&self, name: &EventName, handler: &Handler) -> bool {
        let mut handlers = self
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name);
        }
        removed
    }

    /// Run every handler for the event; returns how many ran to completion.
    pub(crate) fn dispatch(&self, event: &PushEvent) -> usize {
        let name = event.name();
        // Snapshot so handlers may call on/off without deadlocking.
        let snapshot = {
            let handlers = self
                .handlers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            handlers.get(&name).cloned().unwrap_or_default()
        };
        if snapshot.is_empty() {
            debug!(account = %self.account, event = %name, "dispatcher: no handlers");
            return 0;
        }

        let mut completed = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(account = %self.account, event = %name, panic = %message, "dispatcher: handler panicked");
                }
            }
        }
        completed
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self, name: &EventName) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
