//! Per-account identity and resource snapshot.
//!
//! The store is written only by the login path, the heartbeat path, the
//! notification handlers the client registers on its own dispatcher, and
//! [`Client::apply_totals`](crate::Client::apply_totals). Everyone else reads
//! cloned snapshots.

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;

use crate::proto::{BasicInfo, EXP_ITEM_ID, GOLD_ITEM_IDS, ItemChange, LoginReply};

/// Snapshot of the logged-in account.
///
/// Basic-info pushes use plain proto3 scalars, so a zero there cannot be told
/// apart from an absent field and is read as "unchanged". Gold or exp that
/// really drop to zero arrive through item pushes or reply totals, which
/// always overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub gid: i64,
    pub name: String,
    pub level: i64,
    pub gold: i64,
    pub exp: i64,
    /// Server clock minus local clock, in milliseconds.
    pub server_time_offset_ms: i64,
}

impl SessionState {
    /// True once a login reply has been applied.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.gid != 0
    }

    /// Current server time projected from the last sync.
    #[must_use]
    pub fn server_now_ms(&self) -> i64 {
        now_ms().saturating_add(self.server_time_offset_ms)
    }

    #[must_use]
    pub fn server_now_secs(&self) -> i64 {
        self.server_now_ms().div_euclid(1_000)
    }
}

/// Authoritative totals carried by an RPC reply (harvest, sell, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceTotals {
    pub gold: Option<i64>,
    pub exp: Option<i64>,
    pub level: Option<i64>,
}

pub(crate) struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self { state: RwLock::new(SessionState::default()) }
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn write<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    pub(crate) fn apply_login(&self, reply: &LoginReply) -> SessionState {
        self.write(|state| {
            if let Some(basic) = &reply.basic {
                state.gid = basic.gid;
                state.name.clone_from(&basic.name);
                state.level = basic.level;
                state.gold = basic.gold;
                state.exp = basic.exp;
            }
            if reply.time_now_millis > 0 {
                state.server_time_offset_ms = reply.time_now_millis - now_ms();
            }
            state.clone()
        })
    }

    /// Zero fields in a basic-info notification mean "unchanged"; see
    /// [`SessionState`].
    pub(crate) fn apply_basic(&self, basic: &BasicInfo) {
        let (old_level, new_level) = self.write(|state| {
            let old_level = state.level;
            if basic.level > 0 {
                state.level = basic.level;
            }
            if basic.gold > 0 {
                state.gold = basic.gold;
            }
            if basic.exp > 0 {
                state.exp = basic.exp;
            }
            if !basic.name.is_empty() {
                state.name.clone_from(&basic.name);
            }
            (old_level, state.level)
        });
        if new_level != old_level && old_level != 0 {
            info!(old_level, new_level, "session: level up");
        }
    }

    pub(crate) fn apply_items(&self, changes: &[ItemChange]) {
        self.write(|state| {
            for item in changes.iter().filter_map(|change| change.item.as_ref()) {
                if item.id == EXP_ITEM_ID {
                    state.exp = item.count;
                } else if GOLD_ITEM_IDS.contains(&item.id) {
                    state.gold = item.count;
                }
            }
        });
    }

    pub(crate) fn apply_totals(&self, totals: ResourceTotals) {
        self.write(|state| {
            if let Some(gold) = totals.gold {
                state.gold = gold;
            }
            if let Some(exp) = totals.exp {
                state.exp = exp;
            }
            if let Some(level) = totals.level {
                state.level = level;
            }
        });
    }

    pub(crate) fn sync_server_time(&self, server_ms: i64) {
        if server_ms <= 0 {
            return;
        }
        self.write(|state| state.server_time_offset_ms = server_ms - now_ms());
    }
}

/// Normalize a server timestamp to seconds; values above 1e12 are milliseconds.
#[must_use]
pub fn to_time_secs(value: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    if value > 1_000_000_000_000 {
        return value / 1_000;
    }
    value
}

pub(crate) fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
