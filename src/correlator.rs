//! Request/response correlation over one gateway link.
//!
//! ```text
//!   call(route, body)                         reader task
//!        │                                        │
//!        ▼                                        ▼
//!   allocate seq ──► pending: HashMap<seq,   ◄── resolve(Reply { seq, .. })
//!        │                 oneshot::Sender>
//!        ▼
//!   encode request ──► outbound (writer task)
//!        │
//!        ▼
//!   await reply | timeout | reject_all
//! ```
//!
//! Replies are matched strictly by `client_seq`, never by arrival order. The
//! lock guards only map and counter updates and is never held across an await.
//!
//! Each link gets an epoch from [`Correlator::open_link`]. Once
//! [`Correlator::reject_all`] closes it, or a newer link replaces it, calls
//! carrying that epoch fail with [`CallError::ConnectionClosed`] before they
//! register.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use frames::{Frame, Reply, ServiceMethod, encode_frame};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::CallError;

/// Writer channel of one link, tagged with the link's epoch.
#[derive(Clone)]
pub(crate) struct Outbound {
    epoch: u64,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

type Outcome = Result<Vec<u8>, CallError>;

/// Highest id before wrapping back to 1; the wire carries ids as signed 64-bit.
const SEQ_CEILING: u64 = i64::MAX.unsigned_abs();

struct PendingCall {
    route: ServiceMethod,
    created_at: Instant,
    resolver: oneshot::Sender<Outcome>,
}

struct State {
    epoch: u64,
    open: bool,
    next_seq: u64,
    server_seq: u64,
    seq_ceiling: u64,
    pending: HashMap<u64, PendingCall>,
}

pub(crate) struct Correlator {
    account: String,
    state: Mutex<State>,
}

impl Correlator {
    pub(crate) fn new(account: impl Into<String>) -> Self {
        Self::with_ceiling(account.into(), SEQ_CEILING)
    }

    #[cfg(test)]
    pub(crate) fn with_seq_ceiling(account: impl Into<String>, ceiling: u64) -> Self {
        Self::with_ceiling(account.into(), ceiling)
    }

    fn with_ceiling(account: String, seq_ceiling: u64) -> Self {
        Self {
            account,
            state: Mutex::new(State {
                epoch: 0,
                open: false,
                next_seq: 1,
                server_seq: 0,
                seq_ceiling,
                pending: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Start a new link. Calls still pending on an older link are rejected
    /// and the echoed server sequence starts again from 0.
    pub(crate) fn open_link(&self, tx: mpsc::UnboundedSender<Vec<u8>>) -> Outbound {
        let (epoch, stale) = {
            let mut state = self.lock();
            state.epoch += 1;
            state.open = true;
            state.server_seq = 0;
            let stale: Vec<PendingCall> = state.pending.drain().map(|(_, call)| call).collect();
            (state.epoch, stale)
        };
        if !stale.is_empty() {
            debug!(account = %self.account, epoch, count = stale.len(), "correlator: rejected calls from previous link");
        }
        for call in stale {
            let _ = call.resolver.send(Err(CallError::ConnectionClosed));
        }
        Outbound { epoch, tx }
    }

    /// Allocate an id and register its waiter. Returns the id, the server
    /// sequence to echo, and the receiver.
    ///
    /// Fails when `outbound` belongs to a closed or replaced link.
    fn begin(
        &self,
        outbound: &Outbound,
        route: &ServiceMethod,
    ) -> Result<(u64, u64, oneshot::Receiver<Outcome>), CallError> {
        let mut state = self.lock();
        if !state.open || state.epoch != outbound.epoch {
            return Err(CallError::ConnectionClosed);
        }
        let seq = loop {
            let candidate = state.next_seq;
            state.next_seq = if candidate >= state.seq_ceiling { 1 } else { candidate + 1 };
            if !state.pending.contains_key(&candidate) {
                break candidate;
            }
        };
        let (tx, rx) = oneshot::channel();
        state.pending.insert(
            seq,
            PendingCall { route: route.clone(), created_at: Instant::now(), resolver: tx },
        );
        Ok((seq, state.server_seq, rx))
    }

    /// Send one request and wait for its reply.
    ///
    /// Dropping the returned future removes the pending entry.
    pub(crate) async fn call(
        &self,
        outbound: &Outbound,
        route: &ServiceMethod,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, CallError> {
        struct PendingGuard<'a> {
            correlator: &'a Correlator,
            seq: u64,
            active: bool,
        }

        impl PendingGuard<'_> {
            fn disarm(&mut self) {
                self.active = false;
            }
        }

        impl Drop for PendingGuard<'_> {
            fn drop(&mut self) {
                if self.active && self.correlator.lock().pending.remove(&self.seq).is_some() {
                    debug!(account = %self.correlator.account, seq = self.seq, "correlator: pending call dropped");
                }
            }
        }

        let (seq, server_seq, rx) = self.begin(outbound, route).inspect_err(|_| {
            debug!(account = %self.account, %route, "correlator: link closed before send");
        })?;
        let mut guard = PendingGuard { correlator: self, seq, active: true };

        let frame = Frame::request(route, seq, server_seq, body);
        if outbound.tx.send(encode_frame(&frame)).is_err() {
            debug!(account = %self.account, seq, %route, "correlator: writer gone before send");
            return Err(CallError::ConnectionClosed);
        }
        debug!(account = %self.account, seq, %route, "correlator: request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => {
                guard.disarm();
                outcome
            }
            Ok(Err(_closed)) => {
                guard.disarm();
                Err(CallError::ConnectionClosed)
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(account = %self.account, seq, %route, timeout_ms, "correlator: call timed out");
                Err(CallError::Timeout { route: route.to_string(), seq, timeout_ms })
            }
        }
    }

    /// Deliver a reply to its waiter. Returns `false` for late or unknown ids.
    pub(crate) fn resolve(&self, reply: Reply) -> bool {
        let Some(call) = self.lock().pending.remove(&reply.seq) else {
            debug!(account = %self.account, seq = reply.seq, route = %reply.route, "correlator: late or unknown reply dropped");
            return false;
        };

        let elapsed_ms = call.created_at.elapsed().as_millis();
        let outcome = reply.outcome.map_err(|status| {
            debug!(account = %self.account, seq = reply.seq, route = %call.route, code = status.code, "correlator: error reply");
            CallError::Rpc { route: call.route.to_string(), code: status.code, message: status.message }
        });
        debug!(account = %self.account, seq = reply.seq, route = %call.route, elapsed_ms, "correlator: reply matched");
        // The caller may have been dropped already; nothing to do then.
        let _ = call.resolver.send(outcome);
        true
    }

    /// Close the current link and fail every outstanding call with
    /// [`CallError::ConnectionClosed`].
    pub(crate) fn reject_all(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut state = self.lock();
            state.open = false;
            state.pending.drain().map(|(_, call)| call).collect()
        };
        let count = drained.len();
        for call in drained {
            let _ = call.resolver.send(Err(CallError::ConnectionClosed));
        }
        if count > 0 {
            debug!(account = %self.account, count, "correlator: rejected pending calls");
        }
        count
    }

    /// Record a server sequence number; only the high-water mark is kept.
    pub(crate) fn observe_server_seq(&self, seq: u64) {
        let mut state = self.lock();
        if seq > state.server_seq {
            state.server_seq = seq;
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

#[cfg(test)]
#[path = "correlator_test.rs"]
mod tests;
