//! Per-account gateway client.
//!
//! ```text
//!  Disconnected ──connect──► Connecting ──socket open──► Authenticating
//!       ▲                                                     │ login ok
//!       │ heartbeat lost / socket lost / disconnect()         ▼
//!       └──────────────────────────────────────────────────  Online
//!                                                             │ kickout
//!                                                             ▼
//!                                                           Kicked
//! ```
//!
//! Each link owns a writer task (the only socket writer), a reader task (the
//! only socket reader, which decodes and dispatches frames in arrival order),
//! and once online a heartbeat task. Tasks hold a `Weak` reference to the
//! client and carry the generation of the link they belong to, so a stale
//! task can never tear down a newer link.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use frames::{Inbound, Kickout, ServiceMethod, decode_frame};
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{AccountContext, GatewayConfig, HeartbeatPolicy, redact_credential};
use crate::correlator::{Correlator, Outbound};
use crate::dispatcher::{Dispatcher, EventName, Handler, PushEvent};
use crate::error::{CallError, ConnectError, DisconnectReason, TransportError};
use crate::proto::{
    DeviceInfo, HeartbeatReply, HeartbeatRequest, LOGIN_SCENE_ID, LoginReply, LoginRequest, heartbeat_route,
    login_route,
};
use crate::session::{ResourceTotals, SessionState, SessionStore};
use crate::transport::{Connector, FrameSink, FrameStream, Socket};

/// Grace period for a clean websocket close on teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Online,
    /// Forced logout; stays here until the owner calls `connect` again.
    Kicked,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Online => "online",
            Self::Kicked => "kicked",
        };
        f.write_str(name)
    }
}

pub type DisconnectCallback = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub last_heartbeat_at: Option<Instant>,
    /// Automatic reconnect attempts over the client's lifetime.
    pub reconnect_attempts: u32,
    pub pending_calls: usize,
}

/// Cloneable handle to one account's gateway session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Link {
    generation: u64,
    outbound: Outbound,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    /// Abort reader/heartbeat. Dropping `outbound` lets the writer close the
    /// socket once in-flight sends drain.
    fn teardown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[derive(Default)]
struct Counters {
    last_heartbeat_at: Option<Instant>,
    reconnect_attempts: u32,
}

struct Inner {
    ctx: AccountContext,
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    correlator: Correlator,
    dispatcher: Dispatcher,
    session: Arc<SessionStore>,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Link>>,
    generation: AtomicU64,
    /// Serializes connect attempts, user-initiated or automatic.
    connect_lock: tokio::sync::Mutex<()>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    on_disconnect: Mutex<Option<DisconnectCallback>>,
    credential: Mutex<Option<String>>,
    counters: Mutex<Counters>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    #[must_use]
    pub fn new(ctx: AccountContext, config: GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        let session = Arc::new(SessionStore::new());
        let dispatcher = Dispatcher::new(ctx.account_id.clone());

        let basic_store = Arc::clone(&session);
        dispatcher.on(
            EventName::Basic,
            Arc::new(move |event: &PushEvent| {
                if let PushEvent::Basic(basic) = event {
                    basic_store.apply_basic(basic);
                }
            }),
        );
        let item_store = Arc::clone(&session);
        dispatcher.on(
            EventName::Item,
            Arc::new(move |event: &PushEvent| {
                if let PushEvent::Items(changes) = event {
                    item_store.apply_items(changes);
                }
            }),
        );

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Inner {
            correlator: Correlator::new(ctx.account_id.clone()),
            dispatcher,
            session,
            state,
            link: Mutex::new(None),
            generation: AtomicU64::new(0),
            connect_lock: tokio::sync::Mutex::new(()),
            reconnect: Mutex::new(None),
            on_disconnect: Mutex::new(None),
            credential: Mutex::new(None),
            counters: Mutex::new(Counters::default()),
            ctx,
            config,
            connector,
        };
        Self { inner: Arc::new(inner) }
    }

    #[must_use]
    pub fn account(&self) -> &AccountContext {
        &self.inner.ctx
    }

    /// Open the link, log in, and start the heartbeat.
    ///
    /// Socket-level failures are retried with backoff up to the configured
    /// attempt budget before surfacing.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::AlreadyActive`] when a link is already up or being set up.
    /// - [`ConnectError::Auth`] when the gateway rejects the credential.
    /// - [`ConnectError::Timeout`] when the login reply does not arrive in time.
    /// - [`ConnectError::Connection`] for socket failures after all retries.
    pub async fn connect(&self, credential: &str) -> Result<SessionState, ConnectError> {
        let inner = &self.inner;
        let _guard = inner.connect_lock.lock().await;
        let state = inner.current_state();
        if matches!(
            state,
            ConnectionState::Connecting | ConnectionState::Authenticating | ConnectionState::Online
        ) {
            return Err(ConnectError::AlreadyActive(state));
        }
        inner.cancel_reconnect();
        *lock(&inner.credential) = Some(credential.to_owned());
        inner.connect_with_retry(credential).await
    }

    /// Tear the link down without firing the disconnect callback.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.cancel_reconnect();
        let _guard = inner.connect_lock.lock().await;
        let link = lock(&inner.link).take();
        if let Some(link) = link {
            link.teardown();
        }
        let rejected = inner.correlator.reject_all();
        inner.set_state(ConnectionState::Disconnected);
        info!(account = %inner.ctx.account_id, rejected, "client: disconnected by owner");
    }

    /// Send a request with the default RPC timeout.
    ///
    /// # Errors
    ///
    /// See [`Client::call_with_timeout`].
    pub async fn call(&self, route: &ServiceMethod, body: Vec<u8>) -> Result<Vec<u8>, CallError> {
        self.call_with_timeout(route, body, self.inner.config.rpc_timeout).await
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotOnline`] when the client is not online.
    /// - [`CallError::Timeout`] when no reply arrives within `timeout`.
    /// - [`CallError::Rpc`] when the reply carries a non-zero error code.
    /// - [`CallError::ConnectionClosed`] when the link goes away first.
    pub async fn call_with_timeout(
        &self,
        route: &ServiceMethod,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, CallError> {
        let outbound = self.inner.online_outbound()?;
        self.inner.correlator.call(&outbound, route, body, timeout).await
    }

    /// Typed request: encode `request`, decode the reply as `Rep`.
    ///
    /// # Errors
    ///
    /// Everything [`Client::call`] returns, plus [`CallError::Decode`].
    pub async fn request<Req, Rep>(&self, route: &ServiceMethod, request: &Req) -> Result<Rep, CallError>
    where
        Req: Message,
        Rep: Message + Default,
    {
        let body = self.call(route, request.encode_to_vec()).await?;
        Rep::decode(body.as_slice())
            .map_err(|e| CallError::Decode { route: route.to_string(), message: e.to_string() })
    }

    /// Subscribe to a push. Returns `false` if this handler was already subscribed.
    pub fn on(&self, event: EventName, handler: Handler) -> bool {
        self.inner.dispatcher.on(event, handler)
    }

    /// Unsubscribe. Returns `false` if the handler was not subscribed.
    pub fn off(&self, event: &EventName, handler: &Handler) -> bool {
        self.inner.dispatcher.off(event, handler)
    }

    /// Register the callback for unrequested disconnects; replaces any previous one.
    pub fn on_disconnect(&self, callback: impl Fn(&DisconnectReason) + Send + Sync + 'static) {
        *lock(&self.inner.on_disconnect) = Some(Arc::new(callback));
    }

    #[must_use]
    pub fn session(&self) -> SessionState {
        self.inner.session.snapshot()
    }

    pub fn apply_totals(&self, totals: ResourceTotals) {
        self.inner.session.apply_totals(totals);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.current_state()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> ClientStats {
        let counters = lock(&self.inner.counters);
        ClientStats {
            last_heartbeat_at: counters.last_heartbeat_at,
            reconnect_attempts: counters.reconnect_attempts,
            pending_calls: self.inner.correlator.pending_len(),
        }
    }
}

impl Inner {
    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(account = %self.ctx.account_id, from = %previous, to = %next, "client: state change");
        }
    }

    fn online_outbound(&self) -> Result<Outbound, CallError> {
        let state = self.current_state();
        if state != ConnectionState::Online {
            return Err(CallError::NotOnline(state));
        }
        lock(&self.link)
            .as_ref()
            .map(|link| link.outbound.clone())
            .ok_or(CallError::NotOnline(state))
    }

    fn outbound_for(&self, generation: u64) -> Option<Outbound> {
        lock(&self.link)
            .as_ref()
            .filter(|link| link.generation == generation)
            .map(|link| link.outbound.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.link).as_ref().is_some_and(|link| link.generation == generation)
    }

    /// Take the link only if it is still the one `generation` refers to.
    fn take_link(&self, generation: u64) -> Option<Link> {
        let mut slot = lock(&self.link);
        if slot.as_ref().is_some_and(|link| link.generation == generation) {
            return slot.take();
        }
        None
    }

    fn attach_task(&self, generation: u64, task: JoinHandle<()>) {
        let mut slot = lock(&self.link);
        match slot.as_mut() {
            Some(link) if link.generation == generation => link.tasks.push(task),
            _ => task.abort(),
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(task) = lock(&self.reconnect).take() {
            task.abort();
        }
    }

    fn notify_disconnect(&self, reason: &DisconnectReason) {
        let callback = lock(&self.on_disconnect).clone();
        if let Some(callback) = callback {
            callback(reason);
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.config.reconnect.delay_for(attempt);
        let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(0);
        delay + Duration::from_millis(rand::rng().random_range(0..=spread))
    }

    async fn connect_with_retry(self: &Arc<Self>, credential: &str) -> Result<SessionState, ConnectError> {
        let max_attempts = self.config.reconnect.max_attempts;
        let mut retries = 0;
        loop {
            match self.establish(credential).await {
                Ok(state) => return Ok(state),
                Err(ConnectError::Connection(e))
                    if retries < max_attempts && self.current_state() != ConnectionState::Kicked =>
                {
                    retries += 1;
                    let delay = self.backoff(retries);
                    warn!(
                        account = %self.ctx.account_id,
                        attempt = retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "client: connect failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(account = %self.ctx.account_id, error = %e, "client: connect failed");
                    return Err(e);
                }
            }
        }
    }

    /// One connect attempt: open, log in, go online. Callers hold `connect_lock`.
    async fn establish(self: &Arc<Self>, credential: &str) -> Result<SessionState, ConnectError> {
        self.set_state(ConnectionState::Connecting);
        let url = self.config.gateway_url(self.ctx.platform, credential);
        info!(
            account = %self.ctx.account_id,
            platform = %self.ctx.platform,
            credential = %redact_credential(credential),
            "client: connecting"
        );

        let socket = match self.connector.open(&url).await {
            Ok(socket) => socket,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                if let TransportError::Rejected { status } = &e
                    && e.is_auth_rejection()
                {
                    return Err(ConnectError::Auth { code: i64::from(*status), message: e.to_string() });
                }
                return Err(e.into());
            }
        };

        let generation = self.install_link(socket);
        self.set_state(ConnectionState::Authenticating);

        let result = match self.login(generation).await {
            Ok(_) if !self.is_current(generation) => Err(ConnectError::Connection(TransportError::Closed)),
            other => other,
        };
        match result {
            Ok(state) => {
                self.set_state(ConnectionState::Online);
                let task = tokio::spawn(run_heartbeat(Arc::downgrade(self), generation, self.config.heartbeat));
                self.attach_task(generation, task);
                info!(
                    account = %self.ctx.account_id,
                    gid = state.gid,
                    name = %state.name,
                    level = state.level,
                    gold = state.gold,
                    "client: logged in"
                );
                Ok(state)
            }
            Err(e) => {
                if let Some(link) = self.take_link(generation) {
                    link.teardown();
                }
                self.correlator.reject_all();
                if self.current_state() != ConnectionState::Kicked {
                    self.set_state(ConnectionState::Disconnected);
                }
                Err(e)
            }
        }
    }

    fn install_link(self: &Arc<Self>, socket: Socket) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = self.correlator.open_link(tx);

        // Hold the slot while spawning so the reader cannot observe a missing link.
        let mut slot = lock(&self.link);
        if let Some(previous) = slot.take() {
            previous.teardown();
        }
        let weak = Arc::downgrade(self);
        tokio::spawn(run_writer(weak.clone(), generation, socket.sink, rx));
        let reader = tokio::spawn(run_reader(weak, generation, socket.stream));
        *slot = Some(Link { generation, outbound, tasks: vec![reader] });
        generation
    }

    async fn login(&self, generation: u64) -> Result<SessionState, ConnectError> {
        let outbound = self
            .outbound_for(generation)
            .ok_or(ConnectError::Connection(TransportError::Closed))?;
        let request = LoginRequest {
            sharer_id: 0,
            sharer_open_id: String::new(),
            device_info: Some(DeviceInfo {
                client_version: self.config.client_version.clone(),
                sys_software: self.config.device.sys_software.clone(),
                network: self.config.device.network.clone(),
                memory: self.config.device.memory.clone(),
                device_id: self.config.device.device_id.clone(),
            }),
            share_cfg_id: 0,
            scene_id: LOGIN_SCENE_ID.to_owned(),
        };

        let timeout = self.config.login_timeout;
        let body = match self.correlator.call(&outbound, &login_route(), request.encode_to_vec(), timeout).await {
            Ok(body) => body,
            Err(CallError::Timeout { .. }) => return Err(ConnectError::Timeout(timeout)),
            Err(CallError::Rpc { code, message, .. }) => return Err(ConnectError::Auth { code, message }),
            Err(_) => return Err(ConnectError::Connection(TransportError::Closed)),
        };
        let reply = LoginReply::decode(body.as_slice())?;
        Ok(self.session.apply_login(&reply))
    }

    async fn heartbeat_once(&self, generation: u64, timeout: Duration) -> Result<(), CallError> {
        let outbound = self.outbound_for(generation).ok_or(CallError::ConnectionClosed)?;
        let route = heartbeat_route();
        let request = HeartbeatRequest {
            gid: self.session.snapshot().gid,
            client_version: self.config.client_version.clone(),
        };
        let body = self.correlator.call(&outbound, &route, request.encode_to_vec(), timeout).await?;
        let reply = HeartbeatReply::decode(body.as_slice())
            .map_err(|e| CallError::Decode { route: route.to_string(), message: e.to_string() })?;
        self.session.sync_server_time(reply.server_time);
        lock(&self.counters).last_heartbeat_at = Some(Instant::now());
        Ok(())
    }

    /// Decode and route one inbound message on the reader task.
    fn handle_bytes(self: &Arc<Self>, generation: u64, bytes: &[u8], malformed: &mut u32) -> ControlFlow<()> {
        let inbound = match decode_frame(bytes) {
            Ok(frame) => {
                self.correlator.observe_server_seq(frame.server_seq);
                frame.classify()
            }
            Err(e) => Err(e),
        };
        let inbound = match inbound {
            Ok(inbound) => {
                *malformed = 0;
                inbound
            }
            Err(e) => {
                *malformed += 1;
                warn!(account = %self.ctx.account_id, error = %e, consecutive = *malformed, "client: malformed frame dropped");
                if *malformed >= self.config.malformed_frame_limit {
                    self.link_lost(generation, format!("{malformed} consecutive malformed frames"));
                    return ControlFlow::Break(());
                }
                return ControlFlow::Continue(());
            }
        };

        match inbound {
            Inbound::Reply(reply) => {
                self.correlator.resolve(reply);
            }
            Inbound::Event(event) => {
                self.dispatcher.dispatch(&PushEvent::decode(event));
            }
            Inbound::Kickout(notice) => {
                self.kick(generation, notice);
                return ControlFlow::Break(());
            }
            Inbound::Request(frame) => {
                warn!(account = %self.ctx.account_id, route = %frame.route(), "client: unexpected server request ignored");
            }
        }
        ControlFlow::Continue(())
    }

    fn kick(&self, generation: u64, notice: Kickout) {
        let Some(link) = self.take_link(generation) else {
            return;
        };
        link.teardown();
        let rejected = self.correlator.reject_all();
        self.set_state(ConnectionState::Kicked);
        warn!(
            account = %self.ctx.account_id,
            reason = notice.reason,
            reason_message = %notice.reason_message,
            rejected,
            "client: kicked by server"
        );
        self.notify_disconnect(&DisconnectReason::Kicked(notice.reason_message));
    }

    fn heartbeat_lost(&self, generation: u64, misses: u32) {
        let Some(link) = self.take_link(generation) else {
            return;
        };
        link.teardown();
        let rejected = self.correlator.reject_all();
        self.set_state(ConnectionState::Disconnected);
        error!(account = %self.ctx.account_id, misses, rejected, "client: heartbeat lost; disconnecting");
        self.notify_disconnect(&DisconnectReason::HeartbeatLost { misses });
    }

    /// Unexpected loss of the socket. Reconnects only if the link was online.
    fn link_lost(self: &Arc<Self>, generation: u64, cause: String) {
        let Some(link) = self.take_link(generation) else {
            return;
        };
        link.teardown();
        let rejected = self.correlator.reject_all();
        let was_online = self.current_state() == ConnectionState::Online;
        self.set_state(ConnectionState::Disconnected);
        warn!(account = %self.ctx.account_id, cause = %cause, rejected, was_online, "client: link lost");
        if was_online {
            self.spawn_reconnect(cause);
        }
    }

    fn spawn_reconnect(self: &Arc<Self>, cause: String) {
        let Some(credential) = lock(&self.credential).clone() else {
            return;
        };
        let task = tokio::spawn(run_reconnect(Arc::downgrade(self), credential, cause));
        if let Some(previous) = lock(&self.reconnect).replace(task) {
            previous.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(link) = link {
            link.teardown();
        }
        if let Some(task) = self.reconnect.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

async fn run_writer(weak: Weak<Inner>, generation: u64, mut sink: FrameSink, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = sink.send(bytes).await {
            if let Some(inner) = weak.upgrade() {
                inner.link_lost(generation, format!("write failed: {e}"));
            }
            return;
        }
    }
    // All senders dropped: the link was torn down.
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        debug!(generation, "client: websocket close timed out");
    }
}

async fn run_reader(weak: Weak<Inner>, generation: u64, mut stream: FrameStream) {
    let mut malformed = 0;
    loop {
        let item = stream.next().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match item {
            Some(Ok(bytes)) => {
                if inner.handle_bytes(generation, &bytes, &mut malformed).is_break() {
                    return;
                }
            }
            Some(Err(e)) => {
                inner.link_lost(generation, e.to_string());
                return;
            }
            None => {
                inner.link_lost(generation, "stream ended".to_owned());
                return;
            }
        }
    }
}

async fn run_heartbeat(weak: Weak<Inner>, generation: u64, policy: HeartbeatPolicy) {
    let mut ticker = tokio::time::interval_at(Instant::now() + policy.interval, policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut misses = 0;
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match inner.heartbeat_once(generation, policy.timeout).await {
            Ok(()) => {
                if misses > 0 {
                    debug!(account = %inner.ctx.account_id, misses, "client: heartbeat recovered");
                }
                misses = 0;
            }
            Err(e) => {
                misses += 1;
                warn!(account = %inner.ctx.account_id, misses, error = %e, "client: heartbeat failed");
                if misses >= policy.max_misses {
                    inner.heartbeat_lost(generation, misses);
                    return;
                }
            }
        }
    }
}

async fn run_reconnect(weak: Weak<Inner>, credential: String, cause: String) {
    let Some(policy) = weak.upgrade().map(|inner| inner.config.reconnect) else {
        return;
    };
    let mut last_error = cause;
    for attempt in 1..=policy.max_attempts {
        let Some(delay) = weak.upgrade().map(|inner| {
            lock(&inner.counters).reconnect_attempts += 1;
            inner.backoff(attempt)
        }) else {
            return;
        };
        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let guard = inner.connect_lock.lock().await;
        if inner.current_state() != ConnectionState::Disconnected {
            return;
        }
        info!(account = %inner.ctx.account_id, attempt, "client: reconnecting");
        match inner.establish(&credential).await {
            Ok(_) => {
                info!(account = %inner.ctx.account_id, attempt, "client: reconnected");
                return;
            }
            Err(ConnectError::Auth { code, message }) => {
                drop(guard);
                warn!(account = %inner.ctx.account_id, code, detail = %message, "client: reconnect rejected");
                inner.notify_disconnect(&DisconnectReason::ReconnectExhausted {
                    attempts: attempt,
                    last_error: format!("login rejected: code={code} {message}"),
                });
                return;
            }
            Err(e) => {
                warn!(account = %inner.ctx.account_id, attempt, error = %e, "client: reconnect attempt failed");
                last_error = e.to_string();
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        error!(account = %inner.ctx.account_id, attempts = policy.max_attempts, "client: reconnect exhausted");
        inner.notify_disconnect(&DisconnectReason::ReconnectExhausted { attempts: policy.max_attempts, last_error });
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
