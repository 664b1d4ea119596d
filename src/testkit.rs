//! In-memory gateway for lifecycle tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use frames::{Frame, decode_frame, encode_frame};
use prost::Message;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::proto::{BasicInfo, HeartbeatReply, LoginReply};
use crate::transport::{Connector, Socket};

pub(crate) struct MockConnector {
    links: mpsc::UnboundedSender<ServerLink>,
    failures: Mutex<VecDeque<TransportError>>,
    opens: AtomicUsize,
}

impl MockConnector {
    /// Make the next `open` fail with `error`.
    pub(crate) fn fail_next(&self, error: TransportError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<Socket, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (server_tx, client_rx) = mpsc::unbounded_channel::<Result<Vec<u8>, TransportError>>();

        let sink = futures_util::sink::unfold(client_tx, |tx, bytes: Vec<u8>| async move {
            tx.send(bytes).map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        });
        let stream = futures_util::stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let link = ServerLink { url: url.to_owned(), inbound: server_rx, outbound: Some(server_tx) };
        self.links.send(link).map_err(|_| TransportError::Closed)?;
        Ok(Socket { sink: Box::pin(sink), stream: Box::pin(stream) })
    }
}

/// Accept side of the mock gateway.
pub(crate) struct MockGateway {
    links: mpsc::UnboundedReceiver<ServerLink>,
}

impl MockGateway {
    pub(crate) async fn accept(&mut self) -> ServerLink {
        self.links.recv().await.unwrap()
    }

    pub(crate) fn try_accept(&mut self) -> Option<ServerLink> {
        self.links.try_recv().ok()
    }
}

pub(crate) fn mock_gateway() -> (Arc<MockConnector>, MockGateway) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = MockConnector { links: tx, failures: Mutex::new(VecDeque::new()), opens: AtomicUsize::new(0) };
    (Arc::new(connector), MockGateway { links: rx })
}

/// Server end of one accepted link.
pub(crate) struct ServerLink {
    pub(crate) url: String,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: Option<mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>>,
}

impl ServerLink {
    /// Next frame written by the client, or `None` once the client closed.
    pub(crate) async fn recv_frame(&mut self) -> Option<Frame> {
        let bytes = self.inbound.recv().await?;
        Some(decode_frame(&bytes).unwrap())
    }

    pub(crate) fn send(&self, frame: &Frame) {
        self.send_raw(encode_frame(frame));
    }

    pub(crate) fn send_raw(&self, bytes: Vec<u8>) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(Ok(bytes));
        }
    }

    /// End the client's read stream.
    pub(crate) fn close(&mut self) {
        self.outbound = None;
    }

    /// Answer the login request with `basic`.
    pub(crate) async fn complete_login(&mut self, basic: BasicInfo) -> Frame {
        let request = self.recv_frame().await.unwrap();
        assert_eq!(request.method, "Login");
        let reply = LoginReply { basic: Some(basic), time_now_millis: 0 };
        self.send(&Frame::reply_to(&request, 1, reply.encode_to_vec()));
        request
    }

    /// Answer the next heartbeat with `server_time`.
    pub(crate) async fn answer_heartbeat(&mut self, server_time: i64) -> Frame {
        let request = self.recv_frame().await.unwrap();
        assert_eq!(request.method, "Heartbeat");
        let reply = HeartbeatReply { server_time };
        self.send(&Frame::reply_to(&request, 0, reply.encode_to_vec()));
        request
    }

    /// Answer the next heartbeat with an error status.
    pub(crate) async fn refuse_heartbeat(&mut self, code: i64) -> Frame {
        let request = self.recv_frame().await.unwrap();
        assert_eq!(request.method, "Heartbeat");
        self.send(&Frame::error_reply_to(&request, 0, code, "heartbeat refused"));
        request
    }

    /// Answer the next heartbeat with a body that does not decode.
    pub(crate) async fn garble_heartbeat(&mut self) -> Frame {
        let request = self.recv_frame().await.unwrap();
        assert_eq!(request.method, "Heartbeat");
        self.send(&Frame::reply_to(&request, 0, vec![0xff]));
        request
    }
}

pub(crate) fn farmer() -> BasicInfo {
    BasicInfo { gid: 42, name: "farmer".to_owned(), level: 5, exp: 300, gold: 1000 }
}
