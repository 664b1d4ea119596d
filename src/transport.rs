//! Socket seam between the session engine and the websocket library.
//!
//! A [`Connector`] opens one link and hands back a frame sink and a frame
//! stream. Each item is one complete binary websocket message. Production code
//! uses [`WsConnector`]; tests plug in an in-memory gateway.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{ORIGIN, USER_AGENT};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<Vec<u8>, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Both halves of an open link.
pub struct Socket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] when the gateway refuses the
    /// upgrade, and other variants for network failures.
    async fn open(&self, url: &str) -> Result<Socket, TransportError>;
}

/// Websocket connector presenting the official client's headers.
pub struct WsConnector {
    user_agent: String,
    origin: String,
}

impl WsConnector {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), origin: config.origin.clone() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Socket, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);
        headers.insert(ORIGIN, header_value(&self.origin)?);

        let (ws, response) = connect_async(request).await.map_err(|error| match error {
            tungstenite::Error::Http(response) => {
                TransportError::Rejected { status: response.status().as_u16() }
            }
            other => TransportError::Connect(Box::new(other)),
        })?;
        debug!(status = response.status().as_u16(), "transport: websocket upgraded");

        let (write, read) = ws.split();
        let sink = write
            .with(|bytes: Vec<u8>| async move { Ok::<_, tungstenite::Error>(Message::Binary(bytes.into())) })
            .sink_map_err(|e| TransportError::Send(e.to_string()));
        let stream = read.filter_map(|message| async move {
            match message {
                Ok(Message::Binary(bytes)) => Some(Ok(bytes.to_vec())),
                Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Connect(Box::new(e)))),
            }
        });

        Ok(Socket { sink: Box::pin(sink), stream: Box::pin(stream) })
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(raw).map_err(|e| TransportError::InvalidRequest(e.to_string()))
}
