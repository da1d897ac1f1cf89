//! WebSocket transport built on `tokio-tungstenite`.
//!
//! The listener only accepts TCP; the WebSocket upgrade runs inside the
//! connection's own task so a slow handshake never stalls the accept loop.
//! An upgraded connection is split into a [`FrameSink`] and a
//! [`FrameStream`] so one task can wait on the socket while still pushing
//! room broadcasts out.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use leastcount_game::ConnectionId;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listener or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade was refused or malformed.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] tokio_tungstenite::tungstenite::Error),

    /// Outgoing frames are JSON text; anything else is a bug upstream.
    #[error("outgoing frame is not UTF-8")]
    NotText,
}

/// Accepts raw TCP connections for later upgrade.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        self.listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)
    }
}

/// An upgraded WebSocket connection with a fresh [`ConnectionId`].
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl WebSocketConnection {
    /// Runs the WebSocket handshake on an accepted socket.
    pub async fn upgrade(stream: TcpStream) -> Result<Self, TransportError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(TransportError::Handshake)?;
        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Self { id, ws })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn split(self) -> (FrameSink, FrameStream) {
        let (sink, stream) = self.ws.split();
        (FrameSink { sink }, FrameStream { stream })
    }
}

/// Write half of a connection.
pub struct FrameSink {
    sink: SplitSink<WsStream, Message>,
}

impl FrameSink {
    /// Sends one encoded message as a text frame.
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        let text = String::from_utf8(data).map_err(|_| TransportError::NotText)?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(TransportError::SendFailed)
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(TransportError::SendFailed)
    }
}

/// Read half of a connection.
pub struct FrameStream {
    stream: SplitStream<WsStream>,
}

impl FrameStream {
    /// Receives the next data frame, text or binary.
    ///
    /// Returns `Ok(None)` when the peer closes. Control frames are skipped;
    /// tungstenite answers pings on its own.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }
}
