//! `LeastCountServer` builder and accept loop.
//!
//! This is the entry point for running the game server. It ties together
//! all the layers: transport → protocol → room registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use leastcount_protocol::JsonCodec;
use leastcount_room::{RoomConfig, RoomManager};

use crate::LeastCountError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::status::ServerStatus;
use crate::transport::{WebSocketConnection, WebSocketListener};

/// Shared server state passed to each connection handler task.
///
/// Every field is either immutable or internally synchronized, so it is
/// shared through a plain `Arc` with no outer lock.
pub(crate) struct ServerState {
    pub(crate) rooms: Arc<RoomManager>,
    pub(crate) codec: JsonCodec,
    pub(crate) status: ServerStatus,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use leastcount::LeastCountServer;
///
/// # async fn run() -> Result<(), leastcount::LeastCountError> {
/// let server = LeastCountServer::builder()
///     .bind("127.0.0.1:3001")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LeastCountServerBuilder {
    config: ServerConfig,
}

impl LeastCountServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Starts from an existing config, e.g. [`ServerConfig::from_env`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Drops connections that stay silent this long. `None` disables it.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the room registry configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.rooms = config;
        self
    }

    /// Binds the listener and builds the shared state.
    pub async fn build(self) -> Result<LeastCountServer, LeastCountError> {
        let listener = WebSocketListener::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Arc::new(RoomManager::new(self.config.rooms)),
            codec: JsonCodec,
            status: ServerStatus::new(),
            idle_timeout: self.config.idle_timeout,
        });

        Ok(LeastCountServer { listener, state })
    }
}

impl Default for LeastCountServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LeastCountServer {
    listener: WebSocketListener,
    state: Arc<ServerState>,
}

impl LeastCountServer {
    /// Creates a new builder.
    pub fn builder() -> LeastCountServerBuilder {
        LeastCountServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The room registry, for inspection.
    pub fn rooms(&self) -> Arc<RoomManager> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the server accept loop.
    ///
    /// Starts the stale-room sweeper, then accepts incoming connections and
    /// spawns a task per connection that upgrades it and runs the handler.
    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), LeastCountError> {
        let _sweeper = self.state.rooms.spawn_sweeper();
        tracing::info!(addr = ?self.local_addr().ok(), "Least Count server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn = match WebSocketConnection::upgrade(stream).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                        };
                        tracing::debug!(connection = %conn.id(), %peer, "accepted WebSocket connection");
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
