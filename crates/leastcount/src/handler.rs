//! Per-connection handler: request routing and broadcast delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task waits on two sources at once:
//!   1. frames from the socket, decoded into [`Request`]s and answered with
//!      a [`Reply`] carrying the same id
//!   2. [`RoomEvent`]s pushed by the room actor the connection is seated in
//!
//! Everything the client sees goes through one [`Outbox`], so replies and
//! broadcasts share a single `seq` counter and arrive in the order they
//! were produced.

use std::sync::Arc;
use std::time::{Duration, Instant};

use leastcount_game::{ConnectionId, RoomCode};
use leastcount_protocol::{
    ClientMessage, Codec, Envelope, Reply, ReplyData, Request, RoomEvent, ServerPayload,
};
use leastcount_room::{EventSender, GameAction, RoomError};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::LeastCountError;
use crate::server::ServerState;
use crate::transport::{FrameSink, FrameStream, TransportError, WebSocketConnection};

/// Drop guard that releases a connection's seat when the handler exits.
///
/// The seat itself stays in its room for a rejoin; only the connection
/// binding goes. Since `Drop` is synchronous, the registry call runs in a
/// fire-and-forget task.
struct ConnectionGuard {
    connection: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.status.client_disconnected();
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.rooms.disconnect(connection).await;
        });
    }
}

/// Writes envelopes to the client.
struct Outbox<'a, C: Codec> {
    sink: FrameSink,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<C: Codec> Outbox<'_, C> {
    async fn send(&mut self, payload: ServerPayload) -> Result<(), LeastCountError> {
        let envelope = Envelope::new(
            next_seq(&mut self.seq),
            self.start.elapsed().as_millis() as u64,
            payload,
        );
        let bytes = self.codec.encode(&envelope)?;
        self.sink.send(bytes).await?;
        Ok(())
    }

    async fn reply(&mut self, id: u64, reply: Reply) -> Result<(), LeastCountError> {
        self.send(ServerPayload::Reply { id, reply }).await
    }
}

/// What the socket produced while we waited.
enum Inbound {
    Frame(Vec<u8>),
    Closed,
    Idle,
    Failed(TransportError),
}

/// Just enough of a request to answer a malformed one.
#[derive(Deserialize)]
struct RequestId {
    id: u64,
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), LeastCountError> {
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let (sink, mut stream) = conn.split();
    state.status.client_connected();
    let _guard = ConnectionGuard {
        connection,
        state: Arc::clone(&state),
    };

    let (events, mut inbox) = mpsc::unbounded_channel::<RoomEvent>();
    let mut out = Outbox {
        sink,
        codec: &state.codec,
        seq: 1,
        start: Instant::now(),
    };

    loop {
        tokio::select! {
            inbound = next_frame(&mut stream, state.idle_timeout) => match inbound {
                Inbound::Frame(data) => {
                    handle_frame(&state, connection, &events, &mut out, &data).await?;
                }
                Inbound::Closed => {
                    tracing::info!(%connection, "connection closed cleanly");
                    break;
                }
                Inbound::Idle => {
                    tracing::info!(%connection, "connection idle, closing");
                    break;
                }
                Inbound::Failed(e) => {
                    tracing::debug!(%connection, error = %e, "recv error");
                    break;
                }
            },
            // `events` lives as long as this loop, so the channel never
            // closes under us.
            Some(event) = inbox.recv() => {
                tracing::trace!(%connection, event = event.name(), "delivering room event");
                out.send(ServerPayload::Event(event)).await?;
            }
        }
    }

    if let Err(e) = out.sink.close().await {
        tracing::debug!(%connection, error = %e, "close failed");
    }
    // _guard drops here → seat released.
    Ok(())
}

async fn next_frame(stream: &mut FrameStream, idle: Option<Duration>) -> Inbound {
    let result = match idle {
        Some(limit) => match tokio::time::timeout(limit, stream.recv()).await {
            Ok(result) => result,
            Err(_) => return Inbound::Idle,
        },
        None => stream.recv().await,
    };
    match result {
        Ok(Some(data)) => Inbound::Frame(data),
        Ok(None) => Inbound::Closed,
        Err(e) => Inbound::Failed(e),
    }
}

/// Decodes one frame, runs it, and sends the reply.
///
/// Frames that don't even carry a request id are dropped.
async fn handle_frame<C: Codec>(
    state: &ServerState,
    connection: ConnectionId,
    events: &EventSender,
    out: &mut Outbox<'_, C>,
    data: &[u8],
) -> Result<(), LeastCountError> {
    let request: Envelope<Request> = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            match state.codec.decode::<Envelope<RequestId>>(data) {
                Ok(env) => {
                    tracing::debug!(%connection, error = %e, "malformed request");
                    out.reply(env.payload.id, Reply::error(400, e.to_string()))
                        .await?;
                }
                Err(_) => {
                    tracing::debug!(%connection, error = %e, "failed to decode envelope");
                }
            }
            return Ok(());
        }
    };

    let Request { id, message } = request.payload;
    let kind = message.name();
    let reply = match dispatch(state, connection, events, message).await {
        Ok(data) => Reply::Ok(data),
        Err(e) => {
            tracing::debug!(%connection, request = kind, error = %e, "request rejected");
            Reply::error(e.code(), e.to_string())
        }
    };
    out.reply(id, reply).await
}

/// Routes one client message to the registry.
async fn dispatch(
    state: &ServerState,
    connection: ConnectionId,
    events: &EventSender,
    message: ClientMessage,
) -> Result<ReplyData, RoomError> {
    let rooms = &state.rooms;
    match message {
        ClientMessage::CreateRoom {
            player_name,
            settings,
        } => {
            let seated = rooms.create_room(
                player_name,
                settings.unwrap_or_default(),
                connection,
                events.clone(),
            )?;
            Ok(ReplyData::RoomCreated {
                room_code: seated.room_code,
                player_id: seated.player_id,
                player_token: seated.player_token,
                state: seated.state,
            })
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => {
            let code = RoomCode::parse(&room_code);
            let seated = rooms
                .join_room(&code, player_name, connection, events.clone())
                .await?;
            Ok(ReplyData::Joined {
                room_code: seated.room_code,
                player_id: seated.player_id,
                player_token: seated.player_token,
                state: seated.state,
            })
        }

        ClientMessage::RejoinRoom {
            room_code,
            player_token,
        } => {
            let code = RoomCode::parse(&room_code);
            let seated = rooms
                .rejoin_room(&code, player_token, connection, events.clone())
                .await?;
            Ok(ReplyData::Rejoined {
                room_code: seated.room_code,
                player_id: seated.player_id,
                state: seated.state,
            })
        }

        ClientMessage::StartGame => act(state, connection, GameAction::StartGame).await,
        ClientMessage::DrawCard { source } => {
            let outcome = rooms.act(connection, GameAction::DrawCard(source)).await?;
            Ok(match outcome.drawn {
                Some(card) => ReplyData::CardDrawn { card },
                None => ReplyData::Ack,
            })
        }
        ClientMessage::DiscardCards { card_ids } => {
            act(state, connection, GameAction::DiscardCards(card_ids)).await
        }
        ClientMessage::CallShow => act(state, connection, GameAction::CallShow).await,
        ClientMessage::StartNextRound => {
            act(state, connection, GameAction::StartNextRound).await
        }

        ClientMessage::LeaveRoom => {
            rooms.leave_room(connection).await?;
            Ok(ReplyData::Ack)
        }

        ClientMessage::Health => Ok(state.status.health()),
        ClientMessage::Stats => Ok(ReplyData::Stats(state.status.stats(rooms))),
    }
}

async fn act(
    state: &ServerState,
    connection: ConnectionId,
    action: GameAction,
) -> Result<ReplyData, RoomError> {
    state.rooms.act(connection, action).await?;
    Ok(ReplyData::Ack)
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
