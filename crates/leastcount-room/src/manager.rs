//! Room registry: creates rooms, routes connections to them, and evicts
//! the stale ones.
//!
//! Both maps are concurrent (`DashMap`), so the registry is shared behind an
//! `Arc` with no outer lock. Handles are cloned out of the map before any
//! `.await`; no map guard is ever held across a suspension point.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use leastcount_game::{ConnectionId, GamePhase, GameRoom, GameSettings, NewPlayer, PlayerToken, RoomCode};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::room::spawn_room;
use crate::{
    ActionOutcome, Departure, EventSender, GameAction, RoomConfig, RoomError, RoomHandle, RoomInfo,
    Seated,
};

/// Longest player name kept; longer names are cut.
pub const MAX_NAME_LEN: usize = 24;

/// All live rooms and which room each connection is seated in.
pub struct RoomManager {
    rooms: DashMap<RoomCode, RoomHandle>,

    /// A connection holds at most one seat.
    connections: DashMap<ConnectionId, RoomCode>,

    config: RoomConfig,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with the caller as host and spawns its actor.
    ///
    /// Codes are sampled until an unused one comes up; the check and the
    /// insert happen under the same map entry, so two creators can't claim
    /// the same code.
    pub fn create_room(
        &self,
        host_name: impl Into<String>,
        settings: GameSettings,
        connection: ConnectionId,
        events: EventSender,
    ) -> Result<Seated, RoomError> {
        if let Some(current) = self.connections.get(&connection) {
            return Err(RoomError::AlreadySeated(current.clone()));
        }

        let host = NewPlayer::new(normalize_name(host_name)?, PlayerToken::generate(), connection);
        let player_token = host.token.clone();
        let settings = settings.validated();

        let (code, player_id, state) = loop {
            let code = RoomCode::random(self.config.code_len);
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(room_code = %code, "room code collision, resampling");
                }
                Entry::Vacant(slot) => {
                    let game = GameRoom::new(code.clone(), settings, host);
                    let (player_id, state) = (game.host_id(), game.snapshot());
                    slot.insert(spawn_room(game, events, self.config.channel_size));
                    break (code, player_id, state);
                }
            }
        };
        self.connections.insert(connection, code.clone());

        tracing::info!(room_code = %code, player_id = %player_id, %connection, "room created");
        Ok(Seated {
            room_code: code,
            player_id,
            player_token,
            state,
        })
    }

    /// Seats a new player in an existing lobby.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player_name: impl Into<String>,
        connection: ConnectionId,
        events: EventSender,
    ) -> Result<Seated, RoomError> {
        if let Some(current) = self.connections.get(&connection) {
            return Err(RoomError::AlreadySeated(current.clone()));
        }
        let name = normalize_name(player_name)?;
        let handle = self.handle(code)?;
        let player = NewPlayer::new(name, PlayerToken::generate(), connection);
        let seated = handle.join(player, events).await?;
        self.bind(connection, code)?;
        Ok(seated)
    }

    /// Reclaims a seat by its token from a new connection.
    pub async fn rejoin_room(
        &self,
        code: &RoomCode,
        token: PlayerToken,
        connection: ConnectionId,
        events: EventSender,
    ) -> Result<Seated, RoomError> {
        if let Some(current) = self.connections.get(&connection) {
            if *current != *code {
                return Err(RoomError::AlreadySeated(current.clone()));
            }
        }
        let handle = self.handle(code)?;
        let seated = handle.rejoin(token, connection, events).await?;
        self.bind(connection, code)?;
        Ok(seated)
    }

    /// Explicit leave. Deletes the room if that was its last seat.
    pub async fn leave_room(&self, connection: ConnectionId) -> Result<Departure, RoomError> {
        let code = self.room_of(connection).ok_or(RoomError::NotSeated)?;
        let departure = match self.handle(&code) {
            Ok(handle) => handle.leave(connection).await,
            Err(e) => Err(e),
        };
        let departure = match departure {
            Ok(departure) => departure,
            Err(e @ (RoomError::NotFound(_) | RoomError::Unavailable(_))) => {
                // The room went away under this connection; drop the stale seat.
                self.connections.remove(&connection);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.connections.remove(&connection);

        if departure == (Departure::Removed { room_empty: true }) {
            self.delete_room(&code);
        }
        Ok(departure)
    }

    /// The connection closed. The seat, if any, stays for a rejoin.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let Some((_, code)) = self.connections.remove(&connection) else {
            return;
        };
        if let Some(handle) = self.lookup_by_code(&code) {
            if let Err(e) = handle.disconnect(connection).await {
                tracing::debug!(room_code = %code, %connection, error = %e, "disconnect after room closed");
            }
        }
    }

    /// Runs a game action for the connection's seat. Schedules cleanup if
    /// it ended the game.
    pub async fn act(
        self: &Arc<Self>,
        connection: ConnectionId,
        action: GameAction,
    ) -> Result<ActionOutcome, RoomError> {
        let code = self.room_of(connection).ok_or(RoomError::NotSeated)?;
        let handle = self.handle(&code)?;
        let outcome = handle.act(connection, action).await?;
        if outcome.game_over {
            self.schedule_finished_cleanup(code);
        }
        Ok(outcome)
    }

    pub fn lookup_by_code(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(code).map(|h| h.clone())
    }

    /// The room a connection is seated in.
    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomCode> {
        self.connections.get(&connection).map(|c| c.clone())
    }

    pub fn lookup_by_connection(&self, connection: ConnectionId) -> Option<RoomHandle> {
        self.room_of(connection)
            .and_then(|code| self.lookup_by_code(&code))
    }

    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.handle(code)?.info().await
    }

    /// Removes a room and stops its actor. Returns `false` if it was
    /// already gone.
    pub fn delete_room(&self, code: &RoomCode) -> bool {
        let Some((_, handle)) = self.rooms.remove(code) else {
            return false;
        };
        self.connections.retain(|_, c| *c != *code);

        // Stop the actor without waiting on its queue.
        tokio::spawn(async move {
            let _ = handle.shutdown().await;
        });
        tracing::info!(room_code = %code, "room deleted");
        true
    }

    /// Evicts every room [`SweepPolicy`](crate::SweepPolicy) says is stale
    /// at `now`, plus any whose actor has died. Returns how many went.
    pub async fn sweep_stale(&self, now: Instant) -> usize {
        let snapshot: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();

        let mut evicted = 0;
        for handle in snapshot {
            let reason = match handle.info().await {
                Ok(info) => self.config.sweep.eviction_reason(&info, now),
                Err(_) => None,
            };
            let dead = handle.is_closed();
            if reason.is_none() && !dead {
                continue;
            }
            if self.delete_room(handle.code()) {
                evicted += 1;
                tracing::info!(
                    room_code = %handle.code(),
                    reason = %reason.map_or_else(|| "actor gone".to_string(), |r| r.to_string()),
                    "stale room evicted"
                );
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.rooms.len(), "sweep finished");
        }
        evicted
    }

    /// Starts the periodic sweep. Stops when the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.sweep.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.sweep_stale(Instant::now()).await;
            }
        })
    }

    /// Deletes `code` after the post-game delay if it is still finished.
    pub fn schedule_finished_cleanup(self: &Arc<Self>, code: RoomCode) {
        let weak = Arc::downgrade(self);
        let delay = self.config.sweep.post_game_cleanup;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            let Some(handle) = manager.lookup_by_code(&code) else {
                return;
            };
            match handle.info().await {
                Ok(info) if info.phase == GamePhase::GameEnd => {
                    tracing::info!(room_code = %code, "post-game cleanup");
                    manager.delete_room(&code);
                }
                Ok(_) => {}
                Err(_) => {
                    manager.delete_room(&code);
                }
            }
        });
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Connections currently seated in some room.
    pub fn seated_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// Records the connection's seat. Undone if the room was deleted while
    /// the seat was being taken.
    fn bind(&self, connection: ConnectionId, code: &RoomCode) -> Result<(), RoomError> {
        self.connections.insert(connection, code.clone());
        if self.rooms.contains_key(code) {
            return Ok(());
        }
        self.connections.remove_if(&connection, |_, c| *c == *code);
        Err(RoomError::NotFound(code.clone()))
    }

    fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.lookup_by_code(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }
}

/// Trims the name and caps it at [`MAX_NAME_LEN`] characters.
fn normalize_name(raw: impl Into<String>) -> Result<String, RoomError> {
    let raw = raw.into();
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        return Err(RoomError::InvalidName);
    }
    Ok(name)
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
