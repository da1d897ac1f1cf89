//! Room actor: one Tokio task per room, owning its [`GameRoom`] and turn
//! clock.
//!
//! Everything that touches a room's state goes through the actor's command
//! channel, so actions, joins and timer expiries are applied one at a time
//! in arrival order. Replies travel back on oneshot channels; broadcasts go
//! out on each seated player's event channel.

use std::collections::HashMap;
use std::sync::Arc;

use leastcount_clock::{Expiry, TurnClock};
use leastcount_game::{
    Card, CardId, ConnectionId, DrawSource, GamePhase, GameRoom, GameState, NewPlayer,
    PlayerId, PlayerToken, RoomCode, RoundSummary,
};
use leastcount_protocol::RoomEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::RoomError;

/// Where a seated player's broadcasts are delivered.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// A game action sent by a seated player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    StartGame,
    DrawCard(DrawSource),
    DiscardCards(Vec<CardId>),
    CallShow,
    StartNextRound,
}

/// Result of a successful [`GameAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Set for draws.
    pub drawn: Option<Card>,
    /// The action finished the game.
    pub game_over: bool,
}

/// A player now holding a seat.
#[derive(Debug, Clone)]
pub struct Seated {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub player_token: PlayerToken,
    pub state: Arc<GameState>,
}

/// What leaving did to the seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The seat is gone. `room_empty` means nobody is left.
    Removed { room_empty: bool },
    /// A game is running, so the seat stays and is played by the timer.
    Disconnected,
}

/// Room metadata, without the game state.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: GamePhase,
    pub player_count: usize,
    pub connected_count: usize,
    pub created_at: Instant,
    /// When the game reached `GameEnd`.
    pub finished_at: Option<Instant>,
}

pub(crate) enum RoomCommand {
    Join {
        player: NewPlayer,
        events: EventSender,
        reply: oneshot::Sender<Result<Seated, RoomError>>,
    },

    Rejoin {
        token: PlayerToken,
        connection: ConnectionId,
        events: EventSender,
        reply: oneshot::Sender<Result<Seated, RoomError>>,
    },

    Leave {
        connection: ConnectionId,
        reply: oneshot::Sender<Result<Departure, RoomError>>,
    },

    /// The connection dropped. No reply.
    Disconnect { connection: ConnectionId },

    Action {
        connection: ConnectionId,
        action: GameAction,
        reply: oneshot::Sender<Result<ActionOutcome, RoomError>>,
    },

    Info { reply: oneshot::Sender<RoomInfo> },

    /// Current state, for inspection.
    Snapshot {
        reply: oneshot::Sender<Arc<GameState>>,
    },

    Shutdown,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle").field("code", &self.code).finish()
    }
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Seats a new player.
    pub async fn join(&self, player: NewPlayer, events: EventSender) -> Result<Seated, RoomError> {
        self.request(|reply| RoomCommand::Join {
            player,
            events,
            reply,
        })
        .await?
    }

    /// Rebinds the seat holding `token` to `connection`.
    pub async fn rejoin(
        &self,
        token: PlayerToken,
        connection: ConnectionId,
        events: EventSender,
    ) -> Result<Seated, RoomError> {
        self.request(|reply| RoomCommand::Rejoin {
            token,
            connection,
            events,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, connection: ConnectionId) -> Result<Departure, RoomError> {
        self.request(|reply| RoomCommand::Leave { connection, reply })
            .await?
    }

    /// Reports a dropped connection (fire-and-forget).
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { connection })
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn act(
        &self,
        connection: ConnectionId,
        action: GameAction,
    ) -> Result<ActionOutcome, RoomError> {
        self.request(|reply| RoomCommand::Action {
            connection,
            action,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Arc<GameState>, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Stops the actor. Its turn clock goes with it.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The actor state. Lives inside its task.
struct RoomActor {
    code: RoomCode,
    game: GameRoom,
    /// Event channels of connected seats.
    senders: HashMap<PlayerId, EventSender>,
    clock: TurnClock,
    created_at: Instant,
    finished_at: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_code = %self.code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                expiry = self.clock.expired() => self.on_turn_timeout(expiry),
            }
        }

        tracing::info!(room_code = %self.code, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player,
                events,
                reply,
            } => {
                let result = self.handle_join(player, events);
                let _ = reply.send(result);
            }
            RoomCommand::Rejoin {
                token,
                connection,
                events,
                reply,
            } => {
                let result = self.handle_rejoin(token, connection, events);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { connection, reply } => {
                let result = self.handle_leave(connection);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { connection } => self.handle_disconnect(connection),
            RoomCommand::Action {
                connection,
                action,
                reply,
            } => {
                let result = self.handle_action(connection, action);
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.game.snapshot());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_join(&mut self, player: NewPlayer, events: EventSender) -> Result<Seated, RoomError> {
        let token = player.token.clone();
        let name = player.name.clone();
        let player_id = self.game.add_player(player)?;
        self.senders.insert(player_id, events);

        tracing::info!(
            room_code = %self.code,
            player_id = %player_id,
            players = self.game.player_count(),
            "player joined"
        );
        let state = self.game.snapshot();
        self.broadcast(RoomEvent::PlayerJoined {
            player_id,
            player_name: name,
            state: state.clone(),
        });
        Ok(Seated {
            room_code: self.code.clone(),
            player_id,
            player_token: token,
            state,
        })
    }

    fn handle_rejoin(
        &mut self,
        token: PlayerToken,
        connection: ConnectionId,
        events: EventSender,
    ) -> Result<Seated, RoomError> {
        let player_id = self.game.rebind(&token, connection)?;
        self.senders.insert(player_id, events);

        let name = self.player_name(player_id);
        tracing::info!(room_code = %self.code, player_id = %player_id, %connection, "player reconnected");
        self.broadcast(RoomEvent::PlayerReconnected {
            player_id,
            player_name: name,
        });
        Ok(Seated {
            room_code: self.code.clone(),
            player_id,
            player_token: token,
            state: self.game.snapshot(),
        })
    }

    fn handle_leave(&mut self, connection: ConnectionId) -> Result<Departure, RoomError> {
        let player_id = self
            .game
            .player_by_connection(connection)
            .map(|p| p.id)
            .ok_or(RoomError::NotSeated)?;
        let name = self.player_name(player_id);
        self.senders.remove(&player_id);

        if self.game.phase().is_active() {
            self.game.mark_disconnected(connection);
            tracing::info!(room_code = %self.code, player_id = %player_id, "player left mid-game, seat kept");
            self.broadcast(RoomEvent::PlayerLeft {
                player_id,
                player_name: name,
                state: self.game.snapshot(),
            });
            return Ok(Departure::Disconnected);
        }

        self.game.remove_player(player_id)?;
        let room_empty = self.game.player_count() == 0;
        tracing::info!(
            room_code = %self.code,
            player_id = %player_id,
            players = self.game.player_count(),
            "player left"
        );
        if !room_empty {
            self.broadcast(RoomEvent::PlayerLeft {
                player_id,
                player_name: name,
                state: self.game.snapshot(),
            });
        }
        Ok(Departure::Removed { room_empty })
    }

    fn handle_disconnect(&mut self, connection: ConnectionId) {
        let host = self.game.host_id();
        let Some(player_id) = self.game.mark_disconnected(connection) else {
            return;
        };
        self.senders.remove(&player_id);
        tracing::info!(room_code = %self.code, player_id = %player_id, %connection, "player disconnected");
        let name = self.player_name(player_id);
        self.broadcast(RoomEvent::PlayerDisconnected {
            player_id,
            player_name: name,
        });
        if self.game.host_id() != host {
            self.broadcast_state();
        }
    }

    fn handle_action(
        &mut self,
        connection: ConnectionId,
        action: GameAction,
    ) -> Result<ActionOutcome, RoomError> {
        let player_id = self
            .game
            .player_by_connection(connection)
            .map(|p| p.id)
            .ok_or(RoomError::NotSeated)?;

        let result = self.apply(player_id, action);
        match &result {
            Ok(_) => self.sync_clock(),
            Err(e) => {
                tracing::debug!(room_code = %self.code, player_id = %player_id, error = %e, "action rejected")
            }
        }
        result
    }

    fn apply(&mut self, player_id: PlayerId, action: GameAction) -> Result<ActionOutcome, RoomError> {
        let mut outcome = ActionOutcome::default();
        match action {
            GameAction::StartGame => {
                self.game.start_game(player_id)?;
                self.broadcast(RoomEvent::GameStarted {
                    state: self.game.snapshot(),
                });
            }
            GameAction::DrawCard(source) => {
                outcome.drawn = Some(self.game.draw_card(player_id, source)?);
                self.broadcast_state();
            }
            GameAction::DiscardCards(card_ids) => {
                self.game.discard_cards(player_id, &card_ids)?;
                self.broadcast_state();
            }
            GameAction::CallShow => {
                let summary = self.game.call_show(player_id)?;
                outcome.game_over = self.finish_round(summary);
            }
            GameAction::StartNextRound => {
                if self.game.start_next_round() {
                    tracing::info!(
                        room_code = %self.code,
                        round = self.game.state().current_round,
                        "next round started"
                    );
                    self.broadcast_state();
                }
            }
        }
        Ok(outcome)
    }

    /// Broadcasts the round result and, if the game is over, the final
    /// standings. Returns whether the game ended.
    fn finish_round(&mut self, summary: RoundSummary) -> bool {
        let game_over = summary.game_over;
        self.broadcast(RoomEvent::RoundEnded {
            summary,
            state: self.game.snapshot(),
        });

        if game_over {
            self.finished_at = Some(Instant::now());
            let winner = self.game.winner().map(|p| (p.id, p.name.clone()));
            tracing::info!(
                room_code = %self.code,
                winner = ?winner.as_ref().map(|(id, _)| *id),
                "game over"
            );
            self.broadcast(RoomEvent::GameEnded {
                winner: winner.as_ref().map(|(id, _)| *id),
                winner_name: winner.map(|(_, name)| name),
                final_scores: self.game.final_scores(),
                state: self.game.snapshot(),
            });
        }
        game_over
    }

    /// Keeps exactly one deadline armed for the current turn while a timed
    /// game is in play, and none otherwise.
    fn sync_clock(&mut self) {
        if self.game.phase() == GamePhase::Playing {
            if let Some(duration) = self.game.state().settings.turn_duration() {
                let serial = self.game.turn_serial();
                if self.clock.generation() != Some(serial) {
                    self.clock.arm(duration, serial);
                }
                return;
            }
        }
        self.clock.cancel();
    }

    fn on_turn_timeout(&mut self, expiry: Expiry) {
        if self.game.phase() != GamePhase::Playing || expiry.generation != self.game.turn_serial() {
            tracing::debug!(
                room_code = %self.code,
                generation = expiry.generation,
                current = self.game.turn_serial(),
                "stale turn deadline ignored"
            );
            return;
        }
        let Some(player_id) = self.game.current_turn() else {
            return;
        };

        match self.game.auto_play(player_id) {
            Ok(played) => {
                tracing::info!(
                    room_code = %self.code,
                    player_id = %player_id,
                    discarded = played.discarded.len(),
                    drew = played.drawn.is_some(),
                    "turn timed out, auto-played"
                );
                let name = self.player_name(player_id);
                self.broadcast(RoomEvent::TurnTimeout {
                    player_id,
                    player_name: name,
                });
                self.broadcast_state();
                self.sync_clock();
            }
            Err(e) => {
                tracing::debug!(room_code = %self.code, player_id = %player_id, error = %e, "auto-play failed");
            }
        }
    }

    fn broadcast_state(&self) {
        self.broadcast(RoomEvent::StateUpdate {
            state: self.game.snapshot(),
        });
    }

    /// Sends to every connected seat. A closed channel is skipped; its
    /// handler reports the disconnect separately.
    fn broadcast(&self, event: RoomEvent) {
        tracing::trace!(room_code = %self.code, event = event.name(), "broadcast");
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn player_name(&self, id: PlayerId) -> String {
        self.game
            .player(id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            phase: self.game.phase(),
            player_count: self.game.player_count(),
            connected_count: self.game.connected_count(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// Spawns the actor for `game` and returns its handle. `host_events`
/// receives broadcasts for the host seat.
pub(crate) fn spawn_room(game: GameRoom, host_events: EventSender, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = game.code().clone();

    let mut senders = HashMap::new();
    senders.insert(game.host_id(), host_events);

    let actor = RoomActor {
        code: code.clone(),
        game,
        senders,
        clock: TurnClock::new(),
        created_at: Instant::now(),
        finished_at: None,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}

