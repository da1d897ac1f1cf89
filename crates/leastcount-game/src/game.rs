//! The authoritative Least Count state machine for one room.
//!
//! [`GameRoom`] owns a [`GameState`] and is the only thing allowed to change
//! it. Each public method is one player action: it either applies fully and
//! returns `Ok`, or rejects with a [`GameError`] and leaves the state exactly
//! as it was.
//!
//! # Turn order
//!
//! Turns go anti-clockwise: from seat `i` in `player_order` to seat `i - 1`
//! (wrapping), skipping eliminated players. A turn ends with either a draw,
//! or a discard whose rank matches the top of the discard pile. In both
//! cases the cards thrown this turn are merged onto the drawable pile.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::card::{Card, CardId, Rank};
use crate::deck;
use crate::error::GameError;
use crate::ids::{ConnectionId, PlayerId, PlayerToken, RoomCode};
use crate::settings::{EndCondition, GamePhase, GameSettings};
use crate::state::{
    DrawSource, FinalScore, GameState, Player, PlayerRoundScore, RoundSummary, ShowOutcome,
};

/// Most seats a room can hold.
pub const MAX_PLAYERS: usize = 10;
/// Fewest players needed to start.
pub const MIN_PLAYERS: usize = 2;
/// Cards dealt to each active player per round.
pub const HAND_SIZE: usize = 7;
/// Highest hand value that may call show.
pub const SHOW_LIMIT: u32 = 10;
/// Round score for a caller who was not the lowest.
pub const BAD_SHOW_PENALTY: u32 = 40;

/// Who is taking a seat.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub name: String,
    pub token: PlayerToken,
    pub connection: ConnectionId,
}

impl NewPlayer {
    pub fn new(name: impl Into<String>, token: PlayerToken, connection: ConnectionId) -> Self {
        Self {
            name: name.into(),
            token,
            connection,
        }
    }
}

/// What a discard did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardOutcome {
    pub rank: Rank,
    pub cards: Vec<Card>,
    /// The rank matched the discard top, so the turn ended without a draw.
    pub matched: bool,
}

/// What a timed-out turn played on the player's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoPlayOutcome {
    pub discarded: Vec<Card>,
    /// `None` when the discard matched and ended the turn by itself.
    pub drawn: Option<Card>,
}

/// One room's game.
pub struct GameRoom {
    state: GameState,
    next_player_id: u64,
    /// Bumped every time a turn starts. Lets a turn timer tell whether the
    /// turn it was armed for is still the current one.
    turn_serial: u64,
    /// Cards in play this round, fixed at the deal.
    cards_in_round: usize,
    rng: StdRng,
}

impl std::fmt::Debug for GameRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRoom")
            .field("room_code", &self.state.room_code)
            .field("phase", &self.state.game_phase)
            .field("round", &self.state.current_round)
            .field("players", &self.state.players.len())
            .finish()
    }
}

impl GameRoom {
    /// Creates a room in the lobby with `host` in the first seat.
    pub fn new(code: RoomCode, settings: GameSettings, host: NewPlayer) -> Self {
        Self::with_rng(code, settings, host, StdRng::from_os_rng())
    }

    /// Like [`new`](Self::new) with a caller-supplied RNG, so tests can fix
    /// the shuffle.
    pub fn with_rng(code: RoomCode, settings: GameSettings, host: NewPlayer, rng: StdRng) -> Self {
        let host_id = PlayerId(1);
        let turn_time_limit_ms = settings
            .turn_duration()
            .map_or(0, |d| d.as_millis() as u64);
        let state = GameState {
            room_code: code,
            players: vec![seat(host_id, host, true)],
            player_order: Vec::new(),
            current_round: 0,
            deck: Vec::new(),
            deck_count: 0,
            discard_pile: Vec::new(),
            current_turn_discard_pile: Vec::new(),
            wild_card_rank: None,
            current_turn_player_id: None,
            round_start_player_id: None,
            game_phase: GamePhase::Lobby,
            host_id,
            settings,
            turn_start_time: None,
            turn_time_limit_ms,
            skip_draw_this_turn: false,
        };
        Self {
            state,
            next_player_id: 2,
            turn_serial: 0,
            cards_in_round: 0,
            rng,
        }
    }

    // -- Queries -----------------------------------------------------------

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn code(&self) -> &RoomCode {
        &self.state.room_code
    }

    pub fn phase(&self) -> GamePhase {
        self.state.game_phase
    }

    pub fn host_id(&self) -> PlayerId {
        self.state.host_id
    }

    pub fn turn_serial(&self) -> u64 {
        self.turn_serial
    }

    pub fn current_turn(&self) -> Option<PlayerId> {
        self.state.current_turn_player_id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.state.player(id)
    }

    pub fn player_by_connection(&self, conn: ConnectionId) -> Option<&Player> {
        self.state
            .players
            .iter()
            .find(|p| p.is_connected && p.connection == conn)
    }

    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    pub fn connected_count(&self) -> usize {
        self.state.players.iter().filter(|p| p.is_connected).count()
    }

    /// Non-eliminated players in seating order.
    pub fn active_player_ids(&self) -> Vec<PlayerId> {
        if self.state.player_order.is_empty() {
            return self
                .state
                .players
                .iter()
                .filter(|p| !p.is_eliminated)
                .map(|p| p.id)
                .collect();
        }
        self.state
            .player_order
            .iter()
            .copied()
            .filter(|id| self.player(*id).is_some_and(|p| !p.is_eliminated))
            .collect()
    }

    /// Cards dealt into play at the start of the current round.
    pub fn cards_in_round(&self) -> usize {
        self.cards_in_round
    }

    /// Cards currently across the deck, both discard piles and every hand.
    /// Equals [`cards_in_round`](Self::cards_in_round) at all times during a
    /// round.
    pub fn cards_on_table(&self) -> usize {
        self.state.deck.len()
            + self.state.discard_pile.len()
            + self.state.current_turn_discard_pile.len()
            + self.state.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// An immutable copy for broadcasting.
    pub fn snapshot(&self) -> Arc<GameState> {
        let mut snap = self.state.clone();
        snap.deck_count = snap.deck.len();
        snap.deck.clear();
        Arc::new(snap)
    }

    // -- Seats -------------------------------------------------------------

    /// Seats a new player. Only allowed in the lobby.
    pub fn add_player(&mut self, new: NewPlayer) -> Result<PlayerId, GameError> {
        if !self.state.game_phase.is_joinable() {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.state.players.len() >= MAX_PLAYERS {
            return Err(GameError::RoomFull);
        }
        let taken = self
            .state
            .players
            .iter()
            .any(|p| p.token == new.token || (p.is_connected && p.connection == new.connection));
        if taken {
            return Err(GameError::AlreadyJoined);
        }

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        tracing::debug!(room_code = %self.state.room_code, player_id = %id, name = %new.name, "player seated");
        self.state.players.push(seat(id, new, false));
        Ok(id)
    }

    /// Removes a seat. Allowed in the lobby and after the game ends; while a
    /// game runs a leaving player only loses their connection.
    ///
    /// If the host leaves, the earliest remaining seat becomes host.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, GameError> {
        if self.state.game_phase.is_active() {
            return Err(GameError::SeatLocked(id));
        }
        let idx = self
            .state
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::PlayerNotFound(id))?;
        let removed = self.state.players.remove(idx);
        self.state.player_order.retain(|p| *p != id);

        if removed.is_host {
            if let Some(next) = self.state.players.first_mut() {
                next.is_host = true;
                self.state.host_id = next.id;
                tracing::info!(room_code = %self.state.room_code, host = %next.id, "host transferred");
            }
        }
        Ok(removed)
    }

    /// Marks the seat bound to `conn` as disconnected. Returns the seat, if
    /// any.
    ///
    /// A host who drops out of the lobby hands the host role to the earliest
    /// connected seat, so the others can still start the game.
    pub fn mark_disconnected(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        let player = self
            .state
            .players
            .iter_mut()
            .find(|p| p.is_connected && p.connection == conn)?;
        player.is_connected = false;
        let (id, was_host) = (player.id, player.is_host);

        if was_host && self.state.game_phase == GamePhase::Lobby {
            if let Some(next) = self.state.players.iter().find(|p| p.is_connected).map(|p| p.id) {
                for p in self.state.players.iter_mut() {
                    p.is_host = p.id == next;
                }
                self.state.host_id = next;
                tracing::info!(room_code = %self.state.room_code, host = %next, "host transferred");
            }
        }
        Some(id)
    }

    /// Rebinds the seat holding `token` to a new connection.
    pub fn rebind(&mut self, token: &PlayerToken, conn: ConnectionId) -> Result<PlayerId, GameError> {
        let player = self
            .state
            .players
            .iter_mut()
            .find(|p| p.token == *token)
            .ok_or(GameError::InvalidToken)?;
        player.connection = conn;
        player.is_connected = true;
        Ok(player.id)
    }

    // -- Game flow ---------------------------------------------------------

    /// Starts the game. Host only, from the lobby, with 2–10 players.
    pub fn start_game(&mut self, by: PlayerId) -> Result<(), GameError> {
        self.require_phase(GamePhase::Lobby)?;
        if by != self.state.host_id {
            return Err(GameError::NotHost(by));
        }
        let count = self.state.players.len();
        if count < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                count,
                min: MIN_PLAYERS,
            });
        }

        let mut order: Vec<PlayerId> = self.state.players.iter().map(|p| p.id).collect();
        order.shuffle(&mut self.rng);
        self.state.player_order = order;
        self.enter_phase(GamePhase::Playing);
        tracing::info!(room_code = %self.state.room_code, players = count, "game started");
        self.begin_round();
        Ok(())
    }

    /// Moves from the round-end screen to the next round. Returns `false`
    /// (and does nothing) unless the phase is `RoundEnd` and at least two
    /// players are still in.
    pub fn start_next_round(&mut self) -> bool {
        if self.state.game_phase != GamePhase::RoundEnd || self.active_player_ids().len() < MIN_PLAYERS
        {
            return false;
        }
        self.enter_phase(GamePhase::Playing);
        self.begin_round();
        true
    }

    /// Takes the top card of `source` into the player's hand and ends the
    /// turn.
    ///
    /// An empty deck is first refilled from the discard pile, all but its
    /// top card, shuffled.
    pub fn draw_card(&mut self, id: PlayerId, source: DrawSource) -> Result<Card, GameError> {
        self.require_turn(id)?;

        let card = match source {
            DrawSource::Deck => {
                if self.state.deck.is_empty() {
                    self.recycle_discard_pile();
                }
                self.state.deck.pop()
            }
            DrawSource::Discard => self.state.discard_pile.pop(),
        }
        .ok_or(GameError::EmptySource(source))?;

        self.player_mut(id)?.hand.push(card);
        self.end_turn(false);
        Ok(card)
    }

    /// Throws one or more same-rank cards.
    ///
    /// If the rank matches the top of the discard pile the turn ends here;
    /// otherwise the player still has to draw.
    pub fn discard_cards(
        &mut self,
        id: PlayerId,
        card_ids: &[CardId],
    ) -> Result<DiscardOutcome, GameError> {
        self.require_turn(id)?;
        if card_ids.is_empty() {
            return Err(GameError::EmptySelection);
        }

        let hand = &self.player(id).ok_or(GameError::PlayerNotFound(id))?.hand;
        let mut picked: Vec<Card> = Vec::with_capacity(card_ids.len());
        for cid in card_ids {
            if picked.iter().any(|c| c.id == *cid) {
                return Err(GameError::CardNotInHand(*cid));
            }
            let card = hand
                .iter()
                .find(|c| c.id == *cid)
                .ok_or(GameError::CardNotInHand(*cid))?;
            picked.push(*card);
        }
        let rank = picked[0].rank;
        if picked.iter().any(|c| c.rank != rank) {
            return Err(GameError::RankMismatch);
        }

        let matched = self.state.discard_top().is_some_and(|top| top.rank == rank);
        self.player_mut(id)?
            .hand
            .retain(|c| !card_ids.contains(&c.id));
        self.state.current_turn_discard_pile.extend_from_slice(&picked);

        if matched {
            tracing::debug!(room_code = %self.state.room_code, player_id = %id, %rank, "matching discard");
            self.end_turn(true);
        }
        Ok(DiscardOutcome {
            rank,
            cards: picked,
            matched,
        })
    }

    /// Ends the round on the caller's claim of the lowest hand.
    ///
    /// The caller's hand must be worth at most [`SHOW_LIMIT`]. On a good
    /// show (caller is at the minimum, ties allowed) the caller scores 0 and
    /// everyone else scores their hand. On a bad show the caller takes
    /// [`BAD_SHOW_PENALTY`], every player at the minimum scores 0 and the
    /// rest score their hand.
    pub fn call_show(&mut self, id: PlayerId) -> Result<RoundSummary, GameError> {
        self.require_turn(id)?;
        let wild = self.state.wild_card_rank;
        let caller = self.player(id).ok_or(GameError::PlayerNotFound(id))?;
        let caller_total = deck::hand_value(&caller.hand, wild);
        if caller_total > SHOW_LIMIT {
            return Err(GameError::HandTooHigh {
                value: caller_total,
                limit: SHOW_LIMIT,
            });
        }

        let totals: Vec<(PlayerId, u32)> = self
            .active_player_ids()
            .into_iter()
            .filter_map(|pid| {
                self.player(pid)
                    .map(|p| (pid, deck::hand_value(&p.hand, wild)))
            })
            .collect();
        let lowest = totals.iter().map(|(_, v)| *v).min().unwrap_or(caller_total);
        let is_good_show = caller_total == lowest;

        let scores: Vec<(PlayerId, u32)> = totals
            .iter()
            .map(|&(pid, total)| {
                let score = if pid == id {
                    if is_good_show { 0 } else { BAD_SHOW_PENALTY }
                } else if !is_good_show && total == lowest {
                    0
                } else {
                    total
                };
                (pid, score)
            })
            .collect();
        self.post_round_scores(&scores);

        tracing::info!(
            room_code = %self.state.room_code,
            player_id = %id,
            hand = caller_total,
            lowest,
            good = is_good_show,
            "show called"
        );
        Ok(self.end_round(Some(ShowOutcome {
            player_id: id,
            hand_total: caller_total,
            is_good_show,
            lowest_hand_total: lowest,
        })))
    }

    /// Plays a timed-out turn: discards every card of the rank holding the
    /// single highest-value card, then draws from the deck unless the
    /// discard matched.
    ///
    /// All or nothing: if any step fails the state is restored.
    pub fn auto_play(&mut self, id: PlayerId) -> Result<AutoPlayOutcome, GameError> {
        self.require_turn(id)?;
        let saved_state = self.state.clone();
        let saved_serial = self.turn_serial;

        let result = self.try_auto_play(id);
        if result.is_err() {
            self.state = saved_state;
            self.turn_serial = saved_serial;
        }
        result
    }

    fn try_auto_play(&mut self, id: PlayerId) -> Result<AutoPlayOutcome, GameError> {
        let wild = self.state.wild_card_rank;
        let hand = &self.player(id).ok_or(GameError::PlayerNotFound(id))?.hand;

        // First card wins ties so the choice follows hand order.
        let highest = hand
            .iter()
            .fold(None::<&Card>, |best, c| match best {
                Some(b) if b.points(wild) >= c.points(wild) => Some(b),
                _ => Some(c),
            })
            .ok_or(GameError::EmptySelection)?;
        let ids: Vec<CardId> = hand
            .iter()
            .filter(|c| c.rank == highest.rank)
            .map(|c| c.id)
            .collect();

        let discard = self.discard_cards(id, &ids)?;
        let drawn = if discard.matched {
            None
        } else {
            Some(self.draw_card(id, DrawSource::Deck)?)
        };
        Ok(AutoPlayOutcome {
            discarded: discard.cards,
            drawn,
        })
    }

    /// The winner once the game is over.
    ///
    /// Point limit: the last player not eliminated. If the final round
    /// knocked everyone out, the lowest total among all players. Round
    /// limit: the lowest total among active players. Ties go to the
    /// earliest seat.
    pub fn winner(&self) -> Option<&Player> {
        if self.state.game_phase != GamePhase::GameEnd {
            return None;
        }
        let active = self.active_player_ids();
        if self.state.settings.end_condition == EndCondition::PointLimit && active.len() == 1 {
            return self.player(active[0]);
        }
        let pool: Vec<PlayerId> = if active.is_empty() {
            self.seating()
        } else {
            active
        };
        pool.into_iter()
            .filter_map(|id| self.player(id))
            .fold(None::<&Player>, |best, p| match best {
                Some(b) if b.total_score <= p.total_score => Some(b),
                _ => Some(p),
            })
    }

    /// Every player's total, in seating order.
    pub fn final_scores(&self) -> Vec<FinalScore> {
        self.seating()
            .into_iter()
            .filter_map(|id| self.player(id))
            .map(|p| FinalScore {
                player_id: p.id,
                player_name: p.name.clone(),
                total_score: p.total_score,
            })
            .collect()
    }

    // -- Internals ---------------------------------------------------------

    fn seating(&self) -> Vec<PlayerId> {
        if self.state.player_order.is_empty() {
            self.state.players.iter().map(|p| p.id).collect()
        } else {
            self.state.player_order.clone()
        }
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), GameError> {
        let actual = self.state.game_phase;
        if actual != expected {
            return Err(GameError::WrongPhase { expected, actual });
        }
        Ok(())
    }

    fn enter_phase(&mut self, next: GamePhase) {
        let current = self.state.game_phase;
        debug_assert!(
            current.can_transition_to(next),
            "illegal phase change {current} -> {next}"
        );
        self.state.game_phase = next;
    }

    fn require_turn(&self, id: PlayerId) -> Result<(), GameError> {
        self.require_phase(GamePhase::Playing)?;
        if self.player(id).is_none() {
            return Err(GameError::PlayerNotFound(id));
        }
        if self.state.current_turn_player_id != Some(id) {
            return Err(GameError::NotYourTurn(id));
        }
        Ok(())
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.state
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::PlayerNotFound(id))
    }

    /// Deals a fresh round to the active players.
    fn begin_round(&mut self) {
        let active = self.active_player_ids();
        self.state.current_round += 1;

        let mut cards = deck::create_deck(deck::deck_count(active.len()), &mut self.rng);

        // The wild indicator is set aside for the round.
        let wild = loop {
            let idx = self.rng.random_range(0..cards.len());
            if !cards[idx].rank.is_joker() {
                break cards.swap_remove(idx).rank;
            }
        };

        for player in self.state.players.iter_mut() {
            player.hand.clear();
        }
        for pid in &active {
            let at = cards.len().saturating_sub(HAND_SIZE);
            let hand = cards.split_off(at);
            if let Some(p) = self.state.players.iter_mut().find(|p| p.id == *pid) {
                p.hand = hand;
            }
        }
        self.state.discard_pile = cards.pop().into_iter().collect();
        self.state.current_turn_discard_pile.clear();
        self.state.deck = cards;
        self.state.wild_card_rank = Some(wild);
        self.state.skip_draw_this_turn = false;

        let starter = match self.state.round_start_player_id {
            None => active[self.rng.random_range(0..active.len())],
            Some(prev) => match active.iter().position(|id| *id == prev) {
                Some(i) => active[(i + active.len() - 1) % active.len()],
                None => active[0],
            },
        };
        self.state.round_start_player_id = Some(starter);
        self.start_turn(starter);
        self.cards_in_round = self.cards_on_table();

        tracing::info!(
            room_code = %self.state.room_code,
            round = self.state.current_round,
            %wild,
            starter = %starter,
            deck = self.state.deck.len(),
            "round started"
        );
    }

    fn start_turn(&mut self, id: PlayerId) {
        self.state.current_turn_player_id = Some(id);
        self.state.turn_start_time = Some(now_millis());
        self.turn_serial += 1;
    }

    /// Merges this turn's discards into the drawable pile and passes the turn
    /// anti-clockwise.
    fn end_turn(&mut self, skip_next_draw: bool) {
        let thrown = std::mem::take(&mut self.state.current_turn_discard_pile);
        self.state.discard_pile.extend(thrown);
        self.state.skip_draw_this_turn = skip_next_draw;

        let active = self.active_player_ids();
        if active.is_empty() {
            return;
        }
        let idx = self
            .state
            .current_turn_player_id
            .and_then(|cur| active.iter().position(|id| *id == cur))
            .unwrap_or(0);
        let next = active[(idx + active.len() - 1) % active.len()];
        self.start_turn(next);
    }

    /// Moves all but the top discard into the deck and shuffles it.
    fn recycle_discard_pile(&mut self) {
        let pile = &mut self.state.discard_pile;
        if pile.len() <= 1 {
            return;
        }
        let top = pile.len() - 1;
        let mut recycled: Vec<Card> = pile.drain(..top).collect();
        deck::shuffle(&mut recycled, &mut self.rng);
        tracing::debug!(room_code = %self.state.room_code, cards = recycled.len(), "discard pile recycled");
        self.state.deck = recycled;
    }

    /// Appends one score per player for this round. A player who already has
    /// a score for the round is left alone.
    fn post_round_scores(&mut self, scores: &[(PlayerId, u32)]) {
        let round = self.state.current_round as usize;
        for &(pid, score) in scores {
            if let Ok(p) = self.player_mut(pid) {
                if p.round_scores.len() < round {
                    p.round_scores.push(score);
                    p.total_score += score;
                }
            }
        }
    }

    fn end_round(&mut self, show: Option<ShowOutcome>) -> RoundSummary {
        let settings = &self.state.settings;
        let (condition, point_limit, round_limit) =
            (settings.end_condition, settings.point_limit, settings.round_limit);
        let room = self.state.room_code.clone();

        if condition == EndCondition::PointLimit {
            for p in self.state.players.iter_mut() {
                if !p.is_eliminated && p.total_score >= point_limit {
                    p.is_eliminated = true;
                    tracing::info!(room_code = %room, player_id = %p.id, total = p.total_score, "player eliminated");
                }
            }
        }

        let game_over = match condition {
            EndCondition::PointLimit => self.active_player_ids().len() <= 1,
            EndCondition::RoundLimit => self.state.current_round >= round_limit,
        };
        self.enter_phase(if game_over {
            GamePhase::GameEnd
        } else {
            GamePhase::RoundEnd
        });
        self.state.turn_start_time = None;

        let wild = self.state.wild_card_rank;
        let round = self.state.current_round;
        let scores = self
            .seating()
            .into_iter()
            .filter_map(|id| self.player(id))
            .map(|p| PlayerRoundScore {
                player_id: p.id,
                player_name: p.name.clone(),
                hand_total: deck::hand_value(&p.hand, wild),
                round_score: p.round_scores.get(round as usize - 1).copied().unwrap_or(0),
                total_score: p.total_score,
                is_eliminated: p.is_eliminated,
            })
            .collect();

        tracing::info!(room_code = %room, round, game_over, "round ended");
        RoundSummary {
            round,
            scores,
            show_result: show,
            wild_card_rank: wild,
            game_over,
        }
    }
}

fn seat(id: PlayerId, new: NewPlayer, is_host: bool) -> Player {
    Player {
        id,
        token: new.token,
        connection: new.connection,
        name: new.name,
        hand: Vec::new(),
        round_scores: Vec::new(),
        total_score: 0,
        is_eliminated: false,
        is_connected: true,
        is_host,
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Suit;

    static NEXT_TEST_CARD: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1 << 40);

    fn card(rank: Rank) -> Card {
        let id = NEXT_TEST_CARD.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Card::new(rank, Suit::Spades, CardId(id))
    }

    fn new_player(n: u64) -> NewPlayer {
        NewPlayer::new(format!("player{n}"), PlayerToken::generate(), ConnectionId(n))
    }

    fn room_with(players: usize, settings: GameSettings) -> GameRoom {
        let mut room = GameRoom::with_rng(
            RoomCode::parse("TEST01"),
            settings,
            new_player(1),
            StdRng::seed_from_u64(7),
        );
        for n in 2..=players as u64 {
            room.add_player(new_player(n)).unwrap();
        }
        room
    }

    fn started(players: usize) -> GameRoom {
        let mut room = room_with(players, GameSettings::default());
        room.start_game(PlayerId(1)).unwrap();
        room
    }

    /// Replaces a hand and keeps the card count balanced by topping up or
    /// trimming the deck.
    fn set_hand(room: &mut GameRoom, id: PlayerId, hand: Vec<Card>) {
        room.state.players.iter_mut().find(|p| p.id == id).unwrap().hand = hand;
        room.cards_in_round = room.cards_on_table();
    }

    fn current(room: &GameRoom) -> PlayerId {
        room.current_turn().unwrap()
    }

    #[test]
    fn test_new_room_has_host_in_lobby() {
        let room = room_with(1, GameSettings::default());
        assert_eq!(room.phase(), GamePhase::Lobby);
        assert_eq!(room.host_id(), PlayerId(1));
        assert!(room.player(PlayerId(1)).unwrap().is_host);
        assert_eq!(room.state().turn_time_limit_ms, 30_000);
    }

    #[test]
    fn test_add_player_room_full() {
        let mut room = room_with(MAX_PLAYERS, GameSettings::default());
        assert_eq!(room.add_player(new_player(99)), Err(GameError::RoomFull));
    }

    #[test]
    fn test_add_player_same_connection_rejected() {
        let mut room = room_with(1, GameSettings::default());
        let dup = NewPlayer::new("again", PlayerToken::generate(), ConnectionId(1));
        assert_eq!(room.add_player(dup), Err(GameError::AlreadyJoined));
    }

    #[test]
    fn test_add_player_after_start_rejected() {
        let mut room = started(2);
        assert_eq!(room.add_player(new_player(3)), Err(GameError::GameAlreadyStarted));
    }

    #[test]
    fn test_start_game_requires_host_and_two_players() {
        let mut solo = room_with(1, GameSettings::default());
        assert_eq!(
            solo.start_game(PlayerId(1)),
            Err(GameError::NotEnoughPlayers { count: 1, min: 2 })
        );

        let mut room = room_with(3, GameSettings::default());
        assert_eq!(room.start_game(PlayerId(2)), Err(GameError::NotHost(PlayerId(2))));
        assert_eq!(room.phase(), GamePhase::Lobby);
    }

    #[test]
    fn test_start_game_deals_round_one() {
        let room = started(4);
        let s = room.state();
        assert_eq!(s.game_phase, GamePhase::Playing);
        assert_eq!(s.current_round, 1);
        assert_eq!(s.player_order.len(), 4);
        assert!(s.players.iter().all(|p| p.hand.len() == HAND_SIZE));
        assert_eq!(s.discard_pile.len(), 1);
        assert!(s.current_turn_discard_pile.is_empty());
        assert!(s.wild_card_rank.is_some_and(|r| !r.is_joker()));
        assert!(s.turn_start_time.is_some());
        assert_eq!(s.round_start_player_id, s.current_turn_player_id);
        // 2 decks less the wild indicator, 4 hands of 7, 1 opening discard.
        assert_eq!(s.deck.len(), 108 - 1 - 28 - 1);
        assert_eq!(room.cards_on_table(), 107);
    }

    #[test]
    fn test_start_game_with_eight_players_uses_three_decks() {
        let room = started(8);
        assert_eq!(room.cards_in_round(), 162 - 1);
    }

    #[test]
    fn test_draw_from_deck_ends_turn_anticlockwise() {
        let mut room = started(3);
        let order = room.state().player_order.clone();
        let first = current(&room);
        let idx = order.iter().position(|id| *id == first).unwrap();
        let expected_next = order[(idx + order.len() - 1) % order.len()];

        let serial = room.turn_serial();
        let card = room.draw_card(first, DrawSource::Deck).unwrap();

        assert!(room.player(first).unwrap().hand.contains(&card));
        assert_eq!(current(&room), expected_next);
        assert_eq!(room.turn_serial(), serial + 1);
        assert!(!room.state().skip_draw_this_turn);
        assert_eq!(room.cards_on_table(), room.cards_in_round());
    }

    #[test]
    fn test_draw_out_of_turn_rejected() {
        let mut room = started(3);
        let other = room
            .state()
            .player_order
            .iter()
            .copied()
            .find(|id| *id != current(&room))
            .unwrap();
        assert_eq!(
            room.draw_card(other, DrawSource::Deck),
            Err(GameError::NotYourTurn(other))
        );
    }

    #[test]
    fn test_draw_from_discard_takes_top() {
        let mut room = started(2);
        let top = *room.state().discard_top().unwrap();
        let who = current(&room);
        assert_eq!(room.draw_card(who, DrawSource::Discard).unwrap(), top);
        assert!(room.state().discard_pile.is_empty());

        let next = current(&room);
        assert_eq!(
            room.draw_card(next, DrawSource::Discard),
            Err(GameError::EmptySource(DrawSource::Discard))
        );
        assert_eq!(current(&room), next, "failed draw must not pass the turn");
    }

    #[test]
    fn test_draw_from_empty_deck_recycles_discards() {
        let mut room = started(2);
        let who = current(&room);
        let extra: Vec<Card> = room.state.deck.drain(..).collect();
        let keep_top = *room.state().discard_top().unwrap();
        let mut pile = extra;
        pile.push(keep_top);
        room.state.discard_pile = pile;

        room.draw_card(who, DrawSource::Deck).unwrap();
        assert_eq!(room.state().discard_pile, vec![keep_top]);
        assert_eq!(room.cards_on_table(), room.cards_in_round());
    }

    #[test]
    fn test_draw_with_nothing_to_recycle_fails() {
        let mut room = started(2);
        let who = current(&room);
        room.state.deck.clear();
        room.cards_in_round = room.cards_on_table();
        assert_eq!(
            room.draw_card(who, DrawSource::Deck),
            Err(GameError::EmptySource(DrawSource::Deck))
        );
    }

    #[test]
    fn test_discard_non_matching_keeps_turn() {
        let mut room = started(2);
        let who = current(&room);
        room.state.discard_pile = vec![card(Rank::Ace)];
        let hand = vec![card(Rank::Nine), card(Rank::Nine), card(Rank::Two)];
        let nines = [hand[0].id, hand[1].id];
        set_hand(&mut room, who, hand);

        let out = room.discard_cards(who, &nines).unwrap();
        assert!(!out.matched);
        assert_eq!(out.cards.len(), 2);
        assert_eq!(current(&room), who);
        assert_eq!(room.state().current_turn_discard_pile.len(), 2);
        assert_eq!(room.player(who).unwrap().hand.len(), 1);

        room.draw_card(who, DrawSource::Deck).unwrap();
        assert!(room.state().current_turn_discard_pile.is_empty());
        assert_eq!(room.state().discard_top().unwrap().rank, Rank::Nine);
        assert_ne!(current(&room), who);
    }

    #[test]
    fn test_discard_matching_rank_ends_turn_without_draw() {
        let mut room = started(3);
        let who = current(&room);
        room.state.discard_pile = vec![card(Rank::Four)];
        let hand = vec![card(Rank::Four), card(Rank::King)];
        let four = hand[0].id;
        set_hand(&mut room, who, hand);

        let out = room.discard_cards(who, &[four]).unwrap();
        assert!(out.matched);
        assert_ne!(current(&room), who);
        assert!(room.state().skip_draw_this_turn);
        assert_eq!(room.state().discard_pile.len(), 2);
        assert_eq!(room.player(who).unwrap().hand.len(), 1);
        assert_eq!(room.cards_on_table(), room.cards_in_round());
    }

    #[test]
    fn test_discard_rejections_leave_state_unchanged() {
        let mut room = started(2);
        let who = current(&room);
        let hand = vec![card(Rank::Three), card(Rank::Five)];
        let (three, five) = (hand[0].id, hand[1].id);
        set_hand(&mut room, who, hand);

        assert_eq!(room.discard_cards(who, &[]), Err(GameError::EmptySelection));
        assert_eq!(room.discard_cards(who, &[three, five]), Err(GameError::RankMismatch));
        assert_eq!(
            room.discard_cards(who, &[CardId(u64::MAX)]),
            Err(GameError::CardNotInHand(CardId(u64::MAX)))
        );
        assert_eq!(
            room.discard_cards(who, &[three, three]),
            Err(GameError::CardNotInHand(three))
        );
        assert_eq!(room.player(who).unwrap().hand.len(), 2);
        assert!(room.state().current_turn_discard_pile.is_empty());
    }

    #[test]
    fn test_call_show_hand_too_high() {
        let mut room = started(2);
        let who = current(&room);
        set_hand(&mut room, who, vec![card(Rank::King), card(Rank::Two)]);
        room.state.wild_card_rank = Some(Rank::Ace);
        assert_eq!(
            room.call_show(who),
            Err(GameError::HandTooHigh { value: 12, limit: 10 })
        );
        assert_eq!(room.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_call_show_good_show_scores() {
        let mut room = started(3);
        room.state.wild_card_rank = Some(Rank::King);
        let caller = current(&room);
        let others: Vec<PlayerId> = room
            .state()
            .player_order
            .iter()
            .copied()
            .filter(|id| *id != caller)
            .collect();
        set_hand(&mut room, caller, vec![card(Rank::Five), card(Rank::Three)]);
        set_hand(&mut room, others[0], vec![card(Rank::Eight)]);
        set_hand(&mut room, others[1], vec![card(Rank::Nine), card(Rank::Three)]);

        let summary = room.call_show(caller).unwrap();
        let show = summary.show_result.clone().unwrap();
        assert!(show.is_good_show);
        assert_eq!(show.hand_total, 8);
        assert_eq!(show.lowest_hand_total, 8);
        assert_eq!(summary.score_of(caller).unwrap().round_score, 0);
        assert_eq!(summary.score_of(others[0]).unwrap().round_score, 8);
        assert_eq!(summary.score_of(others[1]).unwrap().round_score, 12);
        assert_eq!(summary.wild_card_rank, Some(Rank::King));
        assert!(!summary.game_over);
        assert_eq!(room.phase(), GamePhase::RoundEnd);
        assert_eq!(room.state().turn_start_time, None);
    }

    #[test]
    fn test_call_show_bad_show_penalizes_caller() {
        let mut room = started(3);
        room.state.wild_card_rank = Some(Rank::King);
        let caller = current(&room);
        let others: Vec<PlayerId> = room
            .state()
            .player_order
            .iter()
            .copied()
            .filter(|id| *id != caller)
            .collect();
        set_hand(&mut room, caller, vec![card(Rank::Eight)]);
        set_hand(&mut room, others[0], vec![card(Rank::Five)]);
        set_hand(&mut room, others[1], vec![card(Rank::Queen), card(Rank::Two)]);

        let summary = room.call_show(caller).unwrap();
        assert!(!summary.show_result.as_ref().unwrap().is_good_show);
        assert_eq!(summary.score_of(caller).unwrap().round_score, BAD_SHOW_PENALTY);
        assert_eq!(summary.score_of(others[0]).unwrap().round_score, 0);
        assert_eq!(summary.score_of(others[1]).unwrap().round_score, 12);
        assert_eq!(room.player(caller).unwrap().total_score, 40);
    }

    #[test]
    fn test_call_show_wild_cards_count_zero() {
        let mut room = started(2);
        room.state.wild_card_rank = Some(Rank::Queen);
        let caller = current(&room);
        set_hand(
            &mut room,
            caller,
            vec![card(Rank::Queen), card(Rank::Queen), card(Rank::Joker), card(Rank::Ace)],
        );
        let summary = room.call_show(caller).unwrap();
        assert_eq!(summary.show_result.unwrap().hand_total, 1);
    }

    #[test]
    fn test_scores_posted_once_per_round() {
        let mut room = started(2);
        let caller = current(&room);
        set_hand(&mut room, caller, vec![card(Rank::Ace)]);
        room.call_show(caller).unwrap();
        let before: Vec<u32> = room.state().players.iter().map(|p| p.total_score).collect();

        room.post_round_scores(&[(caller, 99)]);
        let after: Vec<u32> = room.state().players.iter().map(|p| p.total_score).collect();
        assert_eq!(before, after);
        assert!(room.state().players.iter().all(|p| p.round_scores.len() == 1));
    }

    #[test]
    fn test_point_limit_elimination_ends_two_player_game() {
        let settings = GameSettings {
            point_limit: 10,
            ..GameSettings::default()
        };
        let mut room = room_with(2, settings);
        room.start_game(PlayerId(1)).unwrap();
        room.state.wild_card_rank = Some(Rank::Ace);
        let caller = current(&room);
        let other = room.active_player_ids().into_iter().find(|id| *id != caller).unwrap();
        set_hand(&mut room, caller, vec![card(Rank::Two)]);
        set_hand(&mut room, other, vec![card(Rank::King), card(Rank::Five)]);

        let summary = room.call_show(caller).unwrap();
        assert!(summary.game_over);
        assert!(summary.score_of(other).unwrap().is_eliminated);
        assert_eq!(room.phase(), GamePhase::GameEnd);
        assert_eq!(room.winner().unwrap().id, caller);
        assert!(!room.start_next_round());
    }

    #[test]
    fn test_eliminated_player_sits_out_later_rounds() {
        let mut room = started(4);
        room.state.wild_card_rank = Some(Rank::King);
        let caller = current(&room);
        assert_eq!(room.state().round_start_player_id, Some(caller));
        let others: Vec<PlayerId> = room
            .active_player_ids()
            .into_iter()
            .filter(|id| *id != caller)
            .collect();
        room.state.players.iter_mut().find(|p| p.id == caller).unwrap().total_score = 195;
        set_hand(&mut room, caller, vec![card(Rank::Eight)]);
        set_hand(&mut room, others[0], vec![card(Rank::Five)]);
        set_hand(&mut room, others[1], vec![card(Rank::Two)]);
        set_hand(&mut room, others[2], vec![card(Rank::Three)]);

        let summary = room.call_show(caller).unwrap();
        assert!(summary.score_of(caller).unwrap().is_eliminated);
        assert!(!summary.game_over);
        assert_eq!(room.phase(), GamePhase::RoundEnd);

        assert!(room.start_next_round());
        let active = room.active_player_ids();
        assert_eq!(active.len(), 3);
        assert!(!active.contains(&caller));
        assert!(room.player(caller).unwrap().hand.is_empty());
        // The previous starter is out, so the first active seat starts.
        assert_eq!(room.state().round_start_player_id, Some(active[0]));
        assert_eq!(current(&room), active[0]);

        for _ in 0..6 {
            let who = current(&room);
            assert_ne!(who, caller);
            room.draw_card(who, DrawSource::Deck).unwrap();
        }
        assert_eq!(room.cards_on_table(), room.cards_in_round());
    }

    #[test]
    fn test_round_limit_ends_after_last_round_and_lowest_wins() {
        let settings = GameSettings {
            end_condition: EndCondition::RoundLimit,
            round_limit: 2,
            ..GameSettings::default()
        };
        let mut room = room_with(2, settings);
        room.start_game(PlayerId(1)).unwrap();

        for round in 1..=2 {
            room.state.wild_card_rank = Some(Rank::Ace);
            let caller = current(&room);
            let other = room.active_player_ids().into_iter().find(|id| *id != caller).unwrap();
            set_hand(&mut room, caller, vec![card(Rank::Two)]);
            set_hand(&mut room, other, vec![card(Rank::Six)]);
            let summary = room.call_show(caller).unwrap();
            assert_eq!(summary.round, round);
            assert_eq!(summary.game_over, round == 2);
            if round == 1 {
                assert!(room.start_next_round());
            }
        }
        assert_eq!(room.phase(), GamePhase::GameEnd);
        let scores = room.final_scores();
        assert_eq!(scores.len(), 2);
        let best = scores.iter().map(|s| s.total_score).min().unwrap();
        assert_eq!(room.winner().unwrap().total_score, best);
    }

    #[test]
    fn test_winner_tie_goes_to_earliest_seat() {
        let settings = GameSettings {
            end_condition: EndCondition::RoundLimit,
            round_limit: 1,
            ..GameSettings::default()
        };
        let mut room = room_with(3, settings);
        room.start_game(PlayerId(1)).unwrap();
        room.state.wild_card_rank = Some(Rank::Ace);
        for id in room.active_player_ids() {
            set_hand(&mut room, id, vec![card(Rank::Two)]);
        }
        let caller = current(&room);
        room.call_show(caller).unwrap();

        // Caller scores 0, the other two tie on 2.
        assert_eq!(room.winner().unwrap().id, caller);
        let seat_order = room.state().player_order.clone();
        let tied: Vec<PlayerId> = seat_order.into_iter().filter(|id| *id != caller).collect();
        room.state.players.iter_mut().find(|p| p.id == caller).unwrap().total_score = 50;
        assert_eq!(room.winner().unwrap().id, tied[0]);
    }

    #[test]
    fn test_next_round_starter_moves_anticlockwise() {
        let mut room = started(3);
        let order = room.state().player_order.clone();
        let first_starter = room.state().round_start_player_id.unwrap();
        let caller = current(&room);
        set_hand(&mut room, caller, vec![card(Rank::Ace)]);
        room.call_show(caller).unwrap();

        assert!(room.start_next_round());
        let idx = order.iter().position(|id| *id == first_starter).unwrap();
        let expected = order[(idx + order.len() - 1) % order.len()];
        assert_eq!(room.state().round_start_player_id, Some(expected));
        assert_eq!(current(&room), expected);
        assert_eq!(room.state().current_round, 2);
        assert!(room.state().players.iter().all(|p| p.hand.len() == HAND_SIZE));
    }

    #[test]
    fn test_start_next_round_noop_outside_round_end() {
        let mut room = started(2);
        assert!(!room.start_next_round());
        assert_eq!(room.state().current_round, 1);
    }

    #[test]
    fn test_auto_play_discards_highest_rank_then_draws() {
        let mut room = started(2);
        room.state.wild_card_rank = Some(Rank::Ace);
        room.state.discard_pile = vec![card(Rank::Two)];
        let who = current(&room);
        let hand = vec![card(Rank::Three), card(Rank::Jack), card(Rank::Jack), card(Rank::Ace)];
        set_hand(&mut room, who, hand);

        let out = room.auto_play(who).unwrap();
        assert_eq!(out.discarded.len(), 2);
        assert!(out.discarded.iter().all(|c| c.rank == Rank::Jack));
        assert!(out.drawn.is_some());
        assert_eq!(room.player(who).unwrap().hand.len(), 3);
        assert_ne!(current(&room), who);
        assert_eq!(room.state().discard_top().unwrap().rank, Rank::Jack);
    }

    #[test]
    fn test_auto_play_matching_discard_skips_draw() {
        let mut room = started(2);
        room.state.wild_card_rank = Some(Rank::Ace);
        room.state.discard_pile = vec![card(Rank::King)];
        let who = current(&room);
        set_hand(&mut room, who, vec![card(Rank::King), card(Rank::Two)]);

        let out = room.auto_play(who).unwrap();
        assert_eq!(out.drawn, None);
        assert_eq!(room.player(who).unwrap().hand.len(), 1);
        assert_ne!(current(&room), who);
    }

    #[test]
    fn test_auto_play_rolls_back_when_draw_fails() {
        let mut room = started(2);
        room.state.wild_card_rank = Some(Rank::Ace);
        room.state.discard_pile = vec![card(Rank::Two)];
        room.state.deck.clear();
        let who = current(&room);
        set_hand(&mut room, who, vec![card(Rank::Nine), card(Rank::Three)]);
        let serial = room.turn_serial();

        assert_eq!(
            room.auto_play(who),
            Err(GameError::EmptySource(DrawSource::Deck))
        );
        assert_eq!(room.player(who).unwrap().hand.len(), 2);
        assert!(room.state().current_turn_discard_pile.is_empty());
        assert_eq!(current(&room), who);
        assert_eq!(room.turn_serial(), serial);
    }

    #[test]
    fn test_remove_player_transfers_host() {
        let mut room = room_with(3, GameSettings::default());
        room.remove_player(PlayerId(1)).unwrap();
        assert_eq!(room.host_id(), PlayerId(2));
        assert!(room.player(PlayerId(2)).unwrap().is_host);
        assert_eq!(room.player_count(), 2);
    }

    #[test]
    fn test_remove_player_locked_during_game() {
        let mut room = started(2);
        assert!(matches!(
            room.remove_player(PlayerId(2)),
            Err(GameError::SeatLocked(id)) if id == PlayerId(2)
        ));
        assert_eq!(room.player_count(), 2);
    }

    #[test]
    fn test_lobby_host_disconnect_hands_off_host() {
        let mut room = room_with(3, GameSettings::default());
        room.mark_disconnected(ConnectionId(2));
        assert_eq!(room.mark_disconnected(ConnectionId(1)), Some(PlayerId(1)));
        assert_eq!(room.host_id(), PlayerId(3));
        assert!(!room.player(PlayerId(1)).unwrap().is_host);
        assert!(room.player(PlayerId(3)).unwrap().is_host);
        assert_eq!(room.start_game(PlayerId(3)), Ok(()));
    }

    #[test]
    fn test_host_disconnect_mid_game_keeps_host() {
        let mut room = started(2);
        room.mark_disconnected(ConnectionId(1));
        assert_eq!(room.host_id(), PlayerId(1));
    }

    #[test]
    fn test_disconnect_and_rebind() {
        let mut room = room_with(2, GameSettings::default());
        let token = room.player(PlayerId(2)).unwrap().token.clone();

        assert_eq!(room.mark_disconnected(ConnectionId(2)), Some(PlayerId(2)));
        assert_eq!(room.connected_count(), 1);
        assert!(room.player_by_connection(ConnectionId(2)).is_none());

        assert_eq!(room.rebind(&token, ConnectionId(77)), Ok(PlayerId(2)));
        assert_eq!(room.player_by_connection(ConnectionId(77)).unwrap().id, PlayerId(2));
        assert_eq!(
            room.rebind(&PlayerToken::new("nope"), ConnectionId(78)),
            Err(GameError::InvalidToken)
        );
    }

    #[test]
    fn test_snapshot_hides_deck_and_tokens() {
        let room = started(2);
        let snap = room.snapshot();
        assert!(snap.deck.is_empty());
        assert_eq!(snap.deck_count, room.state().deck.len());

        let json = serde_json::to_value(&*snap).unwrap();
        assert!(json.get("deck").is_none());
        assert_eq!(json["deckCount"], room.state().deck.len());
        assert!(json["players"][0].get("token").is_none());
        assert_eq!(json["gamePhase"], "playing");
    }
}
