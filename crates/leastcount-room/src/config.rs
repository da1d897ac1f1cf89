//! Registry configuration and the stale-room policy.

use std::fmt;
use std::time::Duration;

use leastcount_game::{GamePhase, RoomCode};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::RoomInfo;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room the registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Bound on each room actor's command queue. Senders wait when full.
    pub channel_size: usize,

    /// Length of generated room codes.
    pub code_len: usize,

    /// When rooms get cleaned up.
    pub sweep: SweepPolicy,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            code_len: RoomCode::LEN,
            sweep: SweepPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SweepPolicy
// ---------------------------------------------------------------------------

/// Thresholds for evicting rooms nobody will come back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// How long a finished game stays around for the results screen.
    pub finished_grace: Duration,

    /// How long a room may sit in the lobby without starting.
    pub lobby_ttl: Duration,

    /// Age after which a room with no connected players is dropped.
    pub abandoned_ttl: Duration,

    /// Hard cap on room lifetime, whatever the phase.
    pub max_age: Duration,

    /// Time between sweeps.
    pub interval: Duration,

    /// Delay before a just-finished room is deleted, if nobody restarted
    /// anything in the meantime.
    pub post_game_cleanup: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            finished_grace: Duration::from_secs(3 * 60),
            lobby_ttl: Duration::from_secs(15 * 60),
            abandoned_ttl: Duration::from_secs(2 * 60),
            max_age: Duration::from_secs(60 * 60),
            interval: Duration::from_secs(10 * 60),
            post_game_cleanup: Duration::from_secs(5 * 60),
        }
    }
}

/// Why a sweep dropped a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    Finished,
    IdleLobby,
    Abandoned,
    Expired,
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::IdleLobby => write!(f, "idle lobby"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl SweepPolicy {
    /// Returns why `info` should be evicted at `now`, or `None` to keep it.
    pub fn eviction_reason(&self, info: &RoomInfo, now: Instant) -> Option<EvictReason> {
        let age = now.saturating_duration_since(info.created_at);

        if info.phase == GamePhase::GameEnd {
            let finished = info.finished_at.unwrap_or(info.created_at);
            if now.saturating_duration_since(finished) > self.finished_grace {
                return Some(EvictReason::Finished);
            }
        }
        if info.phase == GamePhase::Lobby && age > self.lobby_ttl {
            return Some(EvictReason::IdleLobby);
        }
        if info.connected_count == 0 && age > self.abandoned_ttl {
            return Some(EvictReason::Abandoned);
        }
        if age > self.max_age {
            return Some(EvictReason::Expired);
        }
        None
    }
}
