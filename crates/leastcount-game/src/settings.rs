//! Game settings and the phase state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameSettings
// ---------------------------------------------------------------------------

/// How a game decides it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndCondition {
    /// Players reaching `point_limit` are eliminated; last one standing wins.
    PointLimit,
    /// A fixed number of rounds; lowest total wins.
    RoundLimit,
}

/// Settings the host picks when creating a room.
///
/// Arrives from the client, so pass it through [`validated`](Self::validated)
/// before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    #[serde(rename = "endConditionType")]
    pub end_condition: EndCondition,

    /// Elimination threshold. Only read in point-limit mode.
    pub point_limit: u32,

    /// Number of rounds. Only read in round-limit mode.
    pub round_limit: u32,

    pub timer_enabled: bool,

    /// Turn time in seconds.
    #[serde(rename = "timerDuration")]
    pub timer_duration_secs: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            end_condition: EndCondition::PointLimit,
            point_limit: 200,
            round_limit: 5,
            timer_enabled: true,
            timer_duration_secs: 30,
        }
    }
}

impl GameSettings {
    /// Shortest turn timer accepted.
    pub const MIN_TIMER_SECS: u64 = 5;
    /// Longest turn timer accepted.
    pub const MAX_TIMER_SECS: u64 = 300;

    /// Clamps out-of-range values so the settings are safe to play with.
    ///
    /// - `point_limit` and `round_limit` at least 1.
    /// - `timer_duration_secs` within
    ///   [`MIN_TIMER_SECS`](Self::MIN_TIMER_SECS)..=[`MAX_TIMER_SECS`](Self::MAX_TIMER_SECS).
    pub fn validated(mut self) -> Self {
        if self.point_limit == 0 {
            tracing::warn!("point_limit of 0 raised to 1");
            self.point_limit = 1;
        }
        if self.round_limit == 0 {
            tracing::warn!("round_limit of 0 raised to 1");
            self.round_limit = 1;
        }
        let clamped = self
            .timer_duration_secs
            .clamp(Self::MIN_TIMER_SECS, Self::MAX_TIMER_SECS);
        if clamped != self.timer_duration_secs {
            tracing::warn!(
                requested = self.timer_duration_secs,
                clamped,
                "timer duration out of range, clamping"
            );
            self.timer_duration_secs = clamped;
        }
        self
    }

    /// Turn duration when the timer is on, `None` otherwise.
    pub fn turn_duration(&self) -> Option<Duration> {
        self.timer_enabled
            .then(|| Duration::from_secs(self.timer_duration_secs))
    }
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// The phase of a room's game.
///
/// ```text
/// Lobby → Playing ⇄ RoundEnd
///            │          │
///            └──────────┴──→ GameEnd
/// ```
///
/// `GameEnd` is terminal: no game action is accepted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    Lobby,
    Playing,
    RoundEnd,
    GameEnd,
}

impl GamePhase {
    /// Returns `true` if new players may take a seat.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` while a game is underway (seats are locked in).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::RoundEnd)
    }

    /// Returns `true` if transitioning to `target` is a legal move.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::Playing)
                | (Self::Playing, Self::RoundEnd)
                | (Self::Playing, Self::GameEnd)
                | (Self::RoundEnd, Self::Playing)
        )
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
            Self::RoundEnd => write!(f, "roundEnd"),
            Self::GameEnd => write!(f, "gameEnd"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        assert!(GamePhase::Lobby.can_transition_to(GamePhase::Playing));
        assert!(GamePhase::Playing.can_transition_to(GamePhase::RoundEnd));
        assert!(GamePhase::RoundEnd.can_transition_to(GamePhase::Playing));
        assert!(GamePhase::Playing.can_transition_to(GamePhase::GameEnd));
        assert!(!GamePhase::Lobby.can_transition_to(GamePhase::RoundEnd));
        assert!(!GamePhase::GameEnd.can_transition_to(GamePhase::Playing));
        assert!(!GamePhase::RoundEnd.can_transition_to(GamePhase::GameEnd));
    }

    #[test]
    fn test_phase_is_joinable_only_in_lobby() {
        assert!(GamePhase::Lobby.is_joinable());
        assert!(!GamePhase::Playing.is_joinable());
        assert!(!GamePhase::RoundEnd.is_joinable());
        assert!(!GamePhase::GameEnd.is_joinable());
    }

    #[test]
    fn test_phase_display_matches_wire_name() {
        assert_eq!(GamePhase::RoundEnd.to_string(), "roundEnd");
        let json = serde_json::to_string(&GamePhase::RoundEnd).unwrap();
        assert_eq!(json, "\"roundEnd\"");
    }

    #[test]
    fn test_settings_default() {
        let s = GameSettings::default();
        assert_eq!(s.end_condition, EndCondition::PointLimit);
        assert_eq!(s.point_limit, 200);
        assert_eq!(s.round_limit, 5);
        assert_eq!(s.turn_duration(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_settings_validated_clamps() {
        let s = GameSettings {
            point_limit: 0,
            round_limit: 0,
            timer_duration_secs: 1,
            ..GameSettings::default()
        }
        .validated();
        assert_eq!(s.point_limit, 1);
        assert_eq!(s.round_limit, 1);
        assert_eq!(s.timer_duration_secs, GameSettings::MIN_TIMER_SECS);
    }

    #[test]
    fn test_settings_timer_disabled_has_no_duration() {
        let s = GameSettings {
            timer_enabled: false,
            ..GameSettings::default()
        };
        assert_eq!(s.turn_duration(), None);
    }

    #[test]
    fn test_settings_json_uses_client_field_names() {
        let json = r#"{
            "endConditionType": "roundLimit",
            "pointLimit": 100,
            "roundLimit": 3,
            "timerEnabled": false,
            "timerDuration": 45
        }"#;
        let s: GameSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.end_condition, EndCondition::RoundLimit);
        assert_eq!(s.round_limit, 3);
        assert_eq!(s.timer_duration_secs, 45);
        assert!(!s.timer_enabled);
    }
}
