//! Unified error type for the Least Count server.

use leastcount_protocol::ProtocolError;
use leastcount_room::RoomError;

use crate::transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LeastCountError {
    /// A transport-level error (bind, handshake, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, not seated, actor gone).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An invalid `LEASTCOUNT_*` environment value.
    #[error("invalid config: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use leastcount_game::RoomCode;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: LeastCountError = TransportError::NotText.into();
        assert!(matches!(err, LeastCountError::Transport(_)));
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: LeastCountError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, LeastCountError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error_is_transparent() {
        let room = RoomError::NotFound(RoomCode::parse("ABC123"));
        let expected = room.to_string();
        let err: LeastCountError = room.into();
        assert!(matches!(err, LeastCountError::Room(_)));
        assert_eq!(err.to_string(), expected);
    }
}
