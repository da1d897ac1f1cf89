//! Codec trait and the JSON implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to and from bytes.
///
/// `Send + Sync + 'static` so one codec can be shared by every connection
/// task.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// `ProtocolError::Decode` if the bytes are malformed or don't match
    /// `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`. Browser clients speak this.
///
/// ```rust
/// use leastcount_protocol::{ClientMessage, Codec, Envelope, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"seq":1,"timestamp":0,"payload":{"id":7,"message":{"type":"startGame"}}}"#;
/// let env: Envelope<Request> = codec.decode(bytes).unwrap();
/// assert_eq!(env.payload.message, ClientMessage::StartGame);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
