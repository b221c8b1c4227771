//! Error types for command framing and payload decoding

use thiserror::Error;

/// Errors produced while encoding frames or decoding device payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Response buffer does not hold a decodable value
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Command payload cannot be represented in the one-byte length prefix
    #[error("payload too large: {len} bytes exceeds the {limit}-byte frame limit")]
    PayloadTooLarge { len: usize, limit: usize },

    /// Raw frame bytes are not a valid length-prefixed frame
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The active protocol revision has no wire byte for this command
    #[error("command {command} is not available in protocol revision {revision}")]
    UnsupportedCommand {
        command: &'static str,
        revision: &'static str,
    },
}
