//! Error types for the bridge core

use subg_protocol::{ProtocolError, ResultCode};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the command cycle and the facade
///
/// Callers receive either a fully decoded result or one of these; there is
/// no partially populated success. Nothing here is retried internally;
/// retry policy belongs to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// GATT operation failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame or payload could not be encoded/decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The co-processor answered with a non-success result code
    #[error("device rejected command: {0}")]
    DeviceRejected(ResultCode),

    /// The connection lifetime ended while the call was in flight
    #[error("connection closed")]
    Disconnected,

    /// The poll-read budget ran out before a response appeared
    #[error("no response after {attempts} read attempts")]
    NoResponse { attempts: u32 },

    /// get-state answered success but not with the expected "OK"
    #[error("unexpected state reply: {0:?}")]
    UnexpectedStateReply(Vec<u8>),
}
