//! Length-prefixed framing for the shared data characteristic
//!
//! # Frame Format
//!
//! Command direction (host → co-processor):
//! ```text
//! [len] [opcode] [payload ...]
//! ```
//! The length byte counts the opcode plus the payload, so it is always
//! `1 + payload.len()`. This prefix is part of the wire contract with the
//! co-processor's receive buffer and must match exactly.
//!
//! Response direction (co-processor → host):
//! ```text
//! [result] [payload ...]
//! ```
//! An empty buffer means "no response yet"; callers filter empty reads out
//! before decoding, so the decoder treats them as malformed.

use std::fmt;

use tracing::trace;

use crate::error::ProtocolError;

/// Largest payload representable in the one-byte length prefix
///
/// The prefix counts the opcode byte, so a full frame value is at most
/// 256 bytes: `[0xFF] [opcode] [254 payload bytes]`.
pub const MAX_PAYLOAD_LEN: usize = 254;

/// Encode an opcode byte and payload into a length-prefixed frame
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            limit: MAX_PAYLOAD_LEN,
        });
    }
    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.push((1 + payload.len()) as u8);
    frame.push(opcode);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parse a length-prefixed frame back into its opcode byte and payload
///
/// This is the device-side view of [`encode_frame`], used by simulators and
/// test doubles that stand in for the co-processor.
pub fn parse_frame(raw: &[u8]) -> Result<(u8, Vec<u8>), ProtocolError> {
    if raw.len() < 2 {
        return Err(ProtocolError::InvalidFrame(format!(
            "{} bytes, need at least 2",
            raw.len()
        )));
    }
    let declared = raw[0] as usize;
    if declared != raw.len() - 1 {
        return Err(ProtocolError::InvalidFrame(format!(
            "length byte says {} bytes, frame holds {}",
            declared,
            raw.len() - 1
        )));
    }
    Ok((raw[1], raw[2..].to_vec()))
}

/// Result code reported in the first byte of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Command completed (0xdd)
    Success,
    /// Listen window elapsed with no packet (0xaa)
    RxTimeout,
    /// Command was aborted by an interrupt (0xbb)
    Interrupted,
    /// Command produced no data (0xcc)
    ZeroData,
    /// Parameter rejected by the firmware (0x11)
    InvalidParam,
    /// Opcode unknown to the firmware (0x22)
    UnknownCommand,
    /// Value outside the documented table, preserved verbatim
    Unrecognized(u8),
}

impl ResultCode {
    /// Decode the result byte
    pub fn from_raw(byte: u8) -> Self {
        match byte {
            0xdd => ResultCode::Success,
            0xaa => ResultCode::RxTimeout,
            0xbb => ResultCode::Interrupted,
            0xcc => ResultCode::ZeroData,
            0x11 => ResultCode::InvalidParam,
            0x22 => ResultCode::UnknownCommand,
            other => {
                trace!(byte = other, "unrecognized result code");
                ResultCode::Unrecognized(other)
            }
        }
    }

    /// The wire byte for this result code
    pub fn raw(&self) -> u8 {
        match self {
            ResultCode::Success => 0xdd,
            ResultCode::RxTimeout => 0xaa,
            ResultCode::Interrupted => 0xbb,
            ResultCode::ZeroData => 0xcc,
            ResultCode::InvalidParam => 0x11,
            ResultCode::UnknownCommand => 0x22,
            ResultCode::Unrecognized(byte) => *byte,
        }
    }

    /// True for [`ResultCode::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Success => write!(f, "success"),
            ResultCode::RxTimeout => write!(f, "receive timeout"),
            ResultCode::Interrupted => write!(f, "interrupted"),
            ResultCode::ZeroData => write!(f, "zero data"),
            ResultCode::InvalidParam => write!(f, "invalid parameter"),
            ResultCode::UnknownCommand => write!(f, "unknown command"),
            ResultCode::Unrecognized(byte) => write!(f, "unrecognized (0x{:02x})", byte),
        }
    }
}

/// One decoded response from the co-processor
///
/// Produced exactly once per command cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Result code from the first response byte
    pub result: ResultCode,
    /// Remaining bytes, verbatim (may be empty)
    pub payload: Vec<u8>,
    /// Link signal strength measured by the host at read time, in dBm
    pub rssi: i16,
}

impl ResponseEnvelope {
    /// Decode a raw response buffer
    ///
    /// `rssi` is the host-side signal strength sampled when the buffer was
    /// read; it travels with the envelope but is not part of the frame.
    pub fn decode(raw: &[u8], rssi: i16) -> Result<Self, ProtocolError> {
        let Some((&result, payload)) = raw.split_first() else {
            return Err(ProtocolError::MalformedResponse(
                "empty response buffer".into(),
            ));
        };
        Ok(Self {
            result: ResultCode::from_raw(result),
            payload: payload.to_vec(),
            rssi,
        })
    }
}
