//! Radio Co-Processor Protocol Library
//!
//! This crate provides framing and payload codecs for the byte-oriented
//! command/response protocol spoken by the sub-GHz radio co-processor inside
//! a telemetry dongle. The dongle's BLE layer forwards frames between a GATT
//! characteristic and the co-processor's serial receive buffer; this crate
//! knows nothing about BLE and performs no I/O.
//!
//! # Wire Format
//!
//! Commands written to the shared data characteristic:
//! ```text
//! [len] [opcode] [payload ...]      len = 1 + payload length
//! ```
//!
//! Responses read back from the same characteristic:
//! ```text
//! [result] [payload ...]            empty read = "not ready yet"
//! ```
//!
//! # Modules
//!
//! - [`command`]: the logical command set, the versioned opcode tables, and
//!   payload constructors
//! - [`frame`]: length-prefixed framing and the response envelope
//! - [`registers`]: co-processor register map and the 16.16 fixed-point
//!   frequency codec
//! - [`stats`]: the fixed-width link statistics record
//! - [`pump`]: pump telemetry message-type table (enumeration only; message
//!   bodies belong to the pump protocol layer)
//!
//! # Example
//!
//! ```rust
//! use subg_protocol::{frame, Command, Opcode, OpcodeTable, ProtocolRevision};
//!
//! let table = OpcodeTable::for_revision(ProtocolRevision::V2);
//! let cmd = Command::bare(Opcode::GetState);
//! let opcode = table.wire_byte(cmd.opcode()).unwrap();
//!
//! let bytes = frame::encode_frame(opcode, cmd.payload()).unwrap();
//! assert_eq!(bytes, vec![0x01, 0x02]);
//! ```

pub mod command;
pub mod error;
pub mod frame;
pub mod pump;
pub mod registers;
pub mod stats;

pub use command::{Command, LedColor, LedMode, Opcode, OpcodeTable, PacketChannel};
pub use error::ProtocolError;
pub use frame::{ResponseEnvelope, ResultCode};
pub use registers::{Register, RxBandwidth, SwEncoding, OSCILLATOR_HZ};
pub use stats::LinkStatistics;

/// Identifies which revision of the co-processor command numbering is in use
///
/// The firmware has shipped two incompatible opcode tables for the same
/// logical commands: the legacy numbering has no interrupt opcode and jumps
/// from read-register = 0x09 to set-mode-registers = 0x10, while the later
/// numbering inserts interrupt first and runs contiguously. The active
/// revision is configuration, resolved by the caller; see [`OpcodeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolRevision {
    /// Original numbering: get-state = 0x01, no interrupt command
    Legacy,
    /// Revised numbering: interrupt = 0x01, contiguous through 0x0f
    V2,
}

impl ProtocolRevision {
    /// Returns a human-readable name for the revision
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolRevision::Legacy => "legacy",
            ProtocolRevision::V2 => "v2",
        }
    }
}
