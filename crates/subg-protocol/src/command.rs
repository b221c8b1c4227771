//! Logical command set and the versioned opcode tables
//!
//! The co-processor understands a closed set of commands, but the byte each
//! command occupies on the wire differs between firmware revisions. The
//! legacy table starts at get-state = 0x01, has no interrupt command, and
//! jumps from read-register = 0x09 to set-mode-registers = 0x10; the v2
//! table inserts interrupt = 0x01, shifts the commands before the gap up by
//! one, and closes the gap. [`OpcodeTable`] treats the numbering as data
//! selected by [`ProtocolRevision`] so neither table is baked into the enum
//! itself.

use std::time::Duration;

use crate::error::ProtocolError;
use crate::registers::{Register, SwEncoding};
use crate::ProtocolRevision;

/// Logical commands understood by the radio co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    /// Abort whatever the radio is currently doing (v2 firmware only)
    Interrupt,
    /// Diagnostic liveness probe; a healthy radio answers "OK"
    GetState,
    /// Read the radio firmware version banner
    GetVersion,
    /// Listen on a channel for one radio packet
    GetPacket,
    /// Transmit a pre-built radio payload
    SendPacket,
    /// Transmit, then immediately listen for the reply
    SendAndListen,
    /// Write one configuration register
    UpdateRegister,
    /// Reboot the co-processor (fire-and-forget)
    Reset,
    /// Drive the diagnostic LED
    Led,
    /// Read one configuration register
    ReadRegister,
    /// Load the mode register bank
    SetModeRegisters,
    /// Select the software encoding applied to packets
    SetSwEncoding,
    /// Configure the transmit preamble
    SetPreamble,
    /// Restore the default radio configuration
    ResetRadioConfig,
    /// Read the link statistics record
    GetStatistics,
}

impl Opcode {
    /// Every logical command, in v2 wire order
    pub const ALL: [Opcode; 15] = [
        Opcode::Interrupt,
        Opcode::GetState,
        Opcode::GetVersion,
        Opcode::GetPacket,
        Opcode::SendPacket,
        Opcode::SendAndListen,
        Opcode::UpdateRegister,
        Opcode::Reset,
        Opcode::Led,
        Opcode::ReadRegister,
        Opcode::SetModeRegisters,
        Opcode::SetSwEncoding,
        Opcode::SetPreamble,
        Opcode::ResetRadioConfig,
        Opcode::GetStatistics,
    ];

    /// Returns the command's name as it appears in the protocol notes
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Interrupt => "interrupt",
            Opcode::GetState => "get-state",
            Opcode::GetVersion => "get-version",
            Opcode::GetPacket => "get-packet",
            Opcode::SendPacket => "send-packet",
            Opcode::SendAndListen => "send-and-listen",
            Opcode::UpdateRegister => "update-register",
            Opcode::Reset => "reset",
            Opcode::Led => "led",
            Opcode::ReadRegister => "read-register",
            Opcode::SetModeRegisters => "set-mode-registers",
            Opcode::SetSwEncoding => "set-sw-encoding",
            Opcode::SetPreamble => "set-preamble",
            Opcode::ResetRadioConfig => "reset-radio-config",
            Opcode::GetStatistics => "get-statistics",
        }
    }
}

/// Maps logical commands to wire bytes for one protocol revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeTable {
    revision: ProtocolRevision,
}

impl OpcodeTable {
    /// Build the table for a firmware revision
    pub fn for_revision(revision: ProtocolRevision) -> Self {
        Self { revision }
    }

    /// The revision this table encodes for
    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// Wire byte for a logical command, or `None` when the revision lacks it
    pub fn wire_byte(&self, opcode: Opcode) -> Option<u8> {
        match self.revision {
            ProtocolRevision::Legacy => legacy_byte(opcode),
            ProtocolRevision::V2 => Some(v2_byte(opcode)),
        }
    }

    /// Like [`wire_byte`](Self::wire_byte) but with a typed error
    pub fn require_wire_byte(&self, opcode: Opcode) -> Result<u8, ProtocolError> {
        self.wire_byte(opcode)
            .ok_or(ProtocolError::UnsupportedCommand {
                command: opcode.name(),
                revision: self.revision.name(),
            })
    }

    /// Logical command for a wire byte, or `None` for an unassigned value
    pub fn opcode(&self, byte: u8) -> Option<Opcode> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| self.wire_byte(*op) == Some(byte))
    }
}

fn legacy_byte(opcode: Opcode) -> Option<u8> {
    let byte = match opcode {
        Opcode::Interrupt => return None,
        Opcode::GetState => 0x01,
        Opcode::GetVersion => 0x02,
        Opcode::GetPacket => 0x03,
        Opcode::SendPacket => 0x04,
        Opcode::SendAndListen => 0x05,
        Opcode::UpdateRegister => 0x06,
        Opcode::Reset => 0x07,
        Opcode::Led => 0x08,
        Opcode::ReadRegister => 0x09,
        Opcode::SetModeRegisters => 0x10,
        Opcode::SetSwEncoding => 0x11,
        Opcode::SetPreamble => 0x12,
        Opcode::ResetRadioConfig => 0x13,
        Opcode::GetStatistics => 0x14,
    };
    Some(byte)
}

fn v2_byte(opcode: Opcode) -> u8 {
    match opcode {
        Opcode::Interrupt => 0x01,
        Opcode::GetState => 0x02,
        Opcode::GetVersion => 0x03,
        Opcode::GetPacket => 0x04,
        Opcode::SendPacket => 0x05,
        Opcode::SendAndListen => 0x06,
        Opcode::UpdateRegister => 0x07,
        Opcode::Reset => 0x08,
        Opcode::Led => 0x09,
        Opcode::ReadRegister => 0x0a,
        Opcode::SetModeRegisters => 0x0b,
        Opcode::SetSwEncoding => 0x0c,
        Opcode::SetPreamble => 0x0d,
        Opcode::ResetRadioConfig => 0x0e,
        Opcode::GetStatistics => 0x0f,
    }
}

/// Diagnostic LED selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LedColor {
    Green = 0x00,
    Blue = 0x01,
}

/// Diagnostic LED behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LedMode {
    Off = 0x00,
    On = 0x01,
    Auto = 0x02,
}

impl LedMode {
    /// Decode a mode byte read back from the device
    pub fn from_raw(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(LedMode::Off),
            0x01 => Some(LedMode::On),
            0x02 => Some(LedMode::Auto),
            _ => None,
        }
    }
}

/// Logical radio channel a packet listen targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketChannel {
    /// Insulin pump traffic
    Pump = 0x00,
    /// Glucose meter traffic
    Meter = 0x01,
}

/// One command: a logical opcode plus its payload bytes
///
/// Immutable once constructed. The wire byte is not part of the command;
/// it is resolved against an [`OpcodeTable`] at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    payload: Vec<u8>,
}

impl Command {
    /// A command with no payload
    pub fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    /// A command with an arbitrary payload
    pub fn with_payload(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Listen for one packet: channel byte + big-endian receive timeout in ms
    pub fn get_packet(channel: PacketChannel, timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis().min(u128::from(u32::MAX)) as u32;
        let mut payload = Vec::with_capacity(5);
        payload.push(channel as u8);
        payload.extend_from_slice(&timeout_ms.to_be_bytes());
        Self::with_payload(Opcode::GetPacket, payload)
    }

    /// Transmit a pre-built radio payload, passed through opaquely
    pub fn send_packet(raw: &[u8]) -> Self {
        Self::with_payload(Opcode::SendPacket, raw.to_vec())
    }

    /// Transmit, then listen for the reply; the payload is opaque radio data
    pub fn send_and_listen(raw: &[u8]) -> Self {
        Self::with_payload(Opcode::SendAndListen, raw.to_vec())
    }

    /// Write one configuration register
    pub fn update_register(register: Register, value: u8) -> Self {
        Self::with_payload(Opcode::UpdateRegister, vec![register.addr(), value])
    }

    /// Read one configuration register
    ///
    /// Firmware older than 2.3 only answers reliably when the address is
    /// sent twice; `double_address` carries that capability decision.
    pub fn read_register(register: Register, double_address: bool) -> Self {
        let payload = if double_address {
            vec![register.addr(), register.addr()]
        } else {
            vec![register.addr()]
        };
        Self::with_payload(Opcode::ReadRegister, payload)
    }

    /// Drive the diagnostic LED
    pub fn led(color: LedColor, mode: LedMode) -> Self {
        Self::with_payload(Opcode::Led, vec![color as u8, mode as u8])
    }

    /// Select the software encoding applied to radio packets
    pub fn set_sw_encoding(encoding: SwEncoding) -> Self {
        Self::with_payload(Opcode::SetSwEncoding, vec![encoding as u8])
    }

    /// The logical opcode
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The payload bytes (may be empty)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
