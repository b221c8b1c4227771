//! Simulated Telemetry Dongle
//!
//! This crate provides a [`SimulatedDongle`] that stands in for the real
//! BLE dongle behind the [`subg_link::GattTransport`] boundary. It parses
//! the length-prefixed command frames the bridge writes, runs a small model
//! of the co-processor (registers, counters, a canned over-the-air packet
//! queue), and produces protocol-accurate responses and response-count
//! notifications.
//!
//! Behavior knobs on [`SimConfig`] recreate the awkward corners of the real
//! hardware: dropped notifications, slow responses, a firmware too old to
//! answer single-address register reads, and a device that never responds
//! at all.

pub mod dongle;

pub use dongle::{SimConfig, SimEvent, SimulatedDongle};
