//! Radio Bridge Core
//!
//! This crate turns an established BLE GATT connection to a telemetry
//! dongle into a typed command surface for the sub-GHz radio co-processor
//! behind it. The dongle exposes one shared "data" characteristic used in
//! both directions: the host writes a length-prefixed command frame to it
//! and later reads the response back from it; a second "response count"
//! characteristic notifies the host that a response has become available.
//!
//! # Architecture
//!
//! - [`transport`]: the four-operation GATT boundary the core consumes,
//!   plus the connection lifetime token. BLE adapter setup, discovery, and
//!   characteristic binding live behind this trait, outside the crate.
//! - [`channel`]: the command/response exchange: write the frame, wait for
//!   the wake notification (or its one-second ceiling), then poll-read the
//!   data characteristic until the response appears.
//! - [`bridge`]: the [`RadioBridge`] facade, one async operation per radio
//!   command, with a mutex front door so only one command is ever in
//!   flight.
//! - [`config`]: protocol revision selection, timeouts, the poll retry
//!   policy, and firmware capability resolution.
//!
//! # Command cycle
//!
//! ```text
//! facade ── encode ──> data characteristic
//!                      response-count notification ──┐ (advisory, 1 s cap)
//! facade <── decode ── data characteristic <── poll ──┘
//! ```
//!
//! Exactly one connection to exactly one co-processor is assumed; there is
//! no reconnection or multi-device handling here.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod transport;

pub use bridge::RadioBridge;
pub use channel::{CommandChannel, ResponseSignal};
pub use config::{BridgeConfig, FirmwareCapabilities, RetryPolicy};
pub use error::LinkError;
pub use transport::{
    Characteristic, ConnectionLifetime, Descriptor, GattTransport, TransportError,
    ENABLE_NOTIFICATIONS,
};
