//! GATT transport boundary
//!
//! The bridge core consumes exactly four operations against the dongle's
//! GATT database: characteristic write, characteristic read, notification
//! subscribe, and one descriptor write to arm notifications, plus a link
//! signal-strength read. Everything upstream of those operations (adapter
//! init, scanning, connection, service discovery) belongs to the caller,
//! which hands the core an implementation of [`GattTransport`].
//!
//! The trait is object-safe so real adapters and test doubles plug in
//! behind `Arc<dyn GattTransport>`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// GATT UUIDs exposed by the dongle
pub mod uuids {
    /// Primary radio bridge service
    pub const RADIO_SERVICE: &str = "0235733b-99c5-4197-b856-69219c2a3845";
    /// Shared command/response data characteristic
    pub const DATA: &str = "c842e849-5028-42e2-867c-016adada9155";
    /// Response-ready notification characteristic
    pub const RESPONSE_COUNT: &str = "6e6c7910-b89e-43a5-a0fe-50c5e2b81f4a";
    /// Periodic timer tick characteristic
    pub const TIMER_TICK: &str = "6e6c7910-b89e-43a5-78af-50c5e2b86f7e";
    /// User-assigned device name
    pub const CUSTOM_NAME: &str = "d93b2af0-1e28-11e4-8c21-0800200c9a66";
    /// BLE supervisor firmware version string
    pub const FIRMWARE_VERSION: &str = "30d99dc9-7c91-4295-a051-0a104d238cf2";
    /// Diagnostic LED mode byte
    pub const LED_MODE: &str = "c6d84241-f1a7-4f9c-a25f-fce16732f14e";
    /// Standard battery service / level characteristic
    pub const BATTERY_SERVICE: u16 = 0x180f;
    pub const BATTERY_LEVEL: u16 = 0x2a19;
    /// Client characteristic configuration descriptor
    pub const CLIENT_CHARACTERISTIC_CONFIG: u16 = 0x2902;
}

/// Client-configuration value that arms notifications
pub const ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];
/// Client-configuration value that disarms notifications
pub const DISABLE_NOTIFICATIONS: [u8; 2] = [0x00, 0x00];

/// Characteristic slots the core addresses on the dongle
///
/// Adapters map these to the discovered GATT handles for the UUIDs in
/// [`uuids`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Shared command/response buffer
    Data,
    /// Response-ready counter (notifying)
    ResponseCount,
    /// Periodic tick (notifying, unused by the command cycle)
    TimerTick,
    /// User-assigned device name
    CustomName,
    /// BLE supervisor firmware version
    FirmwareVersion,
    /// Diagnostic LED mode
    LedMode,
    /// Battery percentage
    BatteryLevel,
}

/// Descriptor slots the core writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// CCCD on the response-count characteristic
    ResponseCountClientConfig,
}

/// Failures at the GATT boundary
///
/// Fatal to the current call, not to the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("characteristic write failed: {0}")]
    Write(String),

    #[error("characteristic read failed: {0}")]
    Read(String),

    #[error("notification subscribe failed: {0}")]
    Subscribe(String),

    #[error("descriptor write failed: {0}")]
    Descriptor(String),

    #[error("signal strength unavailable: {0}")]
    SignalStrength(String),
}

/// The four GATT operations the bridge core consumes
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Write a characteristic value
    async fn write_characteristic(
        &self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Read a characteristic value; an empty buffer is a valid result
    async fn read_characteristic(
        &self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError>;

    /// Route notifications from a characteristic into `sink`
    ///
    /// The sender is dropped by the adapter when the connection ends, which
    /// is how waiters observe the loss.
    async fn subscribe(
        &self,
        characteristic: Characteristic,
        sink: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), TransportError>;

    /// Write a descriptor value
    async fn write_descriptor(
        &self,
        descriptor: Descriptor,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Current link RSSI in dBm
    async fn read_signal_strength(&self) -> Result<i16, TransportError>;
}

/// Lifetime token for one BLE connection
///
/// Cloned into every party that can observe or cause the disconnect. When
/// closed, in-progress notification waits and poll-reads abort with
/// `Disconnected` instead of hanging on a dead link.
#[derive(Debug, Clone)]
pub struct ConnectionLifetime {
    alive: Arc<watch::Sender<bool>>,
}

impl ConnectionLifetime {
    /// A fresh, open connection lifetime
    pub fn new() -> Self {
        let (alive, _) = watch::channel(true);
        Self {
            alive: Arc::new(alive),
        }
    }

    /// Mark the connection closed, waking every watcher
    pub fn close(&self) {
        self.alive.send_replace(false);
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        !*self.alive.borrow()
    }

    /// Watch side used by suspension points to race against disconnect
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.alive.subscribe()
    }
}

impl Default for ConnectionLifetime {
    fn default() -> Self {
        Self::new()
    }
}
