//! BLE-level device accessors
//!
//! The dongle's supervising BLE chip exposes a handful of plain
//! characteristics next to the radio command channel: battery, custom
//! name, its own firmware version, and the diagnostic LED mode. These are
//! direct reads and writes with no command framing and no notification
//! cycle, so they bypass the exchange mutex entirely.

use subg_protocol::{LedMode, ProtocolError};
use tracing::debug;

use crate::bridge::RadioBridge;
use crate::error::LinkError;
use crate::transport::Characteristic;

impl RadioBridge {
    /// Battery charge as a percentage
    pub async fn battery_level(&self) -> Result<u8, LinkError> {
        let data = self
            .transport()
            .read_characteristic(Characteristic::BatteryLevel)
            .await?;
        let level = data.first().copied().ok_or_else(|| {
            ProtocolError::MalformedResponse("empty battery level read".into())
        })?;
        Ok(level)
    }

    /// The user-assigned device name
    pub async fn custom_name(&self) -> Result<String, LinkError> {
        let data = self
            .transport()
            .read_characteristic(Characteristic::CustomName)
            .await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Assign a new device name
    pub async fn set_custom_name(&self, name: &str) -> Result<(), LinkError> {
        debug!(name, "set_custom_name");
        self.transport()
            .write_characteristic(Characteristic::CustomName, name.as_bytes())
            .await?;
        Ok(())
    }

    /// Version string of the supervising BLE firmware
    ///
    /// Distinct from [`radio_version`](RadioBridge::radio_version), which
    /// is the sub-GHz co-processor's banner.
    pub async fn ble_version(&self) -> Result<String, LinkError> {
        let data = self
            .transport()
            .read_characteristic(Characteristic::FirmwareVersion)
            .await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Current diagnostic LED mode
    pub async fn led_mode(&self) -> Result<LedMode, LinkError> {
        let data = self
            .transport()
            .read_characteristic(Characteristic::LedMode)
            .await?;
        let raw = data.first().copied().ok_or_else(|| {
            ProtocolError::MalformedResponse("empty LED mode read".into())
        })?;
        LedMode::from_raw(raw).ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("unknown LED mode 0x{raw:02x}")).into()
        })
    }

    /// Switch the diagnostic LED mode
    pub async fn set_led_mode(&self, mode: LedMode) -> Result<(), LinkError> {
        debug!(?mode, "set_led_mode");
        self.transport()
            .write_characteristic(Characteristic::LedMode, &[mode as u8])
            .await?;
        Ok(())
    }
}
