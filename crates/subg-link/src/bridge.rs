//! High-level command surface for the radio co-processor
//!
//! [`RadioBridge`] exposes one async operation per radio command. Every
//! operation builds its command, takes the exchange mutex, runs one
//! command cycle, and checks the result code before decoding. The mutex is
//! the serialization discipline the hardware demands: the wake notification
//! carries no request tag, so two interleaved commands would misattribute
//! it. Concurrent callers queue; they are never interleaved.
//!
//! Terminal outcomes are not retried here. Retry policy, if any, belongs
//! to the caller.

use std::sync::Arc;
use std::time::Duration;

use subg_protocol::registers::{frequency_from_registers, frequency_to_registers};
use subg_protocol::{
    Command, LedColor, LedMode, LinkStatistics, Opcode, OpcodeTable, PacketChannel, ProtocolError,
    Register, ResponseEnvelope, RxBandwidth, SwEncoding,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::channel::{CommandChannel, ResponseSignal};
use crate::config::{BridgeConfig, FirmwareCapabilities};
use crate::error::LinkError;
use crate::transport::{
    Characteristic, ConnectionLifetime, Descriptor, GattTransport, ENABLE_NOTIFICATIONS,
};

/// Capacity of the wake-signal slot; one outstanding command means one
/// pending notification is ever meaningful
const WAKE_SLOT: usize = 1;

/// A bridge attached to one connected dongle
///
/// Construct with [`RadioBridge::attach`] once the caller has a live GATT
/// connection. All radio commands serialize through an internal mutex;
/// the BLE-level accessors in [`crate::device`] bypass it because they
/// touch their own characteristics, not the shared data slot.
pub struct RadioBridge {
    transport: Arc<dyn GattTransport>,
    exchange: Mutex<CommandChannel>,
    lifetime: ConnectionLifetime,
    capabilities: FirmwareCapabilities,
    radio_version: String,
    reset_settle: Duration,
}

impl RadioBridge {
    /// Attach to an established connection
    ///
    /// Subscribes to the response-count characteristic, arms notifications
    /// through its client-configuration descriptor, reads the radio
    /// firmware banner, and resolves the firmware capabilities from it
    /// (unless the config forces them).
    pub async fn attach(
        transport: Arc<dyn GattTransport>,
        config: BridgeConfig,
    ) -> Result<Self, LinkError> {
        let lifetime = ConnectionLifetime::new();
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_SLOT);
        transport
            .subscribe(Characteristic::ResponseCount, wake_tx)
            .await?;
        transport
            .write_descriptor(
                Descriptor::ResponseCountClientConfig,
                &ENABLE_NOTIFICATIONS,
            )
            .await?;

        let mut exchange = CommandChannel::new(
            transport.clone(),
            OpcodeTable::for_revision(config.revision),
            wake_rx,
            lifetime.watch(),
            config.notification_timeout,
            config.read_retry,
        );

        let envelope = exchange
            .execute(&Command::bare(Opcode::GetVersion), ResponseSignal::Notified)
            .await?;
        let envelope = require_success(envelope)?;
        let radio_version = String::from_utf8_lossy(&envelope.payload).into_owned();

        let capabilities = match config.double_register_read {
            Some(double_register_read) => {
                debug!(double_register_read, "firmware capabilities forced by config");
                FirmwareCapabilities {
                    double_register_read,
                }
            }
            None => FirmwareCapabilities::from_version_banner(&radio_version),
        };
        info!(version = %radio_version, ?capabilities, "attached to radio");

        Ok(Self {
            transport,
            exchange: Mutex::new(exchange),
            lifetime,
            capabilities,
            radio_version,
            reset_settle: config.reset_settle,
        })
    }

    /// The radio firmware banner read at attach time
    pub fn radio_version(&self) -> &str {
        &self.radio_version
    }

    /// The capabilities resolved at attach time
    pub fn capabilities(&self) -> FirmwareCapabilities {
        self.capabilities
    }

    /// Lifetime token for this connection
    ///
    /// The BLE layer clones this and closes it on disconnect, which aborts
    /// any in-flight command with [`LinkError::Disconnected`].
    pub fn lifetime(&self) -> ConnectionLifetime {
        self.lifetime.clone()
    }

    /// Mark the connection closed, aborting in-flight commands
    pub fn close(&self) {
        self.lifetime.close();
    }

    pub(crate) fn transport(&self) -> &Arc<dyn GattTransport> {
        &self.transport
    }

    /// Current link RSSI in dBm
    pub async fn signal_strength(&self) -> Result<i16, LinkError> {
        Ok(self.transport.read_signal_strength().await?)
    }

    /// One serialized command cycle
    async fn command(
        &self,
        command: Command,
        signal: ResponseSignal,
    ) -> Result<ResponseEnvelope, LinkError> {
        let mut exchange = self.exchange.lock().await;
        exchange.execute(&command, signal).await
    }

    /// One serialized command cycle that must answer success
    async fn checked_command(
        &self,
        command: Command,
        signal: ResponseSignal,
    ) -> Result<ResponseEnvelope, LinkError> {
        let envelope = self.command(command, signal).await?;
        require_success(envelope)
    }

    /// Abort whatever the radio is currently doing
    pub async fn interrupt(&self) -> Result<(), LinkError> {
        self.checked_command(Command::bare(Opcode::Interrupt), ResponseSignal::Notified)
            .await?;
        Ok(())
    }

    /// Diagnostic liveness probe; `true` when the radio answers "OK"
    pub async fn get_state(&self) -> Result<bool, LinkError> {
        let envelope = self
            .checked_command(Command::bare(Opcode::GetState), ResponseSignal::Notified)
            .await?;
        if envelope.payload != b"OK" {
            return Err(LinkError::UnexpectedStateReply(envelope.payload));
        }
        Ok(true)
    }

    /// Radio firmware version banner
    pub async fn get_version(&self) -> Result<String, LinkError> {
        let envelope = self
            .checked_command(Command::bare(Opcode::GetVersion), ResponseSignal::Notified)
            .await?;
        Ok(String::from_utf8_lossy(&envelope.payload).into_owned())
    }

    /// Listen for one radio packet on a channel
    ///
    /// The envelope comes back unchecked: a receive-timeout result is a
    /// normal outcome here, and the packet payload is opaque to this layer
    /// (the pump protocol layer interprets it).
    pub async fn get_packet(
        &self,
        channel: PacketChannel,
        timeout: Duration,
    ) -> Result<ResponseEnvelope, LinkError> {
        let envelope = self
            .command(
                Command::get_packet(channel, timeout),
                ResponseSignal::Notified,
            )
            .await?;
        debug!(
            ?channel,
            ?timeout,
            result = %envelope.result,
            payload_len = envelope.payload.len(),
            "get_packet"
        );
        Ok(envelope)
    }

    /// Transmit a pre-built radio payload
    pub async fn send_packet(&self, raw: &[u8]) -> Result<(), LinkError> {
        self.checked_command(Command::send_packet(raw), ResponseSignal::Notified)
            .await?;
        Ok(())
    }

    /// Transmit, then listen for the reply
    ///
    /// Unchecked like [`get_packet`](Self::get_packet): the reply envelope
    /// may legitimately carry a receive-timeout result.
    pub async fn send_and_listen(&self, raw: &[u8]) -> Result<ResponseEnvelope, LinkError> {
        self.command(Command::send_and_listen(raw), ResponseSignal::Notified)
            .await
    }

    /// Write one configuration register
    ///
    /// The firmware answers register writes without notifying, so the
    /// response is read back immediately.
    pub async fn write_register(&self, register: Register, value: u8) -> Result<(), LinkError> {
        debug!(register = ?register, value, "write_register");
        self.checked_command(
            Command::update_register(register, value),
            ResponseSignal::Immediate,
        )
        .await?;
        Ok(())
    }

    /// Read one configuration register
    ///
    /// Doubles the address in the payload when the attached firmware needs
    /// it (see [`FirmwareCapabilities`]).
    pub async fn read_register(&self, register: Register) -> Result<u8, LinkError> {
        let envelope = self
            .checked_command(
                Command::read_register(register, self.capabilities.double_register_read),
                ResponseSignal::Immediate,
            )
            .await?;
        let value = envelope.payload.first().copied().ok_or_else(|| {
            ProtocolError::MalformedResponse("register read answered no value".into())
        })?;
        debug!(register = ?register, value, "read_register");
        Ok(value)
    }

    /// Reboot the co-processor without waiting for recovery
    ///
    /// The reset command produces no response; this is a bare frame write.
    pub async fn raw_reset(&self) -> Result<(), LinkError> {
        let mut exchange = self.exchange.lock().await;
        exchange.send_only(&Command::bare(Opcode::Reset)).await
    }

    /// Reboot the co-processor and confirm it came back
    ///
    /// Writes the reset, allows the settle time, then probes with
    /// [`get_state`](Self::get_state).
    pub async fn reset(&self) -> Result<bool, LinkError> {
        self.raw_reset().await?;
        tokio::time::sleep(self.reset_settle).await;
        self.get_state().await
    }

    /// Drive the diagnostic LED
    pub async fn led(&self, color: LedColor, mode: LedMode) -> Result<(), LinkError> {
        self.checked_command(Command::led(color, mode), ResponseSignal::Notified)
            .await?;
        Ok(())
    }

    /// Load the mode register bank
    pub async fn set_mode_registers(&self) -> Result<(), LinkError> {
        self.checked_command(
            Command::bare(Opcode::SetModeRegisters),
            ResponseSignal::Notified,
        )
        .await?;
        Ok(())
    }

    /// Select the software encoding applied to radio packets
    pub async fn set_sw_encoding(&self, encoding: SwEncoding) -> Result<(), LinkError> {
        self.checked_command(Command::set_sw_encoding(encoding), ResponseSignal::Notified)
            .await?;
        Ok(())
    }

    /// Configure the transmit preamble
    pub async fn set_preamble(&self) -> Result<(), LinkError> {
        self.checked_command(Command::bare(Opcode::SetPreamble), ResponseSignal::Notified)
            .await?;
        Ok(())
    }

    /// Restore the default radio configuration
    pub async fn reset_radio_config(&self) -> Result<(), LinkError> {
        self.checked_command(
            Command::bare(Opcode::ResetRadioConfig),
            ResponseSignal::Notified,
        )
        .await?;
        Ok(())
    }

    /// Read the link statistics record
    pub async fn get_statistics(&self) -> Result<LinkStatistics, LinkError> {
        let envelope = self
            .checked_command(
                Command::bare(Opcode::GetStatistics),
                ResponseSignal::Notified,
            )
            .await?;
        Ok(LinkStatistics::decode(&envelope.payload)?)
    }

    /// Read the radio's current tuning in Hz
    ///
    /// Recomputed from the three frequency registers on every call; the
    /// tuning is never cached host-side.
    pub async fn get_frequency(&self) -> Result<u32, LinkError> {
        let freq2 = self.read_register(Register::Freq2).await?;
        let freq1 = self.read_register(Register::Freq1).await?;
        let freq0 = self.read_register(Register::Freq0).await?;
        let hz = frequency_from_registers(freq2, freq1, freq0);
        debug!(hz, "get_frequency");
        Ok(hz)
    }

    /// Tune the radio to a frequency in Hz
    ///
    /// Lands within one register count (≈366 Hz) of the requested value.
    pub async fn set_frequency(&self, hz: u32) -> Result<(), LinkError> {
        let (freq2, freq1, freq0) = frequency_to_registers(hz);
        debug!(hz, freq2, freq1, freq0, "set_frequency");
        self.write_register(Register::Freq2, freq2).await?;
        self.write_register(Register::Freq1, freq1).await?;
        self.write_register(Register::Freq0, freq0).await?;
        Ok(())
    }

    /// Select the receiver filter bandwidth
    ///
    /// The bandwidth lives in one modem configuration register; this is a
    /// convenience over [`write_register`](Self::write_register).
    pub async fn set_rx_bandwidth(&self, bandwidth: RxBandwidth) -> Result<(), LinkError> {
        self.write_register(Register::Mdmcfg4, bandwidth as u8)
            .await
    }
}

/// Map a non-success result code to [`LinkError::DeviceRejected`]
fn require_success(envelope: ResponseEnvelope) -> Result<ResponseEnvelope, LinkError> {
    if envelope.result.is_success() {
        Ok(envelope)
    } else {
        warn!(result = %envelope.result, "device rejected command");
        Err(LinkError::DeviceRejected(envelope.result))
    }
}
