//! Dongle simulation
//!
//! [`SimulatedDongle`] implements the GATT transport boundary with a small
//! model of the real device: a register file, packet counters, a canned
//! receive queue, and the single shared response buffer whose emptiness
//! means "not ready yet". Commands are parsed with the same frame codec the
//! bridge encodes with, so the simulator doubles as a wire-format check.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subg_link::config::FirmwareCapabilities;
use subg_link::transport::{
    Characteristic, Descriptor, GattTransport, TransportError, ENABLE_NOTIFICATIONS,
};
use subg_protocol::frame::parse_frame;
use subg_protocol::registers::frequency_to_registers;
use subg_protocol::stats::STATISTICS_LEN;
use subg_protocol::{Opcode, OpcodeTable, ProtocolRevision, Register, ResultCode};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Size of the simulated register file
const REGISTER_SPACE: usize = 0x40;

/// Configuration for a simulated dongle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Banner answered to get-version; also decides the register-read quirk
    pub radio_version: String,
    /// Opcode numbering the simulated firmware decodes
    pub revision: ProtocolRevision,
    /// Swallow response-count notifications (the host must poll blind)
    pub drop_notifications: bool,
    /// Delay between accepting a command and the response becoming readable
    pub response_delay: Duration,
    /// Never produce a response at all
    pub mute: bool,
    /// RSSI reported for the link
    pub rssi: i16,
    /// Banner of the supervising BLE chip firmware
    pub ble_version: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            radio_version: "subg_rfspy 2.3".to_string(),
            revision: ProtocolRevision::V2,
            drop_notifications: false,
            response_delay: Duration::ZERO,
            mute: false,
            rssi: -62,
            ble_version: "ble_rfspy 2.0".to_string(),
        }
    }
}

/// Observable things the simulated dongle did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A command frame arrived on the data characteristic
    CommandWrite(Vec<u8>),
    /// The data characteristic was read; `empty` is the not-ready case
    DataRead { empty: bool },
    /// A response-count notification went out
    Notified { sequence: u8 },
    /// A descriptor write arrived
    DescriptorWrite(Vec<u8>),
    /// The response-count characteristic was subscribed
    Subscribed,
}

struct DongleState {
    config: SimConfig,
    table: OpcodeTable,
    double_read_required: bool,
    registers: [u8; REGISTER_SPACE],
    response: Vec<u8>,
    response_count: u8,
    notify_tx: Option<mpsc::Sender<Vec<u8>>>,
    notifications_armed: bool,
    battery_percent: u8,
    custom_name: String,
    led_mode: u8,
    state_reply: Vec<u8>,
    booted_at: Instant,
    boots: u32,
    rx_overflows: u16,
    rx_fifo_overflows: u16,
    packets_received: u16,
    packets_transmitted: u16,
    crc_failures: u16,
    spi_sync_failures: u16,
    rx_queue: VecDeque<Vec<u8>>,
    events: Vec<SimEvent>,
}

impl DongleState {
    fn new(config: SimConfig) -> Self {
        let table = OpcodeTable::for_revision(config.revision);
        let double_read_required =
            FirmwareCapabilities::from_version_banner(&config.radio_version).double_register_read;
        let mut state = Self {
            config,
            table,
            double_read_required,
            registers: [0u8; REGISTER_SPACE],
            response: Vec::new(),
            response_count: 0,
            notify_tx: None,
            notifications_armed: false,
            battery_percent: 87,
            custom_name: "sim-dongle".to_string(),
            led_mode: 0,
            state_reply: b"OK".to_vec(),
            booted_at: Instant::now(),
            boots: 0,
            rx_overflows: 0,
            rx_fifo_overflows: 0,
            packets_received: 0,
            packets_transmitted: 0,
            crc_failures: 0,
            spi_sync_failures: 0,
            rx_queue: VecDeque::new(),
            events: Vec::new(),
        };
        state.load_default_registers();
        state
    }

    fn load_default_registers(&mut self) {
        let (freq2, freq1, freq0) = frequency_to_registers(916_600_000);
        self.registers[Register::Freq2.addr() as usize] = freq2;
        self.registers[Register::Freq1.addr() as usize] = freq1;
        self.registers[Register::Freq0.addr() as usize] = freq0;
    }

    /// Reboot: registers back to defaults, counters and uptime cleared
    fn reboot(&mut self) {
        self.registers = [0u8; REGISTER_SPACE];
        self.load_default_registers();
        self.response.clear();
        self.booted_at = Instant::now();
        self.boots += 1;
        self.rx_overflows = 0;
        self.rx_fifo_overflows = 0;
        self.packets_received = 0;
        self.packets_transmitted = 0;
        self.crc_failures = 0;
        self.spi_sync_failures = 0;
    }

    /// Run one decoded command against the model
    ///
    /// Returns the response bytes, or `None` for fire-and-forget commands.
    fn run_command(&mut self, opcode: Opcode, payload: &[u8]) -> Option<Vec<u8>> {
        match opcode {
            Opcode::Interrupt => Some(success(&[])),
            Opcode::GetState => Some(success(&self.state_reply)),
            Opcode::GetVersion => Some(success(self.config.radio_version.as_bytes())),
            Opcode::GetPacket => {
                if payload.len() < 5 {
                    return Some(bare(ResultCode::InvalidParam));
                }
                match self.rx_queue.pop_front() {
                    Some(packet) => {
                        self.packets_received = self.packets_received.wrapping_add(1);
                        Some(success(&packet))
                    }
                    None => Some(bare(ResultCode::RxTimeout)),
                }
            }
            Opcode::SendPacket => {
                self.packets_transmitted = self.packets_transmitted.wrapping_add(1);
                Some(success(&[]))
            }
            Opcode::SendAndListen => {
                self.packets_transmitted = self.packets_transmitted.wrapping_add(1);
                match self.rx_queue.pop_front() {
                    Some(packet) => {
                        self.packets_received = self.packets_received.wrapping_add(1);
                        Some(success(&packet))
                    }
                    None => Some(bare(ResultCode::RxTimeout)),
                }
            }
            Opcode::UpdateRegister => {
                let &[addr, value] = payload else {
                    return Some(bare(ResultCode::InvalidParam));
                };
                let Some(slot) = self.registers.get_mut(addr as usize) else {
                    return Some(bare(ResultCode::InvalidParam));
                };
                *slot = value;
                Some(success(&[]))
            }
            Opcode::Reset => {
                self.reboot();
                None
            }
            Opcode::Led => {
                let &[_color, mode] = payload else {
                    return Some(bare(ResultCode::InvalidParam));
                };
                if mode > 0x02 {
                    return Some(bare(ResultCode::InvalidParam));
                }
                self.led_mode = mode;
                Some(success(&[]))
            }
            Opcode::ReadRegister => {
                if self.double_read_required && payload.len() < 2 {
                    // Old firmware misses single-address reads
                    return Some(bare(ResultCode::ZeroData));
                }
                let Some(&addr) = payload.first() else {
                    return Some(bare(ResultCode::InvalidParam));
                };
                match self.registers.get(addr as usize) {
                    Some(&value) => Some(success(&[value])),
                    None => Some(bare(ResultCode::InvalidParam)),
                }
            }
            Opcode::SetModeRegisters
            | Opcode::SetSwEncoding
            | Opcode::SetPreamble
            | Opcode::ResetRadioConfig => Some(success(&[])),
            Opcode::GetStatistics => Some(success(&self.statistics_record())),
        }
    }

    fn statistics_record(&self) -> Vec<u8> {
        let uptime_ms = self.booted_at.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
        let mut record = Vec::with_capacity(STATISTICS_LEN);
        record.extend_from_slice(&uptime_ms.to_be_bytes());
        for counter in [
            self.rx_overflows,
            self.rx_fifo_overflows,
            self.packets_received,
            self.packets_transmitted,
            self.crc_failures,
            self.spi_sync_failures,
        ] {
            record.extend_from_slice(&counter.to_be_bytes());
        }
        record
    }

    /// Make `response` readable and fire the notification if armed
    fn publish_response(&mut self, response: Vec<u8>) {
        self.response = response;
        self.response_count = self.response_count.wrapping_add(1);
        if self.notifications_armed && !self.config.drop_notifications {
            if let Some(tx) = &self.notify_tx {
                if tx.try_send(vec![self.response_count]).is_ok() {
                    self.events.push(SimEvent::Notified {
                        sequence: self.response_count,
                    });
                }
            }
        }
    }
}

/// A simulated dongle behind the [`GattTransport`] boundary
///
/// Cloning shares the underlying device state, so a test can hold one
/// handle for inspection while the bridge drives another.
#[derive(Clone)]
pub struct SimulatedDongle {
    inner: Arc<Mutex<DongleState>>,
}

impl SimulatedDongle {
    /// Create a dongle with the given behavior
    pub fn new(config: SimConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DongleState::new(config))),
        }
    }

    fn state(&self) -> MutexGuard<'_, DongleState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a canned over-the-air packet for the next listen
    pub fn queue_rx_packet(&self, packet: &[u8]) {
        self.state().rx_queue.push_back(packet.to_vec());
    }

    /// Current value of a register in the simulated file
    pub fn register(&self, register: Register) -> u8 {
        self.state().registers[register.addr() as usize]
    }

    /// Current LED mode byte
    pub fn led_mode(&self) -> u8 {
        self.state().led_mode
    }

    /// How many times the co-processor rebooted
    pub fn boots(&self) -> u32 {
        self.state().boots
    }

    /// Everything the dongle observed, in order
    pub fn events(&self) -> Vec<SimEvent> {
        self.state().events.clone()
    }

    /// Stop or resume producing responses
    pub fn set_mute(&self, mute: bool) {
        self.state().config.mute = mute;
    }

    /// Start or stop swallowing notifications
    pub fn set_drop_notifications(&self, drop: bool) {
        self.state().config.drop_notifications = drop;
    }

    /// Bump a failure counter so statistics tests have nonzero data
    pub fn inject_crc_failures(&self, count: u16) {
        self.state().crc_failures = count;
    }

    /// Change what get-state answers (a sick device says something else)
    pub fn set_state_reply(&self, reply: &[u8]) {
        self.state().state_reply = reply.to_vec();
    }

    fn accept_frame(&self, frame: &[u8]) {
        let (delay, mute, work) = {
            let mut state = self.state();
            state.events.push(SimEvent::CommandWrite(frame.to_vec()));
            let (opcode_byte, payload) = match parse_frame(frame) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(%err, "simulated dongle dropped an unparseable frame");
                    return;
                }
            };
            let response = match state.table.opcode(opcode_byte) {
                Some(opcode) => {
                    debug!(command = opcode.name(), "simulated dongle accepted command");
                    state.run_command(opcode, &payload)
                }
                None => {
                    debug!(opcode_byte, "simulated dongle rejected unknown opcode");
                    Some(bare(ResultCode::UnknownCommand))
                }
            };
            (state.config.response_delay, state.config.mute, response)
        };

        let Some(response) = work else {
            return;
        };
        if mute {
            debug!("simulated dongle is muted, swallowing response");
            return;
        }
        if delay.is_zero() {
            self.state().publish_response(response);
        } else {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                state.publish_response(response);
            });
        }
    }
}

impl Default for SimulatedDongle {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

#[async_trait]
impl GattTransport for SimulatedDongle {
    async fn write_characteristic(
        &self,
        characteristic: Characteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        match characteristic {
            Characteristic::Data => self.accept_frame(value),
            Characteristic::CustomName => {
                self.state().custom_name = String::from_utf8_lossy(value).into_owned();
            }
            Characteristic::LedMode => {
                if let Some(&mode) = value.first() {
                    self.state().led_mode = mode;
                }
            }
            other => {
                return Err(TransportError::Write(format!(
                    "characteristic {other:?} is not writable"
                )));
            }
        }
        Ok(())
    }

    async fn read_characteristic(
        &self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError> {
        // Yield first so delayed-response tasks get a chance to run between
        // poll reads
        tokio::task::yield_now().await;
        let mut state = self.state();
        let value = match characteristic {
            Characteristic::Data => {
                let response = std::mem::take(&mut state.response);
                state.events.push(SimEvent::DataRead {
                    empty: response.is_empty(),
                });
                response
            }
            Characteristic::ResponseCount => vec![state.response_count],
            Characteristic::TimerTick => vec![0x00],
            Characteristic::CustomName => state.custom_name.clone().into_bytes(),
            Characteristic::FirmwareVersion => state.config.ble_version.clone().into_bytes(),
            Characteristic::LedMode => vec![state.led_mode],
            Characteristic::BatteryLevel => vec![state.battery_percent],
        };
        Ok(value)
    }

    async fn subscribe(
        &self,
        characteristic: Characteristic,
        sink: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), TransportError> {
        if characteristic != Characteristic::ResponseCount {
            return Err(TransportError::Subscribe(format!(
                "characteristic {characteristic:?} does not notify"
            )));
        }
        let mut state = self.state();
        state.notify_tx = Some(sink);
        state.events.push(SimEvent::Subscribed);
        Ok(())
    }

    async fn write_descriptor(
        &self,
        descriptor: Descriptor,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let Descriptor::ResponseCountClientConfig = descriptor;
        let mut state = self.state();
        state.notifications_armed = value == ENABLE_NOTIFICATIONS;
        state.events.push(SimEvent::DescriptorWrite(value.to_vec()));
        Ok(())
    }

    async fn read_signal_strength(&self) -> Result<i16, TransportError> {
        Ok(self.state().config.rssi)
    }
}

fn success(payload: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(1 + payload.len());
    response.push(ResultCode::Success.raw());
    response.extend_from_slice(payload);
    response
}

fn bare(result: ResultCode) -> Vec<u8> {
    vec![result.raw()]
}
