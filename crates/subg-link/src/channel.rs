//! Command/response exchange over the shared data characteristic
//!
//! One command cycle is: write the length-prefixed frame, wait for the
//! response-count notification (or its one-second ceiling; the wake signal
//! is advisory, never authoritative), then poll-read the data
//! characteristic until a non-empty buffer comes back and decode it.
//!
//! The wake signal carries no request tag; it is a bare "something
//! happened". Correlation works only because at most one command is in
//! flight at a time; the facade's mutex enforces that, and this type
//! assumes it. Stale wakes left over from a previous cycle's late
//! notification are drained before each write.
//!
//! Every suspension point races the connection lifetime token, so a dead
//! link surfaces as [`LinkError::Disconnected`] rather than a hang.

use std::sync::Arc;
use std::time::Duration;

use subg_protocol::frame::encode_frame;
use subg_protocol::{Command, OpcodeTable, ResponseEnvelope};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::LinkError;
use crate::transport::{Characteristic, GattTransport};

/// Whether a command's response is announced by a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSignal {
    /// Wait for the response-count notification (or its timeout) first
    Notified,
    /// The firmware answers without notifying; read back immediately
    Immediate,
}

/// One logical request/response channel over the data characteristic
///
/// Owns the receive side of the notification subscription and the poll-read
/// loop. Callers must serialize access; see the module docs.
pub struct CommandChannel {
    transport: Arc<dyn GattTransport>,
    table: OpcodeTable,
    wake_rx: mpsc::Receiver<Vec<u8>>,
    alive: watch::Receiver<bool>,
    notification_timeout: Duration,
    retry: RetryPolicy,
}

impl CommandChannel {
    /// Build a channel over an established transport
    ///
    /// `wake_rx` is the receive side of the response-count subscription and
    /// `alive` the connection lifetime watch.
    pub fn new(
        transport: Arc<dyn GattTransport>,
        table: OpcodeTable,
        wake_rx: mpsc::Receiver<Vec<u8>>,
        alive: watch::Receiver<bool>,
        notification_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            table,
            wake_rx,
            alive,
            notification_timeout,
            retry,
        }
    }

    /// The opcode table in use
    pub fn table(&self) -> OpcodeTable {
        self.table
    }

    /// Run one full command cycle and decode the response
    pub async fn execute(
        &mut self,
        command: &Command,
        signal: ResponseSignal,
    ) -> Result<ResponseEnvelope, LinkError> {
        self.write_frame(command).await?;
        if signal == ResponseSignal::Notified {
            self.await_wake().await?;
        }
        self.read_response().await
    }

    /// Write a command frame with no response cycle (fire-and-forget)
    pub async fn send_only(&mut self, command: &Command) -> Result<(), LinkError> {
        self.write_frame(command).await
    }

    async fn write_frame(&mut self, command: &Command) -> Result<(), LinkError> {
        let opcode = self.table.require_wire_byte(command.opcode())?;
        let frame = encode_frame(opcode, command.payload())?;
        self.drain_stale_wakes();
        self.ensure_alive()?;
        debug!(
            command = command.opcode().name(),
            frame_len = frame.len(),
            "writing command frame"
        );
        self.transport
            .write_characteristic(Characteristic::Data, &frame)
            .await?;
        Ok(())
    }

    /// Discard wake signals left over from a previous cycle
    fn drain_stale_wakes(&mut self) {
        let mut drained = 0;
        while self.wake_rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "discarded stale wake signals");
        }
    }

    /// Wait for the wake notification, its timeout, or disconnect
    ///
    /// Timeout is not an error: the notification is a hint that the
    /// response is ready, and its absence only means we poll blind.
    async fn await_wake(&mut self) -> Result<(), LinkError> {
        let mut alive = self.alive.clone();
        tokio::select! {
            wake = self.wake_rx.recv() => match wake {
                Some(value) => {
                    debug!(sequence = value.first().copied().unwrap_or(0), "wake notification fired");
                    Ok(())
                }
                // The adapter drops the sender when the connection dies
                None => Err(LinkError::Disconnected),
            },
            _ = tokio::time::sleep(self.notification_timeout) => {
                debug!(timeout = ?self.notification_timeout, "no wake notification, polling anyway");
                Ok(())
            }
            _ = connection_closed(&mut alive) => Err(LinkError::Disconnected),
        }
    }

    /// Poll-read the data characteristic until the response appears
    async fn read_response(&mut self) -> Result<ResponseEnvelope, LinkError> {
        let mut alive = self.alive.clone();
        let mut attempts: u32 = 0;
        loop {
            self.ensure_alive()?;
            let raw = tokio::select! {
                read = self.transport.read_characteristic(Characteristic::Data) => read?,
                _ = connection_closed(&mut alive) => return Err(LinkError::Disconnected),
            };
            if !raw.is_empty() {
                debug!(response_len = raw.len(), attempts, "captured response");
                let rssi = match self.transport.read_signal_strength().await {
                    Ok(rssi) => rssi,
                    Err(err) => {
                        debug!(%err, "signal strength unavailable, recording 0");
                        0
                    }
                };
                return Ok(ResponseEnvelope::decode(&raw, rssi)?);
            }
            attempts += 1;
            if let Some(max) = self.retry.max_attempts {
                if attempts >= max {
                    warn!(attempts, "response never became readable");
                    return Err(LinkError::NoResponse { attempts });
                }
            }
            if !self.retry.interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.retry.interval) => {}
                    _ = connection_closed(&mut alive) => return Err(LinkError::Disconnected),
                }
            }
        }
    }

    fn ensure_alive(&self) -> Result<(), LinkError> {
        if *self.alive.borrow() {
            Ok(())
        } else {
            Err(LinkError::Disconnected)
        }
    }
}

/// Resolves when the connection lifetime closes (or its sender is gone)
async fn connection_closed(alive: &mut watch::Receiver<bool>) {
    while *alive.borrow_and_update() {
        if alive.changed().await.is_err() {
            return;
        }
    }
}
