//! Link statistics record decoder
//!
//! The get-statistics command answers with a fixed 16-byte big-endian
//! record:
//!
//! ```text
//! [0..4)   uptime, milliseconds
//! [4..6)   receiver overflows
//! [6..8)   receiver FIFO overflows
//! [8..10)  packets received
//! [10..12) packets transmitted
//! [12..14) CRC failures
//! [14..16) SPI sync failures
//! ```

use std::time::{Duration, SystemTime};

use crate::error::ProtocolError;

/// Exact length of the statistics payload
pub const STATISTICS_LEN: usize = 16;

/// Counters reported by the co-processor, plus the host capture time
///
/// Created fresh on every successful statistics read; the capture time is
/// the host wall clock at decode, not anything the device reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Host wall-clock time when the record was decoded
    pub collected_at: SystemTime,
    /// Time since the co-processor last booted
    pub uptime: Duration,
    pub rx_overflows: u16,
    pub rx_fifo_overflows: u16,
    pub packets_received: u16,
    pub packets_transmitted: u16,
    pub crc_failures: u16,
    pub spi_sync_failures: u16,
}

impl LinkStatistics {
    /// Decode a statistics payload, stamping the capture time
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < STATISTICS_LEN {
            return Err(ProtocolError::MalformedResponse(format!(
                "statistics payload is {} bytes, need {}",
                payload.len(),
                STATISTICS_LEN
            )));
        }
        let uptime_ms = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Ok(Self {
            collected_at: SystemTime::now(),
            uptime: Duration::from_millis(u64::from(uptime_ms)),
            rx_overflows: be_u16(payload, 4),
            rx_fifo_overflows: be_u16(payload, 6),
            packets_received: be_u16(payload, 8),
            packets_transmitted: be_u16(payload, 10),
            crc_failures: be_u16(payload, 12),
            spi_sync_failures: be_u16(payload, 14),
        })
    }
}

fn be_u16(payload: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([payload[at], payload[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_distinct_fields() {
        // Every field carries a different value so any offset slip shows up
        let payload = [
            0x00, 0x01, 0x5f, 0x90, // uptime 90000 ms
            0x00, 0x01, // rx overflows
            0x00, 0x02, // rx fifo overflows
            0x00, 0x03, // packets received
            0x00, 0x04, // packets transmitted
            0x00, 0x05, // crc failures
            0x00, 0x06, // spi sync failures
        ];
        let stats = LinkStatistics::decode(&payload).unwrap();
        assert_eq!(stats.uptime, Duration::from_millis(90_000));
        assert_eq!(stats.rx_overflows, 1);
        assert_eq!(stats.rx_fifo_overflows, 2);
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_transmitted, 4);
        assert_eq!(stats.crc_failures, 5);
        assert_eq!(stats.spi_sync_failures, 6);
    }

    #[test]
    fn test_counter_boundaries_do_not_bleed() {
        // Drive each u16 field to 0xFFFF in turn with everything else zero
        for field in 0..6 {
            let mut payload = [0u8; STATISTICS_LEN];
            let at = 4 + field * 2;
            payload[at] = 0xff;
            payload[at + 1] = 0xff;

            let stats = LinkStatistics::decode(&payload).unwrap();
            let counters = [
                stats.rx_overflows,
                stats.rx_fifo_overflows,
                stats.packets_received,
                stats.packets_transmitted,
                stats.crc_failures,
                stats.spi_sync_failures,
            ];
            for (i, &value) in counters.iter().enumerate() {
                if i == field {
                    assert_eq!(value, 0xffff, "field {i}");
                } else {
                    assert_eq!(value, 0x0000, "field {i} polluted by field {field}");
                }
            }
            assert_eq!(stats.uptime, Duration::ZERO);
        }
    }

    #[test]
    fn test_uptime_boundaries() {
        let mut payload = [0u8; STATISTICS_LEN];
        payload[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        let stats = LinkStatistics::decode(&payload).unwrap();
        assert_eq!(stats.uptime, Duration::from_millis(u64::from(u32::MAX)));
        assert_eq!(stats.rx_overflows, 0);
    }

    #[test]
    fn test_short_payload_rejected() {
        for len in 0..STATISTICS_LEN {
            let payload = vec![0u8; len];
            assert!(
                matches!(
                    LinkStatistics::decode(&payload),
                    Err(ProtocolError::MalformedResponse(_))
                ),
                "len {len}"
            );
        }
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let mut payload = vec![0u8; STATISTICS_LEN + 4];
        payload[15] = 0x07;
        let stats = LinkStatistics::decode(&payload).unwrap();
        assert_eq!(stats.spi_sync_failures, 7);
    }

    #[test]
    fn test_capture_time_is_fresh() {
        let before = SystemTime::now();
        let stats = LinkStatistics::decode(&[0u8; STATISTICS_LEN]).unwrap();
        let after = SystemTime::now();
        assert!(stats.collected_at >= before && stats.collected_at <= after);
    }
}
