//! Bridge configuration and firmware capability resolution

use std::time::Duration;

use serde::{Deserialize, Serialize};
use subg_protocol::ProtocolRevision;
use tracing::debug;

/// Retry policy for the response poll-read loop
///
/// The co-processor's BLE firmware announces "response ready" with a
/// notification but the payload still has to be read explicitly, and the
/// notification can be dropped; the poll loop covers that gap. The default
/// polls with no delay and no cap, leaving the connection lifetime token as
/// the only bound; a bounded policy turns an unresponsive device into a
/// typed error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum poll reads before giving up; `None` polls until the
    /// connection closes
    pub max_attempts: Option<u32>,
    /// Delay between poll reads
    pub interval: Duration,
}

impl RetryPolicy {
    /// Poll with no delay until data appears or the connection closes
    pub const UNBOUNDED: RetryPolicy = RetryPolicy {
        max_attempts: None,
        interval: Duration::ZERO,
    };

    /// Poll at most `max_attempts` times, `interval` apart
    pub fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Tunables for one bridge connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Opcode numbering the connected firmware uses
    pub revision: ProtocolRevision,
    /// How long to wait for the response notification before polling anyway
    pub notification_timeout: Duration,
    /// Settle time after a reset write before probing the radio state
    pub reset_settle: Duration,
    /// Poll-read policy for fetching responses
    pub read_retry: RetryPolicy,
    /// Force register-read address doubling on or off; `None` resolves it
    /// from the radio version banner at attach time
    pub double_register_read: Option<bool>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            revision: ProtocolRevision::V2,
            notification_timeout: Duration::from_secs(1),
            reset_settle: Duration::from_millis(100),
            read_retry: RetryPolicy::UNBOUNDED,
            double_register_read: None,
        }
    }
}

/// Quirk switches resolved from the radio firmware banner
///
/// Resolved once when the bridge attaches, never re-probed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareCapabilities {
    /// Send the register address twice in read-register payloads
    ///
    /// Firmware before 2.3 misses single-address reads often enough that
    /// the address has to be doubled for the read to succeed reliably.
    pub double_register_read: bool,
}

impl FirmwareCapabilities {
    /// Resolve capabilities from a version banner like `"subg_rfspy 2.2"`
    ///
    /// An unparseable banner resolves to the conservative side (doubling
    /// on), which newer firmware tolerates.
    pub fn from_version_banner(banner: &str) -> Self {
        let caps = match parse_version(banner) {
            Some((major, minor)) => Self {
                double_register_read: (major, minor) < (2, 3),
            },
            None => {
                debug!(banner, "unparseable radio version banner");
                Self {
                    double_register_read: true,
                }
            }
        };
        debug!(banner, ?caps, "resolved firmware capabilities");
        caps
    }
}

/// Pull `major.minor` out of a version banner, ignoring any leading name
fn parse_version(banner: &str) -> Option<(u32, u32)> {
    let numbers = banner.split_whitespace().last()?;
    let (major, rest) = numbers.split_once('.')?;
    let minor = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .filter(|s| !s.is_empty())?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
