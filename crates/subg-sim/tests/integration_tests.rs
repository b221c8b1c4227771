//! Integration tests for the radio bridge
//!
//! These tests drive the full stack (facade, exchange, frame codec) over
//! the simulated dongle:
//! - every command operation end to end
//! - firmware capability resolution at attach time
//! - notification loss and the poll fallback
//! - disconnect liveness while the device stays silent
//! - serialization of concurrent callers on the shared characteristic

use std::sync::Arc;
use std::time::Duration;

use subg_link::transport::GattTransport;
use subg_link::{BridgeConfig, LinkError, RadioBridge, RetryPolicy};
use subg_protocol::{
    LedColor, LedMode, PacketChannel, ProtocolRevision, Register, ResultCode, RxBandwidth,
    SwEncoding,
};
use subg_sim::{SimConfig, SimEvent, SimulatedDongle};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Attach a bridge to a default simulated dongle
    pub async fn attached() -> (RadioBridge, SimulatedDongle) {
        attached_with(SimConfig::default(), BridgeConfig::default()).await
    }

    /// Attach a bridge to a dongle with specific sim and bridge settings
    pub async fn attached_with(
        sim: SimConfig,
        bridge: BridgeConfig,
    ) -> (RadioBridge, SimulatedDongle) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let dongle = SimulatedDongle::new(sim);
        let transport: Arc<dyn GattTransport> = Arc::new(dongle.clone());
        let bridge = RadioBridge::attach(transport, bridge)
            .await
            .expect("attach failed");
        (bridge, dongle)
    }

    /// Indices of command writes in the dongle's event log
    pub fn command_write_indices(events: &[SimEvent]) -> Vec<usize> {
        events
            .iter()
            .enumerate()
            .filter_map(|(i, e)| matches!(e, SimEvent::CommandWrite(_)).then_some(i))
            .collect()
    }

    /// Index of the first non-empty data read after `from`
    pub fn first_response_read_after(events: &[SimEvent], from: usize) -> Option<usize> {
        events
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(i, e)| matches!(e, SimEvent::DataRead { empty: false }).then_some(i))
    }
}

// ============================================================================
// Attach & capability resolution
// ============================================================================

#[tokio::test]
async fn attach_arms_notifications_and_reads_version() {
    let (bridge, dongle) = helpers::attached().await;

    assert_eq!(bridge.radio_version(), "subg_rfspy 2.3");
    assert!(!bridge.capabilities().double_register_read);

    let events = dongle.events();
    assert!(events.contains(&SimEvent::Subscribed));
    assert!(events.contains(&SimEvent::DescriptorWrite(vec![0x01, 0x00])));
}

#[tokio::test]
async fn attach_resolves_doubling_for_old_firmware() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            radio_version: "subg_rfspy 2.2".to_string(),
            ..SimConfig::default()
        },
        BridgeConfig::default(),
    )
    .await;

    assert_eq!(bridge.radio_version(), "subg_rfspy 2.2");
    assert!(bridge.capabilities().double_register_read);
}

#[tokio::test]
async fn config_override_beats_banner_resolution() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            radio_version: "subg_rfspy 2.2".to_string(),
            ..SimConfig::default()
        },
        BridgeConfig {
            double_register_read: Some(false),
            ..BridgeConfig::default()
        },
    )
    .await;

    assert!(!bridge.capabilities().double_register_read);
}

// ============================================================================
// Command operations end to end
// ============================================================================

#[tokio::test]
async fn get_state_answers_true() {
    let (bridge, _dongle) = helpers::attached().await;
    assert!(bridge.get_state().await.unwrap());
}

#[tokio::test]
async fn get_state_rejects_a_wrong_reply() {
    let (bridge, dongle) = helpers::attached().await;
    dongle.set_state_reply(b"??");

    let err = bridge.get_state().await.unwrap_err();
    assert_eq!(err, LinkError::UnexpectedStateReply(b"??".to_vec()));
}

#[tokio::test]
async fn get_version_round_trips_the_banner() {
    let (bridge, _dongle) = helpers::attached().await;
    assert_eq!(bridge.get_version().await.unwrap(), "subg_rfspy 2.3");
}

#[tokio::test]
async fn register_write_reaches_the_device() {
    let (bridge, dongle) = helpers::attached().await;
    bridge.write_register(Register::Mdmcfg4, 0x99).await.unwrap();
    assert_eq!(dongle.register(Register::Mdmcfg4), 0x99);
}

#[tokio::test]
async fn register_read_on_old_firmware_uses_doubling() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            radio_version: "subg_rfspy 2.2".to_string(),
            ..SimConfig::default()
        },
        BridgeConfig::default(),
    )
    .await;

    // The old-firmware dongle answers zero-data to single-address reads, so
    // this only succeeds because the resolved capability doubles the address.
    let value = bridge.read_register(Register::Freq2).await.unwrap();
    assert_eq!(value, 0x26);
}

#[tokio::test]
async fn forcing_single_reads_on_old_firmware_is_rejected() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            radio_version: "subg_rfspy 2.2".to_string(),
            ..SimConfig::default()
        },
        BridgeConfig {
            double_register_read: Some(false),
            ..BridgeConfig::default()
        },
    )
    .await;

    let err = bridge.read_register(Register::Freq2).await.unwrap_err();
    assert_eq!(err, LinkError::DeviceRejected(ResultCode::ZeroData));
}

#[tokio::test]
async fn frequency_round_trips_within_tolerance() {
    let (bridge, _dongle) = helpers::attached().await;

    bridge.set_frequency(916_600_000).await.unwrap();
    let back = bridge.get_frequency().await.unwrap();
    assert!(
        back.abs_diff(916_600_000) <= 366,
        "tuned {back} Hz, expected within 366 Hz of 916.6 MHz"
    );
}

#[tokio::test]
async fn default_tuning_is_readable() {
    let (bridge, _dongle) = helpers::attached().await;
    let hz = bridge.get_frequency().await.unwrap();
    assert!(hz.abs_diff(916_600_000) <= 366);
}

#[tokio::test]
async fn get_packet_returns_queued_traffic_opaquely() {
    let (bridge, dongle) = helpers::attached().await;
    dongle.queue_rx_packet(&[0xa7, 0x12, 0x34, 0x56]);

    let envelope = bridge
        .get_packet(PacketChannel::Pump, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(envelope.result, ResultCode::Success);
    assert_eq!(envelope.payload, vec![0xa7, 0x12, 0x34, 0x56]);
    assert_eq!(envelope.rssi, -62);
}

#[tokio::test]
async fn get_packet_timeout_is_a_normal_outcome() {
    let (bridge, _dongle) = helpers::attached().await;

    let envelope = bridge
        .get_packet(PacketChannel::Meter, Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(envelope.result, ResultCode::RxTimeout);
    assert!(envelope.payload.is_empty());
}

#[tokio::test]
async fn send_and_listen_round_trip() {
    let (bridge, dongle) = helpers::attached().await;
    dongle.queue_rx_packet(&[0x55, 0xaa]);

    let envelope = bridge.send_and_listen(&[0x01, 0x02]).await.unwrap();
    assert_eq!(envelope.result, ResultCode::Success);
    assert_eq!(envelope.payload, vec![0x55, 0xaa]);
}

#[tokio::test]
async fn statistics_reflect_traffic() {
    let (bridge, dongle) = helpers::attached().await;
    dongle.queue_rx_packet(&[0x01]);
    dongle.inject_crc_failures(3);

    bridge.send_packet(&[0xde, 0xad]).await.unwrap();
    bridge
        .get_packet(PacketChannel::Pump, Duration::from_millis(100))
        .await
        .unwrap();

    let stats = bridge.get_statistics().await.unwrap();
    assert_eq!(stats.packets_transmitted, 1);
    assert_eq!(stats.packets_received, 1);
    assert_eq!(stats.crc_failures, 3);
    assert_eq!(stats.rx_overflows, 0);
}

#[tokio::test]
async fn led_and_radio_config_commands_succeed() {
    let (bridge, dongle) = helpers::attached().await;

    bridge.led(LedColor::Blue, LedMode::On).await.unwrap();
    assert_eq!(dongle.led_mode(), 0x01);

    bridge.set_mode_registers().await.unwrap();
    bridge.set_sw_encoding(SwEncoding::Manchester).await.unwrap();
    bridge.set_preamble().await.unwrap();
    bridge.reset_radio_config().await.unwrap();
    bridge.interrupt().await.unwrap();
}

#[tokio::test]
async fn rx_bandwidth_lands_in_the_modem_register() {
    let (bridge, dongle) = helpers::attached().await;

    bridge.set_rx_bandwidth(RxBandwidth::Narrow).await.unwrap();
    assert_eq!(dongle.register(Register::Mdmcfg4), 0x90);

    bridge.set_rx_bandwidth(RxBandwidth::Wide).await.unwrap();
    assert_eq!(dongle.register(Register::Mdmcfg4), 0x50);
}

#[tokio::test]
async fn reset_settles_and_confirms_recovery() {
    let (bridge, dongle) = helpers::attached().await;
    bridge.write_register(Register::Sync1, 0x42).await.unwrap();

    assert!(bridge.reset().await.unwrap());
    assert_eq!(dongle.boots(), 1);
    // The register file went back to defaults
    assert_eq!(dongle.register(Register::Sync1), 0x00);
}

#[tokio::test]
async fn interrupt_is_unsupported_on_legacy_firmware() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            revision: ProtocolRevision::Legacy,
            ..SimConfig::default()
        },
        BridgeConfig {
            revision: ProtocolRevision::Legacy,
            ..BridgeConfig::default()
        },
    )
    .await;

    // The legacy stack still runs ordinary commands
    assert!(bridge.get_state().await.unwrap());

    let err = bridge.interrupt().await.unwrap_err();
    assert!(matches!(
        err,
        LinkError::Protocol(subg_protocol::ProtocolError::UnsupportedCommand { .. })
    ));
}

// ============================================================================
// BLE-level device accessors
// ============================================================================

#[tokio::test]
async fn device_accessors_bypass_the_command_cycle() {
    let (bridge, _dongle) = helpers::attached().await;

    assert_eq!(bridge.battery_level().await.unwrap(), 87);
    assert_eq!(bridge.ble_version().await.unwrap(), "ble_rfspy 2.0");

    bridge.set_custom_name("kitchen-dongle").await.unwrap();
    assert_eq!(bridge.custom_name().await.unwrap(), "kitchen-dongle");

    bridge.set_led_mode(LedMode::Auto).await.unwrap();
    assert_eq!(bridge.led_mode().await.unwrap(), LedMode::Auto);

    assert_eq!(bridge.signal_strength().await.unwrap(), -62);
}

// ============================================================================
// Notification loss, slow devices, and liveness
// ============================================================================

#[tokio::test(start_paused = true)]
async fn dropped_notifications_fall_back_to_polling() {
    let (bridge, dongle) = helpers::attached().await;
    dongle.set_drop_notifications(true);

    // No wake will arrive; the one-second ceiling elapses and the poll
    // still captures the response.
    assert!(bridge.get_state().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn slow_responses_are_polled_out() {
    let (bridge, _dongle) = helpers::attached_with(
        SimConfig {
            response_delay: Duration::from_millis(250),
            drop_notifications: true,
            ..SimConfig::default()
        },
        BridgeConfig {
            read_retry: RetryPolicy {
                max_attempts: None,
                interval: Duration::from_millis(10),
            },
            ..BridgeConfig::default()
        },
    )
    .await;

    assert!(bridge.get_state().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn silent_device_exhausts_a_bounded_poll_budget() {
    let (bridge, dongle) = helpers::attached_with(
        SimConfig::default(),
        BridgeConfig {
            read_retry: RetryPolicy::bounded(10, Duration::from_millis(5)),
            ..BridgeConfig::default()
        },
    )
    .await;
    dongle.set_mute(true);

    let err = bridge.get_state().await.unwrap_err();
    assert_eq!(err, LinkError::NoResponse { attempts: 10 });
}

#[tokio::test(start_paused = true)]
async fn disconnect_aborts_a_call_stuck_on_a_silent_device() {
    let (bridge, dongle) = helpers::attached_with(
        SimConfig::default(),
        BridgeConfig {
            read_retry: RetryPolicy {
                max_attempts: None,
                interval: Duration::from_millis(10),
            },
            ..BridgeConfig::default()
        },
    )
    .await;
    dongle.set_mute(true);
    dongle.set_drop_notifications(true);

    let lifetime = bridge.lifetime();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        lifetime.close();
    });

    // No notification, no data, unbounded polling: only the lifetime token
    // ends this call.
    let err = bridge.get_state().await.unwrap_err();
    assert_eq!(err, LinkError::Disconnected);
}

#[tokio::test]
async fn commands_after_close_fail_fast() {
    let (bridge, _dongle) = helpers::attached().await;
    bridge.close();

    let err = bridge.get_state().await.unwrap_err();
    assert_eq!(err, LinkError::Disconnected);
}

// ============================================================================
// Serialization of concurrent callers
// ============================================================================

#[tokio::test]
async fn concurrent_commands_never_interleave() {
    let (bridge, dongle) = helpers::attached().await;
    let bridge = Arc::new(bridge);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let bridge = bridge.clone();
        handles.push(tokio::spawn(async move { bridge.get_state().await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    // For every pair of consecutive command writes, the earlier command's
    // response must have been read off the data characteristic before the
    // later command was written.
    let events = dongle.events();
    let writes = helpers::command_write_indices(&events);
    // attach's version probe plus four get-states
    assert_eq!(writes.len(), 5);
    for pair in writes.windows(2) {
        let response_read = helpers::first_response_read_after(&events, pair[0])
            .expect("a command completed without its response being read");
        assert!(
            response_read < pair[1],
            "write at {} happened before the response to the write at {} was read",
            pair[1],
            pair[0]
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;

    // Strategy for frequencies in the bands the dongle actually serves
    fn tunable_frequency() -> impl Strategy<Value = u32> {
        prop_oneof![
            // 433 MHz worldwide pump band
            433_050_000u32..434_790_000u32,
            // 868 MHz European band
            868_000_000u32..870_000_000u32,
            // 916 MHz US band
            915_000_000u32..917_000_000u32,
        ]
    }

    fn scratch_register() -> impl Strategy<Value = Register> {
        prop_oneof![
            Just(Register::Sync1),
            Just(Register::Sync0),
            Just(Register::Pktlen),
            Just(Register::Mdmcfg4),
            Just(Register::Deviatn),
            Just(Register::PaTable0),
        ]
    }

    /// One small runtime per case bridges proptest's sync closures into the
    /// async stack
    fn run<F>(future: F) -> Result<(), TestCaseError>
    where
        F: std::future::Future<Output = Result<(), TestCaseError>>,
    {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn tuning_round_trips_over_the_wire(hz in tunable_frequency()) {
            run(async move {
                let (bridge, _dongle) = helpers::attached().await;
                bridge.set_frequency(hz).await.unwrap();
                let back = bridge.get_frequency().await.unwrap();
                prop_assert!(back.abs_diff(hz) <= 366, "tuned {} Hz for {}", back, hz);
                Ok(())
            })?;
        }

        #[test]
        fn register_values_survive_the_wire(register in scratch_register(), value: u8) {
            run(async move {
                let (bridge, _dongle) = helpers::attached().await;
                bridge.write_register(register, value).await.unwrap();
                prop_assert_eq!(bridge.read_register(register).await.unwrap(), value);
                Ok(())
            })?;
        }

        #[test]
        fn queued_packets_come_back_verbatim(packet in prop::collection::vec(any::<u8>(), 1..64)) {
            run(async move {
                let (bridge, dongle) = helpers::attached().await;
                dongle.queue_rx_packet(&packet);
                let envelope = bridge
                    .get_packet(PacketChannel::Pump, Duration::from_millis(100))
                    .await
                    .unwrap();
                prop_assert_eq!(envelope.result, ResultCode::Success);
                prop_assert_eq!(envelope.payload, packet);
                Ok(())
            })?;
        }
    }
}
