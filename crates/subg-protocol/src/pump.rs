//! Pump telemetry message-type table
//!
//! Radio payloads exchanged with the insulin pump carry a one-byte message
//! type. This module enumerates the known types so callers can label
//! traffic; message bodies are opaque here and are parsed by the pump
//! protocol layer, not by this crate.

/// Known pump telemetry message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageType {
    Alert,
    AlertCleared,
    DeviceTest,
    PumpStatus,
    PumpAck,
    PumpBackfill,
    FindDevice,
    DeviceLink,
    ErrorResponse,
    WriteGlucoseHistoryTimestamp,
    SetBasalProfileA,
    SetBasalProfileB,
    ChangeTime,
    SetMaxBolus,
    Bolus,
    SelectBasalProfile,
    ChangeTempBasal,
    SetRemoteControlId,
    SetLanguage,
    SetRemoteControlEnabled,
    ButtonPress,
    PowerOn,
    SetAlarmClockEnable,
    SetMaxBasalRate,
    SetBasalProfileStandard,
    ReadTime,
    GetBattery,
    ReadRemainingInsulin,
    ReadFirmwareVersion,
    ReadErrorStatus,
    ReadRemoteControlIds,
    GetHistoryPage,
    GetPumpModel,
    ReadProfileStd512,
    ReadProfileA512,
    ReadProfileB512,
    ReadTempBasal,
    GetGlucosePage,
    ReadCurrentPageNumber,
    ReadSettings,
    ReadCurrentGlucosePage,
    ReadPumpStatus,
    SettingsChangeCounter,
    ReadOtherDevicesIds,
    ReadCaptureEventEnabled,
    ChangeCaptureEventEnable,
    ReadOtherDevicesStatus,
    /// Type byte outside the documented table, preserved verbatim
    Unknown(u8),
}

impl MessageType {
    /// Decode a message-type byte
    pub fn from_raw(byte: u8) -> Self {
        match byte {
            0x01 => MessageType::Alert,
            0x02 => MessageType::AlertCleared,
            0x03 => MessageType::DeviceTest,
            0x04 => MessageType::PumpStatus,
            0x06 => MessageType::PumpAck,
            0x08 => MessageType::PumpBackfill,
            0x09 => MessageType::FindDevice,
            0x0a => MessageType::DeviceLink,
            0x15 => MessageType::ErrorResponse,
            0x28 => MessageType::WriteGlucoseHistoryTimestamp,
            0x30 => MessageType::SetBasalProfileA,
            0x31 => MessageType::SetBasalProfileB,
            0x40 => MessageType::ChangeTime,
            0x41 => MessageType::SetMaxBolus,
            0x42 => MessageType::Bolus,
            0x4a => MessageType::SelectBasalProfile,
            0x4c => MessageType::ChangeTempBasal,
            0x51 => MessageType::SetRemoteControlId,
            0x53 => MessageType::SetLanguage,
            0x57 => MessageType::SetRemoteControlEnabled,
            0x5b => MessageType::ButtonPress,
            0x5d => MessageType::PowerOn,
            0x67 => MessageType::SetAlarmClockEnable,
            0x6e => MessageType::SetMaxBasalRate,
            0x6f => MessageType::SetBasalProfileStandard,
            0x70 => MessageType::ReadTime,
            0x72 => MessageType::GetBattery,
            0x73 => MessageType::ReadRemainingInsulin,
            0x74 => MessageType::ReadFirmwareVersion,
            0x75 => MessageType::ReadErrorStatus,
            0x76 => MessageType::ReadRemoteControlIds,
            0x80 => MessageType::GetHistoryPage,
            0x8d => MessageType::GetPumpModel,
            0x92 => MessageType::ReadProfileStd512,
            0x93 => MessageType::ReadProfileA512,
            0x94 => MessageType::ReadProfileB512,
            0x98 => MessageType::ReadTempBasal,
            0x9a => MessageType::GetGlucosePage,
            0x9d => MessageType::ReadCurrentPageNumber,
            0xc0 => MessageType::ReadSettings,
            0xcd => MessageType::ReadCurrentGlucosePage,
            0xce => MessageType::ReadPumpStatus,
            0xec => MessageType::SettingsChangeCounter,
            0xf0 => MessageType::ReadOtherDevicesIds,
            0xf1 => MessageType::ReadCaptureEventEnabled,
            0xf2 => MessageType::ChangeCaptureEventEnable,
            0xf3 => MessageType::ReadOtherDevicesStatus,
            other => MessageType::Unknown(other),
        }
    }

    /// The wire byte for this message type
    pub fn raw(&self) -> u8 {
        match self {
            MessageType::Alert => 0x01,
            MessageType::AlertCleared => 0x02,
            MessageType::DeviceTest => 0x03,
            MessageType::PumpStatus => 0x04,
            MessageType::PumpAck => 0x06,
            MessageType::PumpBackfill => 0x08,
            MessageType::FindDevice => 0x09,
            MessageType::DeviceLink => 0x0a,
            MessageType::ErrorResponse => 0x15,
            MessageType::WriteGlucoseHistoryTimestamp => 0x28,
            MessageType::SetBasalProfileA => 0x30,
            MessageType::SetBasalProfileB => 0x31,
            MessageType::ChangeTime => 0x40,
            MessageType::SetMaxBolus => 0x41,
            MessageType::Bolus => 0x42,
            MessageType::SelectBasalProfile => 0x4a,
            MessageType::ChangeTempBasal => 0x4c,
            MessageType::SetRemoteControlId => 0x51,
            MessageType::SetLanguage => 0x53,
            MessageType::SetRemoteControlEnabled => 0x57,
            MessageType::ButtonPress => 0x5b,
            MessageType::PowerOn => 0x5d,
            MessageType::SetAlarmClockEnable => 0x67,
            MessageType::SetMaxBasalRate => 0x6e,
            MessageType::SetBasalProfileStandard => 0x6f,
            MessageType::ReadTime => 0x70,
            MessageType::GetBattery => 0x72,
            MessageType::ReadRemainingInsulin => 0x73,
            MessageType::ReadFirmwareVersion => 0x74,
            MessageType::ReadErrorStatus => 0x75,
            MessageType::ReadRemoteControlIds => 0x76,
            MessageType::GetHistoryPage => 0x80,
            MessageType::GetPumpModel => 0x8d,
            MessageType::ReadProfileStd512 => 0x92,
            MessageType::ReadProfileA512 => 0x93,
            MessageType::ReadProfileB512 => 0x94,
            MessageType::ReadTempBasal => 0x98,
            MessageType::GetGlucosePage => 0x9a,
            MessageType::ReadCurrentPageNumber => 0x9d,
            MessageType::ReadSettings => 0xc0,
            MessageType::ReadCurrentGlucosePage => 0xcd,
            MessageType::ReadPumpStatus => 0xce,
            MessageType::SettingsChangeCounter => 0xec,
            MessageType::ReadOtherDevicesIds => 0xf0,
            MessageType::ReadCaptureEventEnabled => 0xf1,
            MessageType::ChangeCaptureEventEnable => 0xf2,
            MessageType::ReadOtherDevicesStatus => 0xf3,
            MessageType::Unknown(byte) => *byte,
        }
    }
}

/// A labeled pump message: the type byte plus the opaque body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpMessage {
    pub message_type: MessageType,
    pub body: Vec<u8>,
}

impl PumpMessage {
    /// Label a raw radio payload by its leading type byte
    ///
    /// Returns `None` for an empty payload. The body is carried verbatim;
    /// nothing here interprets it.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let (&type_byte, body) = payload.split_first()?;
        Some(Self {
            message_type: MessageType::from_raw(type_byte),
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types_round_trip() {
        for byte in 0u8..=0xff {
            let message_type = MessageType::from_raw(byte);
            assert_eq!(message_type.raw(), byte);
        }
    }

    #[test]
    fn test_unknown_type_preserved() {
        assert_eq!(MessageType::from_raw(0x05), MessageType::Unknown(0x05));
    }

    #[test]
    fn test_label_payload() {
        let message = PumpMessage::from_payload(&[0x8d, 0x00, 0x07]).unwrap();
        assert_eq!(message.message_type, MessageType::GetPumpModel);
        assert_eq!(message.body, vec![0x00, 0x07]);
    }

    #[test]
    fn test_empty_payload_unlabeled() {
        assert!(PumpMessage::from_payload(&[]).is_none());
    }
}
