//! Status commands
//!
//! Every GET command clocks the device status out during the byte that
//! follows the opcode, so each response here starts with a [`Status`].

use core::convert::Infallible;

use bitflags::bitflags;
use regiface::FromByteArray;

use crate::{Command, NoParameters, ToByteArray};

/// Chip operating mode, status byte bits 6:4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// STDBY_RC
    StandbyRc = 0x2,
    /// STDBY_XOSC
    StandbyXosc = 0x3,
    /// FS
    FrequencySynthesizer = 0x4,
    /// RX
    Receive = 0x5,
    /// TX
    Transmit = 0x6,
}

impl TryFrom<u8> for OperatingMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x2 => Ok(Self::StandbyRc),
            0x3 => Ok(Self::StandbyXosc),
            0x4 => Ok(Self::FrequencySynthesizer),
            0x5 => Ok(Self::Receive),
            0x6 => Ok(Self::Transmit),
            invalid => Err(invalid),
        }
    }
}

/// Result of the last command, status byte bits 3:1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandStatus {
    /// Data is available to be read from the radio
    DataAvailable = 0x2,
    /// Command timed out
    Timeout = 0x3,
    /// Command could not be processed (bad opcode or parameters)
    ProcessingError = 0x4,
    /// Command could not be executed
    ExecutionFailure = 0x5,
    /// TX completed
    TxDone = 0x6,
}

impl TryFrom<u8> for CommandStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x2 => Ok(Self::DataAvailable),
            0x3 => Ok(Self::Timeout),
            0x4 => Ok(Self::ProcessingError),
            0x5 => Ok(Self::ExecutionFailure),
            0x6 => Ok(Self::TxDone),
            invalid => Err(invalid),
        }
    }
}

/// Device status byte
///
/// The raw byte is kept as read; a sleeping or absent chip clocks out
/// values that decode to neither field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    /// Decoded operating mode, if valid
    pub fn mode(self) -> Option<OperatingMode> {
        OperatingMode::try_from((self.0 >> 4) & 0x7).ok()
    }

    /// Decoded command status, if valid
    pub fn command_status(self) -> Option<CommandStatus> {
        CommandStatus::try_from((self.0 >> 1) & 0x7).ok()
    }
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl FromByteArray for Status {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self(bytes[0]))
    }
}

/// GetStatus command (0xC0)
#[derive(Debug, Clone)]
pub struct GetStatus;

impl Command for GetStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = Status;

    fn id() -> Self::IdType {
        0xC0
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Location of the last received payload in the data buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxBufferStatus {
    /// Payload length in bytes
    pub payload_length: u8,
    /// Buffer offset of the first payload byte
    pub buffer_pointer: u8,
}

/// GetRxBufferStatus response
#[derive(Debug, Clone, Copy)]
pub struct GetRxBufferStatusResponse {
    /// Device status
    pub status: Status,
    /// Payload location
    pub buffer_status: RxBufferStatus,
}

impl FromByteArray for GetRxBufferStatusResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            buffer_status: RxBufferStatus {
                payload_length: bytes[1],
                buffer_pointer: bytes[2],
            },
        })
    }
}

/// GetRxBufferStatus command (0x13)
///
/// Valid after RxDone and until the next reception.
#[derive(Debug, Clone)]
pub struct GetRxBufferStatus;

impl Command for GetRxBufferStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetRxBufferStatusResponse;

    fn id() -> Self::IdType {
        0x13
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Link quality of the last received LoRa packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoraPacketStatus {
    /// Average RSSI over the packet, `-raw / 2` dBm
    pub rssi_pkt: u8,
    /// SNR estimate, two's complement `raw / 4` dB
    pub snr_pkt: u8,
    /// Despread signal RSSI, `-raw / 2` dBm
    pub signal_rssi_pkt: u8,
}

impl LoraPacketStatus {
    /// Packet RSSI in dBm
    pub fn rssi_dbm(&self) -> i16 {
        -(self.rssi_pkt as i16) / 2
    }

    /// Packet SNR in dB
    pub fn snr_db(&self) -> i8 {
        (self.snr_pkt as i8) / 4
    }

    /// Signal RSSI in dBm
    pub fn signal_rssi_dbm(&self) -> i16 {
        -(self.signal_rssi_pkt as i16) / 2
    }
}

/// GetPacketStatus response
#[derive(Debug, Clone, Copy)]
pub struct GetPacketStatusResponse {
    /// Device status
    pub status: Status,
    /// LoRa packet status
    pub packet_status: LoraPacketStatus,
}

impl FromByteArray for GetPacketStatusResponse {
    type Error = Infallible;
    type Array = [u8; 4];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            packet_status: LoraPacketStatus {
                rssi_pkt: bytes[1],
                snr_pkt: bytes[2],
                signal_rssi_pkt: bytes[3],
            },
        })
    }
}

/// GetPacketStatus command (0x14)
#[derive(Debug, Clone)]
pub struct GetPacketStatus;

impl Command for GetPacketStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetPacketStatusResponse;

    fn id() -> Self::IdType {
        0x14
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

bitflags! {
    /// Latched device error flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceErrors: u16 {
        /// RC64k calibration failed
        const RC64K_CALIB = 1 << 0;
        /// RC13M calibration failed
        const RC13M_CALIB = 1 << 1;
        /// PLL calibration failed
        const PLL_CALIB = 1 << 2;
        /// ADC calibration failed
        const ADC_CALIB = 1 << 3;
        /// Image calibration failed
        const IMG_CALIB = 1 << 4;
        /// Crystal oscillator failed to start
        const XOSC_START = 1 << 5;
        /// PLL failed to lock
        const PLL_LOCK = 1 << 6;
        /// PA ramping failed
        const PA_RAMP = 1 << 8;
    }
}

/// GetDeviceErrors response
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceErrorsResponse {
    /// Device status
    pub status: Status,
    /// Latched errors
    pub errors: DeviceErrors,
}

impl FromByteArray for GetDeviceErrorsResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            errors: DeviceErrors::from_bits_truncate(u16::from_be_bytes([bytes[1], bytes[2]])),
        })
    }
}

/// GetDeviceErrors command (0x17)
#[derive(Debug, Clone)]
pub struct GetDeviceErrors;

impl Command for GetDeviceErrors {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetDeviceErrorsResponse;

    fn id() -> Self::IdType {
        0x17
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Two zero bytes that must follow the ClearDeviceErrors opcode
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearDeviceErrorsParams;

impl ToByteArray for ClearDeviceErrorsParams {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([0x00, 0x00])
    }
}

/// ClearDeviceErrors command (0x07)
///
/// Errors can only be cleared all at once.
#[derive(Debug, Clone)]
pub struct ClearDeviceErrors;

impl Command for ClearDeviceErrors {
    type IdType = u8;
    type CommandParameters = ClearDeviceErrorsParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x07
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        ClearDeviceErrorsParams
    }
}

/// LoRa reception counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoraStats {
    /// Packets received
    pub packets_received: u16,
    /// Packets dropped on payload CRC
    pub crc_errors: u16,
    /// Packets dropped on header CRC
    pub header_errors: u16,
}

/// GetStats response
#[derive(Debug, Clone, Copy)]
pub struct GetStatsResponse {
    /// Device status
    pub status: Status,
    /// Reception counters
    pub stats: LoraStats,
}

impl FromByteArray for GetStatsResponse {
    type Error = Infallible;
    type Array = [u8; 7];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            stats: LoraStats {
                packets_received: u16::from_be_bytes([bytes[1], bytes[2]]),
                crc_errors: u16::from_be_bytes([bytes[3], bytes[4]]),
                header_errors: u16::from_be_bytes([bytes[5], bytes[6]]),
            },
        })
    }
}

/// GetStats command (0x10)
///
/// Counters persist through sleep.
#[derive(Debug, Clone)]
pub struct GetStats;

impl Command for GetStats {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetStatsResponse;

    fn id() -> Self::IdType {
        0x10
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_byte_decodes_mode_and_command_status() {
        let status = Status(0b0010_1000);
        assert_eq!(status.mode(), Some(OperatingMode::StandbyRc));
        assert_eq!(status.command_status(), Some(CommandStatus::ProcessingError));

        assert_eq!(Status(0x00).mode(), None);
        assert_eq!(Status(0x00).command_status(), None);
    }

    #[test]
    fn packet_status_scales_to_dbm() {
        let response = GetPacketStatusResponse::from_bytes([0x52, 0xA0, 0xF8, 0xA2]).unwrap();
        let status = response.packet_status;
        assert_eq!(status.rssi_dbm(), -80);
        assert_eq!(status.snr_db(), -2);
        assert_eq!(status.signal_rssi_dbm(), -81);
    }

    #[test]
    fn stats_are_big_endian_counters() {
        let response =
            GetStatsResponse::from_bytes([0x52, 0x01, 0x02, 0x00, 0x03, 0x00, 0x04]).unwrap();
        assert_eq!(
            response.stats,
            LoraStats {
                packets_received: 0x0102,
                crc_errors: 3,
                header_errors: 4,
            }
        );
    }

    #[test]
    fn device_errors_span_both_bytes() {
        let response = GetDeviceErrorsResponse::from_bytes([0x22, 0x01, 0x20]).unwrap();
        assert_eq!(response.errors, DeviceErrors::PA_RAMP | DeviceErrors::XOSC_START);
    }
}
