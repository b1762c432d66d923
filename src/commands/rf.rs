//! RF, modulation and packet commands
//!
//! This module contains commands for configuring RF parameters, modulation settings,
//! and packet handling. These commands control:
//! - RF frequency configuration
//! - Packet type selection
//! - TX power and ramping
//! - LoRa modulation and packet parameters
//! - Buffer management
//!
//! Most configuration commands must be issued while in STDBY_RC mode.

use core::convert::Infallible;

use regiface::FromByteArray;

use crate::{
    lora::{Bandwidth, CodingRate, HeaderType, IqPolarity, SpreadingFactor},
    Command, NoParameters, Status, ToByteArray,
};

/// Crystal frequency the PLL step is derived from
pub const XTAL_FREQ_HZ: u64 = 32_000_000;

/// RF frequency configuration parameters
///
/// The chip takes the frequency as `freq_hz * 2^25 / FXTAL`, rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfFrequencyConfig {
    /// RF frequency in Hz
    pub frequency: u32,
}

impl RfFrequencyConfig {
    /// PLL register value for this frequency
    pub fn raw(self) -> u32 {
        ((u64::from(self.frequency) << 25) / XTAL_FREQ_HZ) as u32
    }
}

impl ToByteArray for RfFrequencyConfig {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.raw().to_be_bytes())
    }
}

/// SetRfFrequency command (0x86)
#[derive(Debug, Clone)]
pub struct SetRfFrequency {
    /// RF frequency configuration
    pub config: RfFrequencyConfig,
}

impl Command for SetRfFrequency {
    type IdType = u8;
    type CommandParameters = RfFrequencyConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x86
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Packet type options for radio configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    /// GFSK packet type, only ever reported back by the chip
    Gfsk,
    /// LoRa packet type
    LoRa,
    /// Any other value reported by the chip
    Other(u8),
}

impl From<u8> for PacketType {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => Self::Gfsk,
            0x01 => Self::LoRa,
            other => Self::Other(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Gfsk => 0x00,
            PacketType::LoRa => 0x01,
            PacketType::Other(raw) => raw,
        }
    }
}

impl ToByteArray for PacketType {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.into()])
    }
}

/// SetPacketType command (0x8A)
///
/// Must come first in the configuration sequence; modulation and packet
/// parameters are lost when the type changes.
#[derive(Debug, Clone)]
pub struct SetPacketType {
    /// Packet type selection
    pub packet_type: PacketType,
}

impl Command for SetPacketType {
    type IdType = u8;
    type CommandParameters = PacketType;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8A
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.packet_type
    }
}

/// GetPacketType response
#[derive(Debug, Clone, Copy)]
pub struct GetPacketTypeResponse {
    /// Device status
    pub status: Status,
    /// Active packet type
    pub packet_type: PacketType,
}

impl FromByteArray for GetPacketTypeResponse {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status(bytes[0]),
            packet_type: PacketType::from(bytes[1]),
        })
    }
}

/// GetPacketType command (0x11)
#[derive(Debug, Clone)]
pub struct GetPacketType;

impl Command for GetPacketType {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = GetPacketTypeResponse;

    fn id() -> Self::IdType {
        0x11
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Power amplifier ramp time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampTime {
    /// 10 μs ramp time
    Micros10 = 0x00,
    /// 20 μs ramp time
    Micros20 = 0x01,
    /// 40 μs ramp time
    Micros40 = 0x02,
    /// 80 μs ramp time
    Micros80 = 0x03,
    /// 200 μs ramp time
    Micros200 = 0x04,
    /// 800 μs ramp time
    Micros800 = 0x05,
    /// 1700 μs ramp time
    Micros1700 = 0x06,
    /// 3400 μs ramp time
    Micros3400 = 0x07,
}

/// TX parameters configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    /// Output power in dBm, already clipped to the selected PA range
    pub power: i8,
    /// Power amplifier ramp time
    pub ramp_time: RampTime,
}

impl ToByteArray for TxParams {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.power as u8, self.ramp_time as u8])
    }
}

/// SetTxParams command (0x8E)
#[derive(Debug, Clone)]
pub struct SetTxParams {
    /// TX parameters configuration
    pub params: TxParams,
}

impl Command for SetTxParams {
    type IdType = u8;
    type CommandParameters = TxParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8E
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// LoRa modulation parameters
///
/// Serialized as `sf bw cr ldr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoraModulationParams {
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Bandwidth
    pub bandwidth: Bandwidth,
    /// Coding rate
    pub coding_rate: CodingRate,
    /// Low data rate optimization
    pub low_data_rate_optimize: bool,
}

impl ToByteArray for LoraModulationParams {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([
            self.spreading_factor as u8,
            self.bandwidth as u8,
            self.coding_rate as u8,
            u8::from(self.low_data_rate_optimize),
        ])
    }
}

/// SetModulationParams command (0x8B)
///
/// Must follow SetPacketType.
#[derive(Debug, Clone)]
pub struct SetModulationParams {
    /// Modulation parameters
    pub params: LoraModulationParams,
}

impl Command for SetModulationParams {
    type IdType = u8;
    type CommandParameters = LoraModulationParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8B
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// LoRa packet parameters
///
/// Serialized as `pre_hi pre_lo hdr len crc iq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoraPacketParams {
    /// Preamble length in symbols
    pub preamble_symbols: u16,
    /// Explicit or implicit header
    pub header_type: HeaderType,
    /// Payload length; the maximum accepted length when receiving
    pub payload_length: u8,
    /// Payload CRC on
    pub crc_enable: bool,
    /// IQ setup
    pub iq_polarity: IqPolarity,
}

impl ToByteArray for LoraPacketParams {
    type Error = Infallible;
    type Array = [u8; 6];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let [pre_hi, pre_lo] = self.preamble_symbols.to_be_bytes();
        Ok([
            pre_hi,
            pre_lo,
            self.header_type as u8,
            self.payload_length,
            u8::from(self.crc_enable),
            self.iq_polarity as u8,
        ])
    }
}

/// SetPacketParams command (0x8C)
///
/// Must follow SetModulationParams.
#[derive(Debug, Clone)]
pub struct SetPacketParams {
    /// Packet parameters
    pub params: LoraPacketParams,
}

impl Command for SetPacketParams {
    type IdType = u8;
    type CommandParameters = LoraPacketParams;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8C
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.params
    }
}

/// Buffer base addresses configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBaseAddressConfig {
    /// TX base address in data buffer (0-255)
    pub tx_base_addr: u8,
    /// RX base address in data buffer (0-255)
    pub rx_base_addr: u8,
}

impl ToByteArray for BufferBaseAddressConfig {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.tx_base_addr, self.rx_base_addr])
    }
}

/// SetBufferBaseAddress command (0x8F)
///
/// The 256-byte data buffer is shared between TX and RX and cleared in sleep.
#[derive(Debug, Clone)]
pub struct SetBufferBaseAddress {
    /// Buffer base addresses configuration
    pub config: BufferBaseAddressConfig,
}

impl Command for SetBufferBaseAddress {
    type IdType = u8;
    type CommandParameters = BufferBaseAddressConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x8F
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}
