//! Operational mode commands
//!
//! This module contains commands for controlling the radio's operating modes:
//! - Sleep mode for minimum power consumption
//! - Standby modes (RC and XOSC) for configuration
//! - Frequency synthesis, transmit and receive modes
//! - Power amplifier configuration
//! - Calibration procedures
//!
//! Most configuration commands must be issued in STDBY_RC mode.

use bitflags::bitflags;
use core::convert::Infallible;

use crate::{mode::rtc_steps, Command, NoParameters, ToByteArray};

bitflags! {
    /// Sleep configuration options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SleepConfig: u8 {
        /// Retain configuration through sleep (warm start)
        const WARM_START = 1 << 2;
        /// Wake up on RTC timeout
        const RTC_WAKEUP = 1;
    }
}

impl ToByteArray for SleepConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// SetSleep command (0x84)
///
/// # Important Notes
/// - Can only be issued from STDBY mode
/// - BUSY stays high while asleep, so no busy-wait follows this command
/// - Device wakes on an NSS falling edge (or RTC when enabled)
#[derive(Debug, Clone)]
pub struct SetSleep {
    /// Sleep configuration
    pub config: SleepConfig,
}

impl Command for SetSleep {
    type IdType = u8;
    type CommandParameters = SleepConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x84
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Standby oscillator selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandbyConfig {
    /// RC13M oscillator
    Rc = 0,
    /// 32 MHz crystal oscillator
    Xosc = 1,
}

impl ToByteArray for StandbyConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetStandby command (0x80)
#[derive(Debug, Clone)]
pub struct SetStandby {
    /// Standby mode configuration
    pub config: StandbyConfig,
}

impl Command for SetStandby {
    type IdType = u8;
    type CommandParameters = StandbyConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x80
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// SetFs command (0xC1)
///
/// Locks the PLL on the configured frequency.
#[derive(Debug, Clone)]
pub struct SetFs;

impl Command for SetFs {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0xC1
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// 24-bit Tx/Rx timeout in RTC steps of 15.625 µs
///
/// Sent big-endian, most significant byte first. Bits above 23 are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout(pub u32);

impl Timeout {
    /// No timeout for Tx, single-packet mode for Rx
    pub const NONE: Self = Self(0x00_0000);
    /// Rx stays on until commanded otherwise
    pub const CONTINUOUS: Self = Self(0xFF_FFFF);

    /// Converts milliseconds into RTC steps
    pub fn from_millis(ms: u32) -> Self {
        Self(rtc_steps(ms))
    }
}

impl ToByteArray for Timeout {
    type Error = Infallible;
    type Array = [u8; 3];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let [_, hi, mid, lo] = self.0.to_be_bytes();
        Ok([hi, mid, lo])
    }
}

/// SetTx command (0x83)
///
/// The chip returns to its fallback mode after TxDone or timeout.
#[derive(Debug, Clone)]
pub struct SetTx {
    /// Timeout, [`Timeout::NONE`] disables it
    pub timeout: Timeout,
}

impl Command for SetTx {
    type IdType = u8;
    type CommandParameters = Timeout;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x83
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.timeout
    }
}

/// RX operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxMode {
    /// Return after receiving a single packet
    Single,
    /// Continuous reception until stopped by command
    Continuous,
    /// Return after a packet or when the timeout, in milliseconds, elapses
    Timed(u32),
}

impl From<RxMode> for Timeout {
    fn from(mode: RxMode) -> Self {
        match mode {
            RxMode::Single => Timeout::NONE,
            RxMode::Continuous => Timeout::CONTINUOUS,
            RxMode::Timed(ms) => Timeout::from_millis(ms),
        }
    }
}

/// SetRx command (0x82)
#[derive(Debug, Clone)]
pub struct SetRx {
    /// RX operation mode
    pub mode: RxMode,
}

impl Command for SetRx {
    type IdType = u8;
    type CommandParameters = Timeout;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x82
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode.into()
    }
}

bitflags! {
    /// StopTimerOnPreamble configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StopTimerOnPreambleConfig: u8 {
        /// Stop the Rx timer on preamble detection instead of on header
        const STOP_ON_PREAMBLE = 1;
    }
}

impl ToByteArray for StopTimerOnPreambleConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// StopTimerOnPreamble command (0x9F)
#[derive(Debug, Clone)]
pub struct StopTimerOnPreamble {
    /// Stop on preamble configuration
    pub config: StopTimerOnPreambleConfig,
}

impl Command for StopTimerOnPreamble {
    type IdType = u8;
    type CommandParameters = StopTimerOnPreambleConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x9F
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// SetTxContinuousWave command (0xD1)
///
/// Unmodulated carrier until the mode is changed by command.
#[derive(Debug, Clone)]
pub struct SetTxContinuousWave;

impl Command for SetTxContinuousWave {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0xD1
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// SetTxInfinitePreamble command (0xD2)
///
/// Continuous LoRa preamble symbols until the mode is changed by command.
#[derive(Debug, Clone)]
pub struct SetTxInfinitePreamble;

impl Command for SetTxInfinitePreamble {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0xD2
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Regulator mode configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegulatorMode {
    /// LDO only
    LdoOnly = 0,
    /// DC-DC + LDO, requires the external inductor
    DcDcLdo = 1,
}

impl ToByteArray for RegulatorMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetRegulatorMode command (0x96)
#[derive(Debug, Clone)]
pub struct SetRegulatorMode {
    /// Regulator mode selection
    pub mode: RegulatorMode,
}

impl Command for SetRegulatorMode {
    type IdType = u8;
    type CommandParameters = RegulatorMode;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x96
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode
    }
}

bitflags! {
    /// Blocks to calibrate
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CalibrationConfig: u8 {
        /// RC64k oscillator
        const RC64K = 1 << 0;
        /// RC13M oscillator
        const RC13M = 1 << 1;
        /// PLL
        const PLL = 1 << 2;
        /// ADC pulse
        const ADC_PULSE = 1 << 3;
        /// ADC bulk N
        const ADC_BULK_N = 1 << 4;
        /// ADC bulk P
        const ADC_BULK_P = 1 << 5;
        /// Image rejection
        const IMAGE = 1 << 6;
    }
}

impl ToByteArray for CalibrationConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// Calibrate command (0x89)
///
/// Must be issued in STDBY_RC; BUSY stays high for up to 3.5 ms.
#[derive(Debug, Clone)]
pub struct Calibrate {
    /// Calibration configuration
    pub config: CalibrationConfig,
}

impl Command for Calibrate {
    type IdType = u8;
    type CommandParameters = CalibrationConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x89
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Image calibration band, in 4 MHz steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCalibConfig {
    /// Start frequency code
    pub freq1: u8,
    /// Stop frequency code
    pub freq2: u8,
}

impl ImageCalibConfig {
    /// Band covering `frequency_hz`, or `None` below 425 MHz
    pub fn for_frequency(frequency_hz: u32) -> Option<Self> {
        let (freq1, freq2) = match frequency_hz {
            f if f > 900_000_000 => (0xE1, 0xE9),
            f if f > 850_000_000 => (0xD7, 0xDB),
            f if f > 770_000_000 => (0xC1, 0xC5),
            f if f > 460_000_000 => (0x75, 0x81),
            f if f > 425_000_000 => (0x6B, 0x6F),
            _ => return None,
        };
        Some(Self { freq1, freq2 })
    }
}

impl ToByteArray for ImageCalibConfig {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.freq1, self.freq2])
    }
}

/// CalibrateImage command (0x98)
#[derive(Debug, Clone)]
pub struct CalibrateImage {
    /// Image calibration configuration
    pub config: ImageCalibConfig,
}

impl Command for CalibrateImage {
    type IdType = u8;
    type CommandParameters = ImageCalibConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x98
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// PA selection for [`PaConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelect {
    /// High-power PA (SX1262/SX1268)
    Sx1262 = 0,
    /// Low-power PA (SX1261)
    Sx1261 = 1,
}

/// PA preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaConfig {
    /// PA duty cycle
    pub duty_cycle: u8,
    /// HP max, 0x00-0x07
    pub hp_max: u8,
    /// PA selection
    pub device_sel: DeviceSelect,
    /// Always 0x01
    pub pa_lut: u8,
}

impl ToByteArray for PaConfig {
    type Error = Infallible;
    type Array = [u8; 4];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([
            self.duty_cycle,
            self.hp_max,
            self.device_sel as u8,
            self.pa_lut,
        ])
    }
}

/// SetPaConfig command (0x95)
///
/// Must precede SetTxParams. Resets the OCP register to the PA default.
#[derive(Debug, Clone)]
pub struct SetPaConfig {
    /// PA configuration
    pub config: PaConfig,
}

impl Command for SetPaConfig {
    type IdType = u8;
    type CommandParameters = PaConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x95
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// Mode entered after TxDone, RxDone or timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FallbackMode {
    /// FS
    Fs = 0x40,
    /// STDBY_XOSC
    StdbyXosc = 0x30,
    /// STDBY_RC (power-on default)
    StdbyRc = 0x20,
}

impl ToByteArray for FallbackMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self as u8])
    }
}

/// SetRxTxFallbackMode command (0x93)
#[derive(Debug, Clone)]
pub struct SetRxTxFallbackMode {
    /// Fallback mode selection
    pub mode: FallbackMode,
}

impl Command for SetRxTxFallbackMode {
    type IdType = u8;
    type CommandParameters = FallbackMode;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x93
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.mode
    }
}
