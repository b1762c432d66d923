//! Driver error types

use core::fmt;

use crate::event::RadioEvent;

/// Failure reported by a [`RadioController`](crate::controller::RadioController)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerError {
    /// A control pin could not be driven or sampled
    HardwareInit,
    /// BUSY stayed asserted for the whole polling window
    BusyTimeout,
    /// The board's RF switch has no low-power transmit path
    LowPowerTxUnsupported,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareInit => f.write_str("radio controller hardware initialization failed"),
            Self::BusyTimeout => f.write_str("radio BUSY line did not deassert in time"),
            Self::LowPowerTxUnsupported => f.write_str("RF switch has no low-power TX path"),
        }
    }
}

impl core::error::Error for ControllerError {}

/// Reasons a [`LoraConfig`](crate::lora::LoraConfig) is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Carrier frequency (Hz) outside the band supported by the chip variant
    FrequencyOutOfRange(u32),
    /// Preamble shorter than the 6 symbol minimum
    PreambleTooShort(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrequencyOutOfRange(hz) => {
                write!(f, "frequency {hz} Hz is outside the supported band")
            }
            Self::PreambleTooShort(len) => write!(f, "preamble of {len} symbols is too short"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Errors returned by [`Device`](crate::Device) operations
///
/// `E` is the error type of the SPI bus the device was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// RadioController initialization failed
    HardwareInit,
    /// The sync word register did not read back what was written
    NotDetected,
    /// The SPI transport failed
    Spi(E),
    /// BUSY did not deassert in time
    BusyTimeout,
    /// TX or RX attempted before `configure_lora`
    ConfigMissing,
    /// The LoRa configuration was rejected
    InvalidConfig(ConfigError),
    /// TX payload longer than the 255 byte radio buffer allows
    PayloadTooLarge(usize),
    /// The hardware timer elapsed before TxDone
    TxTimeout,
    /// A packet was received with a CRC failure
    RxCrcError,
    /// The event queue yielded an event outside the armed mask
    UnexpectedEvent(RadioEvent),
    /// The RF switch cannot enter the low-power TX path
    LowPowerTxUnsupported,
    /// An interrupt produced more events than the queue could hold
    QueueOverflow,
}

impl<E> From<ControllerError> for Error<E> {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::HardwareInit => Self::HardwareInit,
            ControllerError::BusyTimeout => Self::BusyTimeout,
            ControllerError::LowPowerTxUnsupported => Self::LowPowerTxUnsupported,
        }
    }
}

impl<E> From<ConfigError> for Error<E> {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareInit => f.write_str("radio controller initialization failed"),
            Self::NotDetected => f.write_str("radio not detected"),
            Self::Spi(err) => write!(f, "SPI transport error: {err:?}"),
            Self::BusyTimeout => f.write_str("radio BUSY line did not deassert in time"),
            Self::ConfigMissing => f.write_str("LoRa configuration missing"),
            Self::InvalidConfig(err) => write!(f, "invalid LoRa configuration: {err}"),
            Self::PayloadTooLarge(len) => write!(f, "payload of {len} bytes is too large"),
            Self::TxTimeout => f.write_str("transmission timed out"),
            Self::RxCrcError => f.write_str("received packet failed its CRC"),
            Self::UnexpectedEvent(event) => write!(f, "unexpected radio event {event:?}"),
            Self::LowPowerTxUnsupported => f.write_str("RF switch has no low-power TX path"),
            Self::QueueOverflow => f.write_str("radio event queue overflow"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}
