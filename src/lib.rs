#![cfg_attr(not(test), no_std)]
//! SX126x LoRa Radio Driver
//!
//! A blocking, interrupt-driven driver for the Semtech SX1261, SX1262 and
//! SX1268 sub-GHz transceivers, limited to the LoRa modem.
//!
//! # Features
//! - Frequency range: 150-960 MHz (SX1268: 410-810 MHz)
//! - LoRa: SF5-12, BW 7.8-500 kHz, CR 4/5-4/8
//! - Output power:
//!   - SX1261: -3 to +14 dBm
//!   - SX1262/SX1268: -3 to +22 dBm
//! - Board RF switches for the common SX126x modules
//!
//! # Architecture
//! The driver is organized into several modules:
//!
//! - [`device`]: the [`Device`] handle and the SPI framing
//!   - register, buffer and command transactions
//!   - BUSY handshake and wake-up from sleep
//!
//! - [`controller`]: NSS, BUSY, DIO1, reset and RF switch lines
//!   - [`RadioController`] trait and the embedded-hal [`PinRadioControl`]
//!
//! - [`mode`]: mode tracking and Sleep/Standby/FS/TX/RX commands
//!
//! - [`lora`]: [`LoraConfig`] and its application to the chip
//!
//! - [`packet`]: blocking `lora_tx` / `lora_rx`
//!
//! - [`event`]: IRQ status to [`RadioEvent`] pump
//!
//! - [`registers`]: register definitions for direct hardware access
//!
//! - [`commands`]: command interface for radio control
//!   - RF and modulation configuration
//!   - DIO and interrupt control
//!   - Operating mode control
//!   - Status monitoring and statistics
//!
//! # Usage
//! Commands and registers are typed with the `regiface` crate, so the
//! codec primitives on [`Device`] accept any of them. The usual flow is:
//!
//! 1. Create a [`Device`] with an SPI bus, a controller and an [`IrqLatch`]
//! 2. [`Device::init`], optionally [`Device::reset`] and [`Device::detect`]
//! 3. [`Device::configure_lora`]
//! 4. [`Device::lora_tx`] / [`Device::lora_rx`]
//! 5. [`Device::set_sleep`] between bursts
//!
//! # Important Notes
//! - Most configuration must be done in STDBY_RC mode
//! - Packet type must be set before other RF configuration
//! - SetPaConfig resets the OCP register, so the limit is written after it
//! - SPI is never issued while a TX or RX waits, other than the IRQ service
//!
//! # Example
//! ```no_run
//! use embedded_hal::spi::SpiBus;
//! use sx126x_lora::{ChipVariant, Device, Error, IrqLatch, LoraConfig, RadioController};
//!
//! static RADIO_IRQ: IrqLatch = IrqLatch::new();
//!
//! fn send_hello<SPI: SpiBus, RC: RadioController>(
//!     spi: SPI,
//!     controller: RC,
//! ) -> Result<(), Error<SPI::Error>> {
//!     let mut device = Device::new(spi, controller, ChipVariant::Sx1262, &RADIO_IRQ);
//!     device.init()?;
//!     device.configure_lora(LoraConfig::default())?;
//!     device.lora_tx(b"HELLO", 5_000)?;
//!     device.set_sleep()
//! }
//! ```

use regiface::*;

pub mod commands;
pub mod controller;
pub mod device;
pub mod error;
pub mod event;
pub mod lora;
pub mod mode;
pub mod packet;
pub mod registers;

#[cfg(test)]
mod mock;

pub use commands::*;
pub use controller::{
    GenericNode, LoraE5, NoPin, NucleoWl55jc, OneHotSwitch, PinRadioControl, RadioController,
    RadioPins, RfSwitch, RfSwitchMode,
};
pub use device::Device;
pub use error::{ConfigError, ControllerError, Error};
pub use event::{EventQueue, IrqLatch, RadioEvent};
pub use lora::{
    Bandwidth, ChipVariant, CodingRate, HeaderType, IqPolarity, LoraConfig, PaPath,
    SpreadingFactor,
};
pub use mode::RadioMode;
pub use packet::MAX_PAYLOAD_LEN;
pub use registers::*;
