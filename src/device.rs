//! SX126x device interface
//!
//! [`Device`] owns the SPI bus and a [`RadioController`] and frames every
//! exchange with the chip:
//! - Reading and writing device registers
//! - Reading and writing the 256-byte data buffer
//! - Executing radio commands
//!
//! Before each frame the driver wakes the chip if it was put to sleep and
//! waits for BUSY to drop. NSS is driven by the controller, so the SPI type
//! is a plain [`SpiBus`] rather than an `SpiDevice`.
//!
//! # Example
//! ```ignore
//! use sx126x_lora::{ChipVariant, Device, IrqLatch, LoraConfig};
//!
//! static RADIO_IRQ: IrqLatch = IrqLatch::new();
//!
//! let mut device = Device::new(spi, controller, ChipVariant::Sx1262, &RADIO_IRQ);
//! device.init()?;
//! device.configure_lora(LoraConfig::default())?;
//! device.lora_tx(b"HELLO", 5_000)?;
//! ```

use core::convert::Infallible;

use embedded_hal::{digital::PinState, spi::SpiBus};
use log::{debug, trace};
use regiface::{ByteArray, Command, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

use crate::{
    commands::{
        ClearDeviceErrors, ClearIrqStatus, DeviceErrors, FallbackMode, GetDeviceErrors,
        GetPacketStatus, GetPacketType, GetStats, GetStatus, LoraPacketStatus, LoraStats,
        PacketType, Status,
    },
    controller::RadioController,
    error::Error,
    event::{EventQueue, IrqLatch},
    lora::{ChipVariant, LoraConfig},
    mode::RadioMode,
    registers::LoraSyncWord,
};

/// Size of the internal receive buffer, one full radio buffer
pub const SCRATCH_BUFFER_SIZE: usize = 256;

const WRITE_REGISTER: u8 = 0x0D;
const READ_REGISTER: u8 = 0x1D;
const WRITE_BUFFER: u8 = 0x0E;
const READ_BUFFER: u8 = 0x1E;

/// Sync word written by [`Device::detect`]
const DETECT_PATTERN: u16 = 0xBEEF;

/// Main device interface for the SX126x radio
pub struct Device<SPI, RC> {
    pub(crate) spi: SPI,
    pub(crate) controller: RC,
    pub(crate) latch: &'static IrqLatch,
    pub(crate) events: EventQueue,
    pub(crate) mode: RadioMode,
    pub(crate) continuous_rx: bool,
    pub(crate) fallback: FallbackMode,
    pub(crate) config: Option<LoraConfig>,
    pub(crate) variant: ChipVariant,
    pub(crate) deep_sleep: bool,
    pub(crate) scratch: [u8; SCRATCH_BUFFER_SIZE],
}

impl<SPI, RC> Device<SPI, RC> {
    /// Creates a driver; no I/O happens until [`init`](Self::init)
    ///
    /// `latch` receives DIO1 edges, usually from a `static` shared with the
    /// interrupt handler.
    pub fn new(spi: SPI, controller: RC, variant: ChipVariant, latch: &'static IrqLatch) -> Self {
        Self {
            spi,
            controller,
            latch,
            events: EventQueue::new(),
            mode: RadioMode::Unknown,
            continuous_rx: false,
            fallback: FallbackMode::StdbyRc,
            config: None,
            variant,
            deep_sleep: false,
            scratch: [0; SCRATCH_BUFFER_SIZE],
        }
    }

    /// Releases the SPI bus and the controller
    pub fn release(self) -> (SPI, RC) {
        (self.spi, self.controller)
    }

    /// Mode the driver last commanded
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    pub fn chip_variant(&self) -> ChipVariant {
        self.variant
    }

    /// Configuration applied by the last successful `configure_lora`
    pub fn lora_config(&self) -> Option<&LoraConfig> {
        self.config.as_ref()
    }

    /// True between `set_sleep` and the wake-up pulse of the next command
    pub fn is_sleeping(&self) -> bool {
        self.deep_sleep
    }

    /// The latch DIO1 edges are reported to
    pub fn irq_latch(&self) -> &'static IrqLatch {
        self.latch
    }
}

impl<SPI, RC> Device<SPI, RC>
where
    SPI: SpiBus,
    RC: RadioController,
{
    /// Brings up the control lines and hooks DIO1 to the latch
    pub fn init(&mut self) -> Result<(), Error<SPI::Error>> {
        self.controller.init()?;
        self.controller.setup_interrupts(self.latch)?;
        debug!("radio controller ready ({:?})", self.variant);
        Ok(())
    }

    /// Hardware reset through NRESET
    ///
    /// Forgets the mode, the stored configuration and any queued events.
    pub fn reset(&mut self) -> Result<(), Error<SPI::Error>> {
        self.controller.reset()?;
        self.mode = RadioMode::Unknown;
        self.continuous_rx = false;
        self.fallback = FallbackMode::StdbyRc;
        self.config = None;
        self.deep_sleep = false;
        self.drain_events();
        debug!("radio reset");
        Ok(())
    }

    /// Checks that the chip answers by writing and reading back the sync word
    ///
    /// The previous sync word is restored when the check passes.
    pub fn detect(&mut self) -> Result<(), Error<SPI::Error>> {
        let saved = self.read_register::<LoraSyncWord>()?;
        self.write_register(LoraSyncWord {
            value: DETECT_PATTERN,
        })?;

        let readback = self.read_register::<LoraSyncWord>()?.value;
        if readback != DETECT_PATTERN {
            debug!("radio not detected, sync word read back {:#06x}", readback);
            return Err(Error::NotDetected);
        }

        self.write_register(saved)
    }

    /// Reads a register value from the device
    ///
    /// Frame: `0x1D addr_hi addr_lo NOP`, then the register bytes.
    pub fn read_register<R>(&mut self) -> Result<R, Error<SPI::Error>>
    where
        R: ReadableRegister<IdType = u16> + FromByteArray<Error = Infallible>,
    {
        let mut header = [READ_REGISTER, 0x00, 0x00, 0x00];
        header[1..3].copy_from_slice(&R::id().to_be_bytes());

        let mut raw_value = <R as FromByteArray>::Array::new();
        self.transaction(&header, &[], raw_value.as_mut(), true)?;

        Ok(R::from_bytes(raw_value).unwrap_or_else(|never| match never {}))
    }

    /// Writes a value to a device register
    pub fn write_register<R>(&mut self, register: R) -> Result<(), Error<SPI::Error>>
    where
        R: WritableRegister<IdType = u16, Error = Infallible>,
    {
        let mut header = [WRITE_REGISTER, 0x00, 0x00];
        header[1..].copy_from_slice(&R::id().to_be_bytes());

        let raw_value = register.to_bytes().unwrap_or_else(|never| match never {});
        self.transaction(&header, raw_value.as_ref(), &mut [], true)
    }

    /// Writes bytes to the data buffer starting at `offset`
    pub fn write_buffer(&mut self, offset: u8, bytes: &[u8]) -> Result<(), Error<SPI::Error>> {
        self.transaction(&[WRITE_BUFFER, offset], bytes, &mut [], true)
    }

    /// Fills `bytes` from the data buffer starting at `offset`
    ///
    /// The status byte is clocked out during the NOP of the header, so
    /// exactly `bytes.len()` payload bytes are read.
    pub fn read_buffer(&mut self, offset: u8, bytes: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        self.transaction(&[READ_BUFFER, offset, 0x00], &[], bytes, true)
    }

    /// Executes a command on the device
    ///
    /// Responses start with the status byte, which every response type in
    /// [`commands`](crate::commands) decodes first.
    pub fn execute_command<C>(&mut self, command: C) -> Result<C::ResponseParameters, Error<SPI::Error>>
    where
        C: Command<IdType = u8>,
        C::CommandParameters: ToByteArray<Error = Infallible>,
        C::ResponseParameters: FromByteArray<Error = Infallible>,
    {
        self.command(command, true)
    }

    /// [`execute_command`](Self::execute_command) with control over the
    /// trailing BUSY wait; SetSleep must skip it
    pub(crate) fn command<C>(
        &mut self,
        command: C,
        await_ready: bool,
    ) -> Result<C::ResponseParameters, Error<SPI::Error>>
    where
        C: Command<IdType = u8>,
        C::CommandParameters: ToByteArray<Error = Infallible>,
        C::ResponseParameters: FromByteArray<Error = Infallible>,
    {
        let request = command
            .invoking_parameters()
            .to_bytes()
            .unwrap_or_else(|never| match never {});
        let mut raw_response = <C::ResponseParameters as FromByteArray>::Array::new();

        self.transaction(&[C::id()], request.as_ref(), raw_response.as_mut(), await_ready)?;

        Ok(C::ResponseParameters::from_bytes(raw_response).unwrap_or_else(|never| match never {}))
    }

    /// Status byte: chip mode and the result of the last command
    pub fn get_status(&mut self) -> Result<Status, Error<SPI::Error>> {
        self.execute_command(GetStatus)
    }

    /// Packet type the modem is set to
    pub fn packet_type(&mut self) -> Result<PacketType, Error<SPI::Error>> {
        Ok(self.execute_command(GetPacketType)?.packet_type)
    }

    /// Latched calibration, PLL and PA errors
    pub fn device_errors(&mut self) -> Result<DeviceErrors, Error<SPI::Error>> {
        Ok(self.execute_command(GetDeviceErrors)?.errors)
    }

    pub fn clear_device_errors(&mut self) -> Result<(), Error<SPI::Error>> {
        self.execute_command(ClearDeviceErrors)?;
        Ok(())
    }

    /// Packet counters since the last reset of the chip
    pub fn lora_stats(&mut self) -> Result<LoraStats, Error<SPI::Error>> {
        Ok(self.execute_command(GetStats)?.stats)
    }

    /// Link quality of the last received packet
    pub fn packet_status(&mut self) -> Result<LoraPacketStatus, Error<SPI::Error>> {
        Ok(self.execute_command(GetPacketStatus)?.packet_status)
    }

    pub(crate) fn clear_irq_status(&mut self) -> Result<(), Error<SPI::Error>> {
        self.execute_command(ClearIrqStatus::all())?;
        Ok(())
    }

    /// One NSS-framed exchange: header, then `write`, then `read`
    ///
    /// NSS is released even when the bus fails. The trailing BUSY wait is
    /// skipped when `await_ready` is false.
    fn transaction(
        &mut self,
        header: &[u8],
        write: &[u8],
        read: &mut [u8],
        await_ready: bool,
    ) -> Result<(), Error<SPI::Error>> {
        self.check_device_ready()?;
        trace!(
            "spi {:02x?} {:02x?} (+{} read)",
            header,
            write,
            read.len()
        );

        self.controller.set_nss(PinState::Low)?;
        let transfer = self.transfer(header, write, read);
        self.controller.set_nss(PinState::High)?;
        transfer.map_err(Error::Spi)?;

        if await_ready {
            self.controller.wait_while_busy()?;
        }
        Ok(())
    }

    fn transfer(&mut self, header: &[u8], write: &[u8], read: &mut [u8]) -> Result<(), SPI::Error> {
        self.spi.write(header)?;
        if !write.is_empty() {
            self.spi.write(write)?;
        }
        if !read.is_empty() {
            self.spi.read(read)?;
        }
        self.spi.flush()
    }

    /// Wakes a sleeping chip, then waits for BUSY to drop
    fn check_device_ready(&mut self) -> Result<(), Error<SPI::Error>> {
        if self.deep_sleep {
            debug!("waking radio");
            self.controller.wake_pulse()?;
            self.deep_sleep = false;
            self.mode = RadioMode::Standby;
        }
        self.controller.wait_while_busy()?;
        Ok(())
    }
}
