//! Host-side model of the chip for driver tests
//!
//! [`MockSpi`] and [`MockController`] share one [`Chip`]. Frames are
//! collected between NSS low and NSS high and applied to the model when NSS
//! is released, so tests can assert on exact MOSI bytes and on what the chip
//! would have done with them.

use std::{cell::RefCell, collections::HashMap, rc::Rc, vec::Vec};

use embedded_hal::{
    digital::PinState,
    spi::{self, ErrorKind, ErrorType, SpiBus},
};

use crate::{
    controller::{RadioController, RfSwitchMode},
    error::ControllerError,
    event::IrqLatch,
    lora::ChipVariant,
    Device,
};

pub(crate) mod opcodes {
    pub const CLEAR_DEVICE_ERRORS: u8 = 0x07;
    pub const CLEAR_IRQ_STATUS: u8 = 0x02;
    pub const GET_DEVICE_ERRORS: u8 = 0x17;
    pub const GET_IRQ_STATUS: u8 = 0x12;
    pub const GET_PACKET_STATUS: u8 = 0x14;
    pub const GET_PACKET_TYPE: u8 = 0x11;
    pub const GET_RX_BUFFER_STATUS: u8 = 0x13;
    pub const GET_STATS: u8 = 0x10;
    pub const GET_STATUS: u8 = 0xC0;
    pub const READ_BUFFER: u8 = 0x1E;
    pub const READ_REGISTER: u8 = 0x1D;
    pub const SET_BUFFER_BASE_ADDRESS: u8 = 0x8F;
    pub const SET_DIO_IRQ_PARAMS: u8 = 0x08;
    pub const SET_FS: u8 = 0xC1;
    pub const SET_MODULATION_PARAMS: u8 = 0x8B;
    pub const SET_PACKET_PARAMS: u8 = 0x8C;
    pub const SET_PACKET_TYPE: u8 = 0x8A;
    pub const SET_PA_CONFIG: u8 = 0x95;
    pub const SET_RF_FREQUENCY: u8 = 0x86;
    pub const SET_RX: u8 = 0x82;
    pub const SET_SLEEP: u8 = 0x84;
    pub const SET_STANDBY: u8 = 0x80;
    pub const SET_TX: u8 = 0x83;
    pub const SET_TX_CONTINUOUS_WAVE: u8 = 0xD1;
    pub const SET_TX_INFINITE_PREAMBLE: u8 = 0xD2;
    pub const SET_TX_PARAMS: u8 = 0x8E;
    pub const WRITE_BUFFER: u8 = 0x0E;
    pub const WRITE_REGISTER: u8 = 0x0D;
}

/// Status byte clocked out on every response: STBY_RC, no command error
const STATUS_BYTE: u8 = 0x22;

/// One NSS-framed exchange
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    pub mosi: Vec<u8>,
    pub read_len: usize,
}

pub(crate) struct Chip {
    pub frames: Vec<Frame>,
    open: Option<Frame>,
    registers: HashMap<u16, u8>,
    pub buffer: [u8; 256],
    pub irq_status: u16,
    pub irq_mask: u16,
    pub dio1_mask: u16,
    pub packet_type: u8,
    pub device_errors: u16,
    /// Buffer offset a received payload is placed at
    pub rx_offset: u8,
    pub rx_len: u8,
    /// IRQ bits raised when SetTx arrives
    pub on_tx: Option<u16>,
    /// IRQ bits and payload delivered when SetRx arrives
    pub on_rx: Option<(u16, Vec<u8>)>,
    pub watchdog_on_tx: bool,
    pub asleep: bool,
    /// Frame count at each bare NSS pulse
    pub wake_pulses: Vec<usize>,
    pub nss_log: Vec<PinState>,
    pub switch_log: Vec<RfSwitchMode>,
    pub low_power_path: bool,
    pub busy_stuck: bool,
    pub spi_fails: bool,
    pub switch_fails: bool,
    pub registers_read_only: bool,
    pub inits: usize,
    pub resets: usize,
}

impl Default for Chip {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            open: None,
            registers: HashMap::new(),
            buffer: [0; 256],
            irq_status: 0,
            irq_mask: 0,
            dio1_mask: 0,
            packet_type: 0,
            device_errors: 0,
            rx_offset: 0,
            rx_len: 0,
            on_tx: None,
            on_rx: None,
            watchdog_on_tx: false,
            asleep: false,
            wake_pulses: Vec::new(),
            nss_log: Vec::new(),
            switch_log: Vec::new(),
            low_power_path: true,
            busy_stuck: false,
            spi_fails: false,
            switch_fails: false,
            registers_read_only: false,
            inits: 0,
            resets: 0,
        }
    }
}

fn word(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

impl Chip {
    /// First byte of every completed frame
    pub fn opcodes(&self) -> Vec<u8> {
        self.frames.iter().map(|frame| frame.mosi[0]).collect()
    }

    /// Whether a frame with exactly these MOSI bytes was sent
    pub fn sent(&self, mosi: &[u8]) -> bool {
        self.frames.iter().any(|frame| frame.mosi == mosi)
    }

    pub fn set_register(&mut self, addr: u16, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            self.registers.insert(addr + offset as u16, byte);
        }
    }

    pub fn register(&self, addr: u16) -> u8 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    fn response_byte(&self, mosi: &[u8], index: usize) -> u8 {
        let table = |bytes: &[u8]| bytes.get(index).copied().unwrap_or(0);
        let [irq_hi, irq_lo] = self.irq_status.to_be_bytes();
        let [err_hi, err_lo] = self.device_errors.to_be_bytes();

        match mosi[0] {
            opcodes::GET_STATUS => table(&[STATUS_BYTE]),
            opcodes::GET_IRQ_STATUS => table(&[STATUS_BYTE, irq_hi, irq_lo]),
            opcodes::GET_RX_BUFFER_STATUS => table(&[STATUS_BYTE, self.rx_len, self.rx_offset]),
            opcodes::GET_PACKET_TYPE => table(&[STATUS_BYTE, self.packet_type]),
            opcodes::GET_PACKET_STATUS => table(&[STATUS_BYTE, 0xA0, 0x28, 0xA2]),
            opcodes::GET_STATS => table(&[STATUS_BYTE, 0x00, 0x03, 0x00, 0x01, 0x00, 0x00]),
            opcodes::GET_DEVICE_ERRORS => table(&[STATUS_BYTE, err_hi, err_lo]),
            opcodes::READ_REGISTER => self.register(word(mosi[1], mosi[2]) + index as u16),
            opcodes::READ_BUFFER => self.buffer[(usize::from(mosi[1]) + index) % 256],
            _ => 0,
        }
    }

    fn apply(&mut self, mosi: &[u8], latch: Option<&IrqLatch>) {
        match mosi[0] {
            opcodes::WRITE_REGISTER if !self.registers_read_only => {
                let addr = word(mosi[1], mosi[2]);
                let data = mosi[3..].to_vec();
                self.set_register(addr, &data);
            }
            opcodes::WRITE_BUFFER => {
                for (i, &byte) in mosi[2..].iter().enumerate() {
                    self.buffer[(usize::from(mosi[1]) + i) % 256] = byte;
                }
            }
            opcodes::CLEAR_IRQ_STATUS => self.irq_status &= !word(mosi[1], mosi[2]),
            opcodes::SET_DIO_IRQ_PARAMS => {
                self.irq_mask = word(mosi[1], mosi[2]);
                self.dio1_mask = word(mosi[3], mosi[4]);
            }
            opcodes::SET_PACKET_TYPE => self.packet_type = mosi[1],
            opcodes::SET_TX => {
                if let Some(bits) = self.on_tx.take() {
                    self.irq_status |= bits & self.irq_mask;
                }
                if self.watchdog_on_tx {
                    if let Some(latch) = latch {
                        latch.raise_watchdog();
                    }
                }
            }
            opcodes::SET_RX => {
                if let Some((bits, payload)) = self.on_rx.take() {
                    for (i, &byte) in payload.iter().enumerate() {
                        self.buffer[(usize::from(self.rx_offset) + i) % 256] = byte;
                    }
                    self.rx_len = payload.len() as u8;
                    self.irq_status |= bits & self.irq_mask;
                }
            }
            opcodes::SET_SLEEP => self.asleep = true,
            _ => {}
        }
    }
}

pub(crate) type SharedChip = Rc<RefCell<Chip>>;

pub(crate) type MockDevice = Device<MockSpi, MockController>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockSpiError;

impl spi::Error for MockSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub(crate) struct MockSpi {
    chip: SharedChip,
}

impl ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl SpiBus for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut chip = self.chip.borrow_mut();
        if chip.spi_fails {
            return Err(MockSpiError);
        }

        let frame = chip.open.clone().expect("SPI read outside of NSS");
        for (i, word) in words.iter_mut().enumerate() {
            *word = chip.response_byte(&frame.mosi, frame.read_len + i);
        }
        if let Some(open) = chip.open.as_mut() {
            open.read_len += words.len();
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.chip.borrow_mut();
        if chip.spi_fails {
            return Err(MockSpiError);
        }

        chip.open
            .as_mut()
            .expect("SPI write outside of NSS")
            .mosi
            .extend_from_slice(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub(crate) struct MockController {
    chip: SharedChip,
    latch: Option<&'static IrqLatch>,
}

impl RadioController for MockController {
    fn init(&mut self) -> Result<(), ControllerError> {
        self.chip.borrow_mut().inits += 1;
        Ok(())
    }

    fn set_nss(&mut self, level: PinState) -> Result<(), ControllerError> {
        let mut chip = self.chip.borrow_mut();
        chip.nss_log.push(level);

        match level {
            PinState::Low => {
                chip.asleep = false;
                chip.open = Some(Frame::default());
            }
            PinState::High => {
                let frame = chip.open.take().unwrap_or_default();
                if frame.mosi.is_empty() {
                    let at = chip.frames.len();
                    chip.wake_pulses.push(at);
                } else {
                    chip.apply(&frame.mosi, self.latch);
                    chip.frames.push(frame);
                }
            }
        }
        Ok(())
    }

    fn wait_while_busy(&mut self) -> Result<(), ControllerError> {
        let chip = self.chip.borrow();
        if chip.busy_stuck || chip.asleep {
            Err(ControllerError::BusyTimeout)
        } else {
            Ok(())
        }
    }

    fn set_rf_switch_mode(&mut self, mode: RfSwitchMode) -> Result<(), ControllerError> {
        let mut chip = self.chip.borrow_mut();
        if chip.switch_fails {
            return Err(ControllerError::HardwareInit);
        }
        if mode == RfSwitchMode::TxLowPower && !chip.low_power_path {
            return Err(ControllerError::LowPowerTxUnsupported);
        }
        chip.switch_log.push(mode);
        Ok(())
    }

    fn setup_interrupts(&mut self, latch: &'static IrqLatch) -> Result<(), ControllerError> {
        self.latch = Some(latch);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ControllerError> {
        let mut chip = self.chip.borrow_mut();
        chip.resets += 1;
        chip.irq_status = 0;
        chip.asleep = false;
        Ok(())
    }

    fn poll_interrupt(&mut self) -> Result<(), ControllerError> {
        let chip = self.chip.borrow();
        if chip.irq_status & chip.dio1_mask != 0 {
            if let Some(latch) = self.latch {
                latch.raise();
            }
        }
        Ok(())
    }
}

/// Initialized device on a fresh chip model, with its own latch
pub(crate) fn device(variant: ChipVariant) -> (MockDevice, SharedChip) {
    let chip = SharedChip::default();
    let latch: &'static IrqLatch = Box::leak(Box::new(IrqLatch::new()));

    let spi = MockSpi { chip: chip.clone() };
    let controller = MockController {
        chip: chip.clone(),
        latch: None,
    };

    let mut device = Device::new(spi, controller, variant, latch);
    device.init().expect("mock controller init");
    (device, chip)
}
