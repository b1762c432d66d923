//! IRQ and DIO1 routing commands
//!
//! The SX126x latches hardware events into a 16-bit IRQ status word. An event
//! is only latched when enabled in the IRQ mask, and only asserts DIO1 when it
//! is also routed there. DIO1 is the single interrupt line this driver uses;
//! DIO2 and DIO3 masks are always written as zero.

use core::convert::Infallible;

use bitflags::bitflags;
use regiface::FromByteArray;

use crate::{Command, NoParameters, Status, ToByteArray};

bitflags! {
    /// IRQ sources of the 16-bit IRQ status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqMask: u16 {
        /// Packet transmission completed
        const TX_DONE = 1 << 0;
        /// Packet received
        const RX_DONE = 1 << 1;
        /// Preamble detected
        const PREAMBLE_DETECTED = 1 << 2;
        /// Valid sync word detected
        const SYNC_WORD_VALID = 1 << 3;
        /// Valid LoRa header received
        const HEADER_VALID = 1 << 4;
        /// LoRa header CRC error
        const HEADER_ERR = 1 << 5;
        /// Wrong payload CRC
        const CRC_ERR = 1 << 6;
        /// Channel activity detection finished
        const CAD_DONE = 1 << 7;
        /// Channel activity detected
        const CAD_DETECTED = 1 << 8;
        /// Rx or Tx timeout
        const TIMEOUT = 1 << 9;
    }
}

impl IrqMask {
    /// Mask written to ClearIrqStatus to drop every latched source
    pub const CLEAR_ALL: u16 = 0xFFFF;
}

/// IRQ enable mask and its DIO routing
#[derive(Debug, Clone, Copy)]
pub struct DioIrqConfig {
    /// Sources allowed to latch into the IRQ status word
    pub irq_mask: IrqMask,
    /// Sources that assert DIO1
    pub dio1_mask: IrqMask,
    /// Sources that assert DIO2
    pub dio2_mask: IrqMask,
    /// Sources that assert DIO3
    pub dio3_mask: IrqMask,
}

impl DioIrqConfig {
    /// Enables `mask` and routes the same sources to DIO1 only
    pub fn dio1(mask: IrqMask) -> Self {
        Self {
            irq_mask: mask,
            dio1_mask: mask,
            dio2_mask: IrqMask::empty(),
            dio3_mask: IrqMask::empty(),
        }
    }

    /// Disables every source and every DIO route
    pub fn disabled() -> Self {
        Self::dio1(IrqMask::empty())
    }
}

impl ToByteArray for DioIrqConfig {
    type Error = Infallible;
    type Array = [u8; 8];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let mut bytes = [0u8; 8];
        bytes[0..2].copy_from_slice(&self.irq_mask.bits().to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dio1_mask.bits().to_be_bytes());
        bytes[4..6].copy_from_slice(&self.dio2_mask.bits().to_be_bytes());
        bytes[6..8].copy_from_slice(&self.dio3_mask.bits().to_be_bytes());
        Ok(bytes)
    }
}

/// SetDioIrqParams command (0x08)
#[derive(Debug, Clone)]
pub struct SetDioIrqParams {
    /// IRQ enable and routing masks
    pub config: DioIrqConfig,
}

impl Command for SetDioIrqParams {
    type IdType = u8;
    type CommandParameters = DioIrqConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x08
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}

/// GetIrqStatus response
#[derive(Debug, Clone, Copy)]
pub struct IrqStatusResponse {
    /// Device status clocked out with the NOP byte
    pub status: Status,
    /// Raw IRQ status word, including bits this driver has no name for
    pub irq_status: u16,
}

impl IrqStatusResponse {
    /// Named sources present in the status word
    pub fn irq(&self) -> IrqMask {
        IrqMask::from_bits_truncate(self.irq_status)
    }
}

impl FromByteArray for IrqStatusResponse {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            status: Status::from(bytes[0]),
            irq_status: u16::from_be_bytes([bytes[1], bytes[2]]),
        })
    }
}

/// GetIrqStatus command (0x12)
///
/// Flags stay latched until cleared with [`ClearIrqStatus`].
#[derive(Debug, Clone)]
pub struct GetIrqStatus;

impl Command for GetIrqStatus {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = IrqStatusResponse;

    fn id() -> Self::IdType {
        0x12
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// Bits to clear in the IRQ status word
#[derive(Debug, Clone, Copy)]
pub struct ClearIrqConfig {
    /// Raw clear mask, `0xFFFF` clears everything
    pub clear_mask: u16,
}

impl ToByteArray for ClearIrqConfig {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.clear_mask.to_be_bytes())
    }
}

/// ClearIrqStatus command (0x02)
#[derive(Debug, Clone)]
pub struct ClearIrqStatus {
    /// Clear mask
    pub config: ClearIrqConfig,
}

impl ClearIrqStatus {
    /// Clears every latched source
    pub fn all() -> Self {
        Self {
            config: ClearIrqConfig {
                clear_mask: IrqMask::CLEAR_ALL,
            },
        }
    }
}

impl Command for ClearIrqStatus {
    type IdType = u8;
    type CommandParameters = ClearIrqConfig;
    type ResponseParameters = NoParameters;

    fn id() -> Self::IdType {
        0x02
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.config
    }
}
