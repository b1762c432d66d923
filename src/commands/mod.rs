//! Radio command implementations
//!
//! Every opcode the driver issues is a [`Command`](crate::Command) type here.
//! Commands are organized into functional categories:
//!
//! - [`dio`]: IRQ mask, DIO1 routing, IRQ status
//! - [`operational`]: Sleep, Standby, FS, TX/RX, calibration, PA
//! - [`rf`]: frequency, packet type, power, LoRa modulation and packet format
//! - [`status`]: device status, RX buffer, packet status, errors, statistics
//!
//! # Wire format
//! A SET command is the opcode followed by its parameters. A GET command is
//! the opcode followed by one NOP during which the chip clocks out its status
//! byte, then the response; the status byte is the first field of every
//! response type here.
//!
//! The BUSY line indicates when commands can be issued:
//! - High = Device busy, wait before sending command
//! - Low = Device ready for next command

mod dio;
mod operational;
mod rf;
mod status;

pub use dio::*;
pub use operational::*;
pub use rf::*;
pub use status::*;
