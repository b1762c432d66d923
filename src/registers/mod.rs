//! Register definitions for the SX126x radio
//!
//! Only the registers the LoRa driver touches are modelled: the LoRa sync
//! word and the PA over-current limit.

mod packet;
mod rf;

pub use packet::*;
pub use rf::*;
