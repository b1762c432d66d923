//! LoRa packet registers

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Sync word of public (LoRaWAN) networks
pub const SYNC_WORD_PUBLIC: u16 = 0x3444;

/// Sync word of private networks, the power-on default
pub const SYNC_WORD_PRIVATE: u16 = 0x1424;

/// LoRa sync word register (address: 0x0740)
///
/// MSB at 0x0740, LSB at 0x0741. Radios only hear each other when their
/// sync words match.
#[register(0x0740u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct LoraSyncWord {
    /// Sync word value
    pub value: u16,
}

impl LoraSyncWord {
    /// Public or private network sync word
    pub fn network(public: bool) -> Self {
        Self {
            value: if public {
                SYNC_WORD_PUBLIC
            } else {
                SYNC_WORD_PRIVATE
            },
        }
    }
}

impl Default for LoraSyncWord {
    fn default() -> Self {
        Self {
            value: SYNC_WORD_PRIVATE,
        }
    }
}

impl FromByteArray for LoraSyncWord {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            value: u16::from_be_bytes(bytes),
        })
    }
}

impl ToByteArray for LoraSyncWord {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.value.to_be_bytes())
    }
}
