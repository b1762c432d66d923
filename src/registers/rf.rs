//! RF-related registers

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Highest current limit the driver programs, in mA
pub const MAX_CURRENT_LIMIT_MA: u8 = 140;

/// Over-current protection register (address: 0x08E7)
///
/// Current limit = threshold * 2.5 mA. SetPaConfig rewrites this register
/// with the PA default, so it must be written afterwards.
#[register(0x08E7u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct OcpConfiguration {
    /// OCP current limit in steps of 2.5mA
    pub threshold: u8,
}

impl OcpConfiguration {
    /// Threshold for `milliamps`, capped at [`MAX_CURRENT_LIMIT_MA`]
    pub fn from_milliamps(milliamps: u8) -> Self {
        let capped = u16::from(milliamps.min(MAX_CURRENT_LIMIT_MA));
        Self {
            threshold: (capped * 2 / 5) as u8,
        }
    }

    /// Current limit in mA, rounded down
    pub fn milliamps(self) -> u16 {
        u16::from(self.threshold) * 5 / 2
    }
}

impl FromByteArray for OcpConfiguration {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            threshold: bytes[0],
        })
    }
}

impl ToByteArray for OcpConfiguration {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.threshold])
    }
}
