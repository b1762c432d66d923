//! Board control lines around the SPI bus
//!
//! The SX126x needs more than SPI: a chip select the driver toggles itself
//! (a wake-up is an NSS pulse with no clock), the BUSY handshake, DIO1, the
//! reset line and, on most boards, an RF switch. [`RadioController`]
//! abstracts all of these so [`Device`](crate::Device) stays board agnostic.
//!
//! [`PinRadioControl`] implements the trait on top of embedded-hal pins.
//! The RF switch truth table comes from a zero-sized [`RfSwitch`] board type.

use core::{convert::Infallible, marker::PhantomData};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin, PinState},
};
use log::{debug, warn};

use crate::{error::ControllerError, event::IrqLatch};

/// BUSY is sampled this many times before giving up
pub const BUSY_POLL_ATTEMPTS: u32 = 100;

/// Delay between BUSY samples
pub const BUSY_POLL_INTERVAL_MS: u32 = 1;

/// Position of the antenna switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfSwitchMode {
    /// Antenna to the receive path
    Rx,
    /// Antenna to the low-power PA
    TxLowPower,
    /// Antenna to the high-power PA
    TxHighPower,
}

/// Board-level control of the radio
///
/// Every method is blocking. `set_nss` is only ever called by the driver
/// around a complete SPI frame or to produce a wake-up pulse.
pub trait RadioController {
    /// Puts every control line in its idle state; may be called again
    fn init(&mut self) -> Result<(), ControllerError>;

    /// Drives the chip select line
    fn set_nss(&mut self, level: PinState) -> Result<(), ControllerError>;

    /// Returns once BUSY is low, or fails with [`ControllerError::BusyTimeout`]
    fn wait_while_busy(&mut self) -> Result<(), ControllerError>;

    /// Moves the antenna switch
    fn set_rf_switch_mode(&mut self, mode: RfSwitchMode) -> Result<(), ControllerError>;

    /// Arranges for DIO1 edges to reach `latch`
    fn setup_interrupts(&mut self, latch: &'static IrqLatch) -> Result<(), ControllerError>;

    /// Pulses NRESET; boards without a reset line keep the default
    fn reset(&mut self) -> Result<(), ControllerError> {
        Ok(())
    }

    /// NSS low then high, which wakes the chip from sleep
    fn wake_pulse(&mut self) -> Result<(), ControllerError> {
        self.set_nss(PinState::Low)?;
        self.set_nss(PinState::High)
    }

    /// Samples DIO1 for controllers without a real interrupt
    ///
    /// Called in a loop while the driver waits for an event. Controllers
    /// whose interrupt handler raises the latch directly keep the default.
    fn poll_interrupt(&mut self) -> Result<(), ControllerError> {
        Ok(())
    }
}

/// RF switch truth table of a board
pub trait RfSwitch {
    /// Levels of the three switch control lines for `mode`
    fn levels(mode: RfSwitchMode) -> Result<[PinState; 3], ControllerError>;
}

const fn levels(ctrl1: bool, ctrl2: bool, ctrl3: bool) -> [PinState; 3] {
    [
        if ctrl1 { PinState::High } else { PinState::Low },
        if ctrl2 { PinState::High } else { PinState::Low },
        if ctrl3 { PinState::High } else { PinState::Low },
    ]
}

/// One control line per path: RX enable, low-power TX, high-power TX
#[derive(Debug, Clone, Copy, Default)]
pub struct OneHotSwitch;

impl RfSwitch for OneHotSwitch {
    fn levels(mode: RfSwitchMode) -> Result<[PinState; 3], ControllerError> {
        Ok(match mode {
            RfSwitchMode::Rx => levels(true, false, false),
            RfSwitchMode::TxLowPower => levels(false, true, false),
            RfSwitchMode::TxHighPower => levels(false, false, true),
        })
    }
}

/// ST NUCLEO-WL55JC, FE_CTRL1..3 on PC4, PC5 and PC3
#[derive(Debug, Clone, Copy, Default)]
pub struct NucleoWl55jc;

impl RfSwitch for NucleoWl55jc {
    fn levels(mode: RfSwitchMode) -> Result<[PinState; 3], ControllerError> {
        Ok(match mode {
            RfSwitchMode::Rx => levels(true, false, true),
            RfSwitchMode::TxLowPower => levels(true, true, true),
            RfSwitchMode::TxHighPower => levels(false, true, true),
        })
    }
}

/// Seeed LoRa-E5, RX enable and TX enable only
#[derive(Debug, Clone, Copy, Default)]
pub struct LoraE5;

impl RfSwitch for LoraE5 {
    fn levels(mode: RfSwitchMode) -> Result<[PinState; 3], ControllerError> {
        match mode {
            RfSwitchMode::Rx => Ok(levels(true, false, false)),
            RfSwitchMode::TxHighPower => Ok(levels(false, true, false)),
            RfSwitchMode::TxLowPower => Err(ControllerError::LowPowerTxUnsupported),
        }
    }
}

/// Two-line switch found on most generic SX1262 modules
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericNode;

impl RfSwitch for GenericNode {
    fn levels(mode: RfSwitchMode) -> Result<[PinState; 3], ControllerError> {
        Ok(match mode {
            RfSwitchMode::Rx => levels(true, false, false),
            RfSwitchMode::TxLowPower => levels(true, true, false),
            RfSwitchMode::TxHighPower => levels(false, true, false),
        })
    }
}

/// Stand-in for a control line the board does not wire up
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Pins a [`PinRadioControl`] drives
///
/// Unused switch lines or a missing reset line can be filled with [`NoPin`].
pub struct RadioPins<NSS, BUSY, DIO1, RST, C1, C2, C3> {
    /// SPI chip select, active low
    pub nss: NSS,
    /// BUSY handshake input
    pub busy: BUSY,
    /// DIO1 interrupt input
    pub dio1: DIO1,
    /// NRESET, active low
    pub reset: RST,
    /// First RF switch control line
    pub ctrl1: C1,
    /// Second RF switch control line
    pub ctrl2: C2,
    /// Third RF switch control line
    pub ctrl3: C3,
}

/// [`RadioController`] built from embedded-hal pins and a delay
///
/// DIO1 is polled from [`RadioController::poll_interrupt`], so no interrupt
/// handler is needed.
pub struct PinRadioControl<NSS, BUSY, DIO1, RST, C1, C2, C3, D, SW> {
    pins: RadioPins<NSS, BUSY, DIO1, RST, C1, C2, C3>,
    delay: D,
    latch: Option<&'static IrqLatch>,
    switch: PhantomData<SW>,
}

impl<NSS, BUSY, DIO1, RST, C1, C2, C3, D, SW>
    PinRadioControl<NSS, BUSY, DIO1, RST, C1, C2, C3, D, SW>
{
    /// Wraps the pins; call [`RadioController::init`] before use
    pub fn new(pins: RadioPins<NSS, BUSY, DIO1, RST, C1, C2, C3>, delay: D) -> Self {
        Self {
            pins,
            delay,
            latch: None,
            switch: PhantomData,
        }
    }

    /// Gives the pins and the delay back
    pub fn release(self) -> (RadioPins<NSS, BUSY, DIO1, RST, C1, C2, C3>, D) {
        (self.pins, self.delay)
    }
}

fn drive<P: OutputPin>(pin: &mut P, level: PinState) -> Result<(), ControllerError> {
    pin.set_state(level).map_err(|_| ControllerError::HardwareInit)
}

impl<NSS, BUSY, DIO1, RST, C1, C2, C3, D, SW> RadioController
    for PinRadioControl<NSS, BUSY, DIO1, RST, C1, C2, C3, D, SW>
where
    NSS: OutputPin,
    BUSY: InputPin,
    DIO1: InputPin,
    RST: OutputPin,
    C1: OutputPin,
    C2: OutputPin,
    C3: OutputPin,
    D: DelayNs,
    SW: RfSwitch,
{
    fn init(&mut self) -> Result<(), ControllerError> {
        drive(&mut self.pins.nss, PinState::High)?;
        drive(&mut self.pins.reset, PinState::High)?;
        drive(&mut self.pins.ctrl1, PinState::Low)?;
        drive(&mut self.pins.ctrl2, PinState::Low)?;
        drive(&mut self.pins.ctrl3, PinState::Low)
    }

    fn set_nss(&mut self, level: PinState) -> Result<(), ControllerError> {
        drive(&mut self.pins.nss, level)
    }

    fn wait_while_busy(&mut self) -> Result<(), ControllerError> {
        for _ in 0..BUSY_POLL_ATTEMPTS {
            let busy = self
                .pins
                .busy
                .is_high()
                .map_err(|_| ControllerError::HardwareInit)?;
            if !busy {
                return Ok(());
            }
            self.delay.delay_ms(BUSY_POLL_INTERVAL_MS);
        }

        warn!(
            "BUSY still high after {} ms",
            BUSY_POLL_ATTEMPTS * BUSY_POLL_INTERVAL_MS
        );
        Err(ControllerError::BusyTimeout)
    }

    fn set_rf_switch_mode(&mut self, mode: RfSwitchMode) -> Result<(), ControllerError> {
        let [ctrl1, ctrl2, ctrl3] = SW::levels(mode)?;
        debug!("RF switch -> {:?}", mode);

        drive(&mut self.pins.ctrl1, ctrl1)?;
        drive(&mut self.pins.ctrl2, ctrl2)?;
        drive(&mut self.pins.ctrl3, ctrl3)
    }

    fn setup_interrupts(&mut self, latch: &'static IrqLatch) -> Result<(), ControllerError> {
        self.latch = Some(latch);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ControllerError> {
        drive(&mut self.pins.reset, PinState::Low)?;
        self.delay.delay_ms(1);
        drive(&mut self.pins.reset, PinState::High)?;
        self.delay.delay_ms(10);
        self.wait_while_busy()
    }

    fn wake_pulse(&mut self) -> Result<(), ControllerError> {
        drive(&mut self.pins.nss, PinState::Low)?;
        self.delay.delay_ms(1);
        drive(&mut self.pins.nss, PinState::High)
    }

    fn poll_interrupt(&mut self) -> Result<(), ControllerError> {
        let Some(latch) = self.latch else {
            return Ok(());
        };
        if self
            .pins
            .dio1
            .is_high()
            .map_err(|_| ControllerError::HardwareInit)?
        {
            latch.raise();
        }
        Ok(())
    }
}
