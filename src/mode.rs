//! Radio operating modes and the transitions between them
//!
//! The driver tracks the mode it last commanded. A request that is not a
//! legal successor of the current mode is routed through STDBY_RC first.

use embedded_hal::spi::SpiBus;
use log::{debug, warn};

use crate::{
    commands::{
        Calibrate, CalibrationConfig, FallbackMode, RegulatorMode, RxMode, SetFs, SetRegulatorMode,
        SetRx, SetRxTxFallbackMode, SetSleep, SetStandby, SetTx, SetTxContinuousWave,
        SetTxInfinitePreamble, SleepConfig, StandbyConfig, StopTimerOnPreamble,
        StopTimerOnPreambleConfig, Timeout,
    },
    controller::{RadioController, RfSwitchMode},
    error::Error,
    Device,
};

/// RTC steps per millisecond (one step is 15.625 µs)
pub const RTC_STEPS_PER_MS: u32 = 64;

/// Largest timeout that still means "timed"; 0xFFFFFF selects continuous Rx
pub const MAX_RTC_STEPS: u32 = 0xFF_FFFE;

/// Converts a timeout in milliseconds into 24-bit RTC steps
///
/// Zero stays zero ("no timeout"); anything beyond the 24-bit range
/// saturates at [`MAX_RTC_STEPS`].
pub fn rtc_steps(timeout_ms: u32) -> u32 {
    timeout_ms
        .saturating_mul(RTC_STEPS_PER_MS)
        .min(MAX_RTC_STEPS)
}

/// Mode the driver last put the chip in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioMode {
    /// Not yet commanded since power-up or reset
    #[default]
    Unknown,
    /// Sleep, only an NSS pulse wakes the chip
    Sleep,
    /// STDBY_RC or STDBY_XOSC
    Standby,
    /// Frequency synthesizer locked
    Fs,
    /// Transmitting a packet
    Tx,
    /// Receiving
    Rx,
    /// Continuous wave or infinite preamble
    TxContinuous,
}

impl RadioMode {
    /// Whether `next` may be requested directly from this mode
    ///
    /// Standby is always reachable. Everything else has to go through it.
    pub fn can_enter(self, next: RadioMode) -> bool {
        use RadioMode::*;

        match (self, next) {
            (_, Standby) => true,
            (Standby, Fs | Tx | Rx | TxContinuous | Sleep) => true,
            (Fs, Tx | Rx | Sleep) => true,
            _ => false,
        }
    }

    /// Mode the chip falls back to on its own after TxDone, RxDone or timeout
    pub fn after_fallback(fallback: FallbackMode) -> RadioMode {
        match fallback {
            FallbackMode::Fs => RadioMode::Fs,
            FallbackMode::StdbyRc | FallbackMode::StdbyXosc => RadioMode::Standby,
        }
    }
}

impl<SPI, RC> Device<SPI, RC>
where
    SPI: SpiBus,
    RC: RadioController,
{
    /// STDBY_RC, the mode every configuration command expects
    pub fn set_standby(&mut self) -> Result<(), Error<SPI::Error>> {
        self.standby(StandbyConfig::Rc)
    }

    /// STDBY_XOSC, crystal kept running
    pub fn set_standby_xosc(&mut self) -> Result<(), Error<SPI::Error>> {
        self.standby(StandbyConfig::Xosc)
    }

    fn standby(&mut self, config: StandbyConfig) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetStandby { config })?;
        self.mode = RadioMode::Standby;
        self.continuous_rx = false;
        Ok(())
    }

    /// Warm-start sleep with the RTC off
    ///
    /// BUSY stays high while the chip sleeps, so no busy-wait follows the
    /// command. The next transaction wakes the chip with an NSS pulse.
    pub fn set_sleep(&mut self) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::Sleep)?;
        self.command(
            SetSleep {
                config: SleepConfig::WARM_START,
            },
            false,
        )?;
        self.mode = RadioMode::Sleep;
        self.deep_sleep = true;
        debug!("radio asleep");
        Ok(())
    }

    /// Locks the synthesizer on the configured frequency
    pub fn set_fs(&mut self) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::Fs)?;
        self.execute_command(SetFs)?;
        self.mode = RadioMode::Fs;
        Ok(())
    }

    /// Starts transmitting the buffer; zero disables the timeout
    pub fn set_tx(&mut self, timeout_ms: u32) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::Tx)?;
        self.execute_command(SetTx {
            timeout: Timeout::from_millis(timeout_ms),
        })?;
        self.mode = RadioMode::Tx;
        Ok(())
    }

    /// Starts receiving
    pub fn set_rx(&mut self, mode: RxMode) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::Rx)?;
        self.execute_command(SetRx { mode })?;
        self.mode = RadioMode::Rx;
        self.continuous_rx = mode == RxMode::Continuous;
        Ok(())
    }

    /// Unmodulated carrier until the next standby
    pub fn set_tx_continuous_wave(&mut self) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::TxContinuous)?;
        self.controller
            .set_rf_switch_mode(RfSwitchMode::TxHighPower)?;
        self.execute_command(SetTxContinuousWave)?;
        self.mode = RadioMode::TxContinuous;
        Ok(())
    }

    /// Endless preamble until the next standby
    pub fn set_tx_infinite_preamble(&mut self) -> Result<(), Error<SPI::Error>> {
        self.enter(RadioMode::TxContinuous)?;
        self.controller
            .set_rf_switch_mode(RfSwitchMode::TxHighPower)?;
        self.execute_command(SetTxInfinitePreamble)?;
        self.mode = RadioMode::TxContinuous;
        Ok(())
    }

    /// Whether the RX timeout stops on preamble detection rather than on a valid header
    pub fn stop_timer_on_preamble(&mut self, enable: bool) -> Result<(), Error<SPI::Error>> {
        let config = if enable {
            StopTimerOnPreambleConfig::STOP_ON_PREAMBLE
        } else {
            StopTimerOnPreambleConfig::empty()
        };
        self.execute_command(StopTimerOnPreamble { config })?;
        Ok(())
    }

    pub fn set_regulator_mode(&mut self, mode: RegulatorMode) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetRegulatorMode { mode })?;
        Ok(())
    }

    /// Calibrates the given blocks; expects STDBY_RC
    pub fn calibrate(&mut self, blocks: CalibrationConfig) -> Result<(), Error<SPI::Error>> {
        self.execute_command(Calibrate { config: blocks })?;
        Ok(())
    }

    /// Mode the chip drops to after TxDone, RxDone or a timeout
    pub fn set_rx_tx_fallback_mode(&mut self, mode: FallbackMode) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetRxTxFallbackMode { mode })?;
        self.fallback = mode;
        Ok(())
    }

    /// Goes through standby when `next` cannot follow the current mode
    fn enter(&mut self, next: RadioMode) -> Result<(), Error<SPI::Error>> {
        if !self.mode.can_enter(next) {
            if self.mode != RadioMode::Unknown {
                warn!("{:?} -> {:?} is not allowed, entering standby first", self.mode, next);
            }
            self.set_standby()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RadioMode::*;
    use super::*;
    use crate::{
        error::ControllerError,
        lora::ChipVariant,
        mock::{self, opcodes},
    };

    #[test]
    fn rtc_steps_are_64_per_ms_and_fit_24_bits() {
        for ms in [0u32, 1, 1_000, 5_000, 100_000, 262_143] {
            let steps = rtc_steps(ms);
            assert_eq!(steps, ms * 64);
            assert!(steps < 1 << 24);
        }
        assert_eq!(rtc_steps(262_144), MAX_RTC_STEPS);
        assert_eq!(rtc_steps(u32::MAX), MAX_RTC_STEPS);
    }

    #[test]
    fn legal_transitions() {
        assert!(Sleep.can_enter(Standby));
        assert!(!Sleep.can_enter(Tx));
        assert!(!Sleep.can_enter(Rx));

        for next in [Fs, Tx, Rx, TxContinuous, Sleep] {
            assert!(Standby.can_enter(next), "Standby -> {next:?}");
        }

        assert!(Fs.can_enter(Tx));
        assert!(Fs.can_enter(Rx));
        assert!(Fs.can_enter(Sleep));
        assert!(!Fs.can_enter(TxContinuous));

        for busy in [Tx, Rx, TxContinuous] {
            assert!(busy.can_enter(Standby));
            for next in [Fs, Tx, Rx, TxContinuous, Sleep] {
                assert!(!busy.can_enter(next), "{busy:?} -> {next:?}");
            }
        }

        assert!(Unknown.can_enter(Standby));
        assert!(!Unknown.can_enter(Tx));
    }

    #[test]
    fn fallback_lands_in_standby_or_fs() {
        assert_eq!(RadioMode::after_fallback(FallbackMode::StdbyRc), Standby);
        assert_eq!(RadioMode::after_fallback(FallbackMode::StdbyXosc), Standby);
        assert_eq!(RadioMode::after_fallback(FallbackMode::Fs), Fs);
    }

    #[test]
    fn sleep_skips_busy_wait_and_wakes_on_next_frame() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_standby().unwrap();
        device.set_sleep().unwrap();

        assert!(device.is_sleeping());
        assert_eq!(device.mode(), Sleep);
        assert!(chip.borrow().sent(&[0x84, 0x04]));
        assert!(chip.borrow().asleep);
        assert!(chip.borrow().wake_pulses.is_empty());

        device.get_status().unwrap();

        let state = chip.borrow();
        // the pulse lands right before the first frame after SetSleep
        assert_eq!(state.wake_pulses, [2]);
        assert_eq!(state.opcodes()[2], opcodes::GET_STATUS);
        assert!(!state.asleep);
        drop(state);
        assert!(!device.is_sleeping());
        assert_eq!(device.mode(), Standby);

        device.get_status().unwrap();
        assert_eq!(chip.borrow().wake_pulses.len(), 1);
    }

    #[test]
    fn illegal_request_goes_through_standby() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_standby().unwrap();
        device.set_tx(0).unwrap();
        device.set_rx(RxMode::Single).unwrap();

        assert_eq!(
            chip.borrow().opcodes(),
            [
                opcodes::SET_STANDBY,
                opcodes::SET_TX,
                opcodes::SET_STANDBY,
                opcodes::SET_RX
            ]
        );
        assert!(chip.borrow().sent(&[0x83, 0x00, 0x00, 0x00]));
        assert!(chip.borrow().sent(&[0x82, 0x00, 0x00, 0x00]));
        assert_eq!(device.mode(), Rx);
    }

    #[test]
    fn fs_can_start_tx_directly() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_standby().unwrap();
        device.set_fs().unwrap();
        device.set_tx(1_000).unwrap();

        assert_eq!(
            chip.borrow().opcodes(),
            [opcodes::SET_STANDBY, opcodes::SET_FS, opcodes::SET_TX]
        );
        assert!(chip.borrow().sent(&[0x83, 0x00, 0xFA, 0x00]));
    }

    #[test]
    fn rx_modes_on_the_wire() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_rx(RxMode::Continuous).unwrap();
        device.set_rx(RxMode::Timed(1_000)).unwrap();

        let chip = chip.borrow();
        assert!(chip.sent(&[0x82, 0xFF, 0xFF, 0xFF]));
        assert!(chip.sent(&[0x82, 0x00, 0xFA, 0x00]));
    }

    #[test]
    fn continuous_rx_survives_timeout_irq() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_rx(RxMode::Continuous).unwrap();
        chip.borrow_mut().irq_status = 0x0002;
        device.handle_interrupt().unwrap();
        assert_eq!(device.mode(), Rx);

        device.set_rx(RxMode::Timed(10)).unwrap();
        chip.borrow_mut().irq_status = 0x0200;
        device.handle_interrupt().unwrap();
        assert_eq!(device.mode(), Standby);
    }

    #[test]
    fn fallback_mode_is_tracked() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_rx_tx_fallback_mode(FallbackMode::Fs).unwrap();
        device.set_standby().unwrap();
        device.set_tx(100).unwrap();

        chip.borrow_mut().irq_status = 0x0001;
        device.handle_interrupt().unwrap();

        assert!(chip.borrow().sent(&[0x93, 0x40]));
        assert_eq!(device.mode(), Fs);
    }

    #[test]
    fn continuous_tx_modes_select_high_power_path() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.set_tx_continuous_wave().unwrap();
        device.set_tx_infinite_preamble().unwrap();

        let chip = chip.borrow();
        assert_eq!(
            chip.opcodes(),
            [
                opcodes::SET_STANDBY,
                opcodes::SET_TX_CONTINUOUS_WAVE,
                opcodes::SET_STANDBY,
                opcodes::SET_TX_INFINITE_PREAMBLE
            ]
        );
        assert_eq!(
            chip.switch_log,
            [RfSwitchMode::TxHighPower, RfSwitchMode::TxHighPower]
        );
        drop(chip);
        assert_eq!(device.mode(), TxContinuous);
    }

    #[test]
    fn continuous_wave_needs_a_tx_path() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        chip.borrow_mut().switch_fails = true;
        device.set_standby().unwrap();

        assert_eq!(
            device.set_tx_continuous_wave(),
            Err(Error::from(ControllerError::HardwareInit))
        );
        assert_eq!(device.mode(), Standby);
    }

    #[test]
    fn housekeeping_commands() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.stop_timer_on_preamble(true).unwrap();
        device.stop_timer_on_preamble(false).unwrap();
        device.set_regulator_mode(RegulatorMode::DcDcLdo).unwrap();
        device.calibrate(CalibrationConfig::all()).unwrap();
        device.set_standby_xosc().unwrap();

        let chip = chip.borrow();
        assert!(chip.sent(&[0x9F, 0x01]));
        assert!(chip.sent(&[0x9F, 0x00]));
        assert!(chip.sent(&[0x96, 0x01]));
        assert!(chip.sent(&[0x89, 0x7F]));
        assert!(chip.sent(&[0x80, 0x01]));
    }
}
