//! Blocking LoRa packet transmit and receive
//!
//! Both paths rewrite the per-packet parameters, arm DIO1 for the outcomes
//! they wait for, and then block on the event queue. While an operation is
//! armed the only SPI traffic is the interrupt service itself.

use embedded_hal::spi::SpiBus;
use log::debug;

use crate::{
    commands::{
        BufferBaseAddressConfig, DioIrqConfig, GetRxBufferStatus, IrqMask, RxMode,
        SetBufferBaseAddress, SetDioIrqParams,
    },
    controller::{RadioController, RfSwitchMode},
    error::Error,
    event::RadioEvent,
    lora::PaPath,
    Device,
};

/// Largest LoRa payload the radio buffer holds
pub const MAX_PAYLOAD_LEN: usize = 255;

impl<SPI, RC> Device<SPI, RC>
where
    SPI: SpiBus,
    RC: RadioController,
{
    /// Transmits `payload` on the high-power path and waits for the outcome
    ///
    /// `timeout_ms` is handed to the chip; zero disables it.
    pub fn lora_tx(&mut self, payload: &[u8], timeout_ms: u32) -> Result<(), Error<SPI::Error>> {
        self.lora_tx_with_path(payload, timeout_ms, PaPath::HighPower)
    }

    /// Transmits `payload` through the selected PA path
    ///
    /// Fails before any SPI traffic when the device is unconfigured, the
    /// payload does not fit, or the RF switch cannot select `path`.
    pub fn lora_tx_with_path(
        &mut self,
        payload: &[u8],
        timeout_ms: u32,
        path: PaPath,
    ) -> Result<(), Error<SPI::Error>> {
        let config = self.config.ok_or(Error::ConfigMissing)?;
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let switch = match path {
            PaPath::HighPower => RfSwitchMode::TxHighPower,
            PaPath::LowPower => RfSwitchMode::TxLowPower,
        };
        self.controller.set_rf_switch_mode(switch)?;

        self.clear_irq_status()?;
        self.set_standby()?;
        self.set_rf_frequency(config.frequency_hz)?;
        self.apply_tx_power_on(config.tx_power_dbm, path)?;
        self.set_buffer_base_address()?;
        self.write_buffer(0, payload)?;
        self.set_modulation_params(&config)?;
        self.set_packet_params(&config, payload.len() as u8)?;
        self.arm_dio1(IrqMask::TX_DONE | IrqMask::TIMEOUT | IrqMask::CRC_ERR)?;
        self.set_sync_word(config.sync_word)?;

        self.drain_events();
        self.set_tx(timeout_ms)?;
        debug!("tx armed, {} bytes", payload.len());

        match self.next_event_blocking()? {
            RadioEvent::TxDone(_) => Ok(()),
            RadioEvent::Timeout(_) => Err(Error::TxTimeout),
            other => Err(Error::UnexpectedEvent(other)),
        }
    }

    /// Receives one packet, waiting at most `timeout_ms`
    ///
    /// Returns `Ok(None)` when the timer elapses first. The payload borrows
    /// the driver's scratch buffer until the next call. A zero timeout waits
    /// for a single packet without a timer.
    pub fn lora_rx(&mut self, timeout_ms: u32) -> Result<Option<&[u8]>, Error<SPI::Error>> {
        let config = self.config.ok_or(Error::ConfigMissing)?;
        self.controller.set_rf_switch_mode(RfSwitchMode::Rx)?;

        self.clear_irq_status()?;
        self.set_standby()?;
        self.set_buffer_base_address()?;
        self.set_modulation_params(&config)?;
        self.set_packet_params(&config, MAX_PAYLOAD_LEN as u8)?;
        self.arm_dio1(IrqMask::RX_DONE | IrqMask::TIMEOUT | IrqMask::CRC_ERR)?;

        self.drain_events();
        self.set_rx(RxMode::Timed(timeout_ms))?;
        debug!("rx armed for {} ms", timeout_ms);

        match self.next_event_blocking()? {
            RadioEvent::Timeout(_) => Ok(None),
            RadioEvent::RxDone(_) => self.fetch_payload().map(Some),
            RadioEvent::CrcError(_) => Err(Error::RxCrcError),
            other => Err(Error::UnexpectedEvent(other)),
        }
    }

    /// Aborts a pending reception and drops whatever it queued
    pub fn cancel_rx(&mut self) -> Result<(), Error<SPI::Error>> {
        self.set_standby()?;
        self.drain_events();
        Ok(())
    }

    /// TX and RX both start at offset 0 of the data buffer
    pub(crate) fn set_buffer_base_address(&mut self) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetBufferBaseAddress {
            config: BufferBaseAddressConfig {
                tx_base_addr: 0,
                rx_base_addr: 0,
            },
        })?;
        Ok(())
    }

    fn arm_dio1(&mut self, mask: IrqMask) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetDioIrqParams {
            config: DioIrqConfig::dio1(mask),
        })?;
        Ok(())
    }

    fn apply_tx_power_on(&mut self, power_dbm: i8, path: PaPath) -> Result<(), Error<SPI::Error>> {
        match path {
            PaPath::HighPower => self.apply_tx_power(power_dbm),
            PaPath::LowPower => self.apply_low_power_tx(power_dbm),
        }
    }

    fn fetch_payload(&mut self) -> Result<&[u8], Error<SPI::Error>> {
        let location = self.execute_command(GetRxBufferStatus)?.buffer_status;
        let len = usize::from(location.payload_length);

        let mut scratch = self.scratch;
        self.read_buffer(location.buffer_pointer, &mut scratch[..len])?;
        self.scratch = scratch;

        debug!("received {} bytes", len);
        Ok(&self.scratch[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lora::{Bandwidth, ChipVariant, CodingRate, LoraConfig, SpreadingFactor},
        mock::{self, opcodes, Chip},
        RadioMode,
    };

    fn e2e_config() -> LoraConfig {
        LoraConfig::default()
            .with_modulation(Bandwidth::Bw500, SpreadingFactor::Sf9, CodingRate::Cr4_7)
            .with_preamble(12)
            .with_tx_power(20)
    }

    fn configured(variant: ChipVariant) -> (mock::MockDevice, mock::SharedChip) {
        let (mut device, chip) = mock::device(variant);
        device.configure_lora(e2e_config()).unwrap();
        chip.borrow_mut().frames.clear();
        (device, chip)
    }

    fn frames_after(chip: &Chip, opcode: u8) -> Vec<u8> {
        let ops = chip.opcodes();
        let start = ops.iter().position(|&op| op == opcode).unwrap();
        ops[start + 1..].to_vec()
    }

    #[test]
    fn transmit_hello() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        device.configure_lora(e2e_config()).unwrap();
        chip.borrow_mut().on_tx = Some(IrqMask::TX_DONE.bits());

        assert_eq!(device.lora_tx(b"HELLO", 5_000), Ok(()));

        let chip = chip.borrow();
        assert!(chip.sent(&[0x8A, 0x01]));
        assert!(chip.sent(&[0x86, 0x36, 0x41, 0x99, 0x99]));
        assert!(chip.sent(&[0x0E, 0x00, 0x48, 0x45, 0x4C, 0x4C, 0x4F]));
        assert!(chip.sent(&[0x8C, 0x00, 0x0C, 0x00, 0x05, 0x01, 0x00]));
        assert!(chip.sent(&[0x08, 0x02, 0x41, 0x02, 0x41, 0, 0, 0, 0]));
        assert!(chip.sent(&[0x83, 0x04, 0xE2, 0x00]));
        assert_eq!(chip.switch_log, [RfSwitchMode::TxHighPower]);
        drop(chip);
        assert_eq!(device.mode(), RadioMode::Standby);
    }

    #[test]
    fn transmit_sequence_order() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().on_tx = Some(IrqMask::TX_DONE.bits());
        device.lora_tx(b"x", 1_000).unwrap();

        assert_eq!(
            chip.borrow().opcodes(),
            [
                opcodes::CLEAR_IRQ_STATUS,
                opcodes::SET_STANDBY,
                opcodes::SET_RF_FREQUENCY,
                opcodes::SET_PA_CONFIG,
                opcodes::WRITE_REGISTER,
                opcodes::SET_TX_PARAMS,
                opcodes::SET_BUFFER_BASE_ADDRESS,
                opcodes::WRITE_BUFFER,
                opcodes::SET_MODULATION_PARAMS,
                opcodes::SET_PACKET_PARAMS,
                opcodes::SET_DIO_IRQ_PARAMS,
                opcodes::WRITE_REGISTER,
                opcodes::SET_TX,
                opcodes::GET_IRQ_STATUS,
                opcodes::CLEAR_IRQ_STATUS,
            ]
        );
    }

    #[test]
    fn transmit_timeout() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().on_tx = Some(IrqMask::TIMEOUT.bits());
        assert_eq!(device.lora_tx(b"late", 10), Err(Error::TxTimeout));
        assert_eq!(device.mode(), RadioMode::Standby);
    }

    #[test]
    fn transmit_interrupted_by_watchdog() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().watchdog_on_tx = true;
        assert_eq!(
            device.lora_tx(b"x", 0),
            Err(Error::UnexpectedEvent(RadioEvent::Watchdog(0)))
        );
    }

    #[test]
    fn stale_events_do_not_complete_a_transmit() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        device.events.push(RadioEvent::Timeout(0x0200)).unwrap();
        device.latch.raise_watchdog();
        chip.borrow_mut().on_tx = Some(IrqMask::TX_DONE.bits());

        assert_eq!(device.lora_tx(b"x", 1_000), Ok(()));
    }

    #[test]
    fn transmit_without_config() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        assert_eq!(device.lora_tx(b"x", 1_000), Err(Error::ConfigMissing));

        let chip = chip.borrow();
        assert!(chip.frames.is_empty());
        assert!(chip.switch_log.is_empty());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            device.lora_tx(&payload, 1_000),
            Err(Error::PayloadTooLarge(256))
        );
        assert!(chip.borrow().frames.is_empty());
    }

    #[test]
    fn low_power_path_unsupported() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().low_power_path = false;

        assert_eq!(
            device.lora_tx_with_path(b"x", 1_000, PaPath::LowPower),
            Err(Error::LowPowerTxUnsupported)
        );
        assert!(chip.borrow().frames.is_empty());
    }

    #[test]
    fn low_power_path_uses_low_power_preset() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().on_tx = Some(IrqMask::TX_DONE.bits());

        device
            .lora_tx_with_path(b"x", 1_000, PaPath::LowPower)
            .unwrap();

        let chip = chip.borrow();
        assert_eq!(chip.switch_log, [RfSwitchMode::TxLowPower]);
        assert!(chip.sent(&[0x95, 0x04, 0x00, 0x01, 0x01]));
        assert!(chip.sent(&[0x8E, 14, 0x04]));
    }

    #[test]
    fn receive_times_out() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().on_rx = Some((IrqMask::TIMEOUT.bits(), Vec::new()));

        assert_eq!(device.lora_rx(1_000), Ok(None));

        let chip = chip.borrow();
        assert!(chip.sent(&[0x82, 0x00, 0xFA, 0x00]));
        assert!(chip.sent(&[0x8C, 0x00, 0x0C, 0x00, 0xFF, 0x01, 0x00]));
        assert!(chip.sent(&[0x08, 0x02, 0x42, 0x02, 0x42, 0, 0, 0, 0]));
        assert_eq!(chip.switch_log, [RfSwitchMode::Rx]);
    }

    #[test]
    fn receive_returns_payload() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        {
            let mut chip = chip.borrow_mut();
            chip.rx_offset = 0x20;
            chip.on_rx = Some((IrqMask::RX_DONE.bits(), b"ping".to_vec()));
        }

        assert_eq!(device.lora_rx(1_000), Ok(Some(&b"ping"[..])));

        let chip = chip.borrow();
        assert_eq!(
            frames_after(&chip, opcodes::SET_RX),
            [
                opcodes::GET_IRQ_STATUS,
                opcodes::CLEAR_IRQ_STATUS,
                opcodes::GET_RX_BUFFER_STATUS,
                opcodes::READ_BUFFER,
            ]
        );
        assert!(chip.sent(&[0x1E, 0x20, 0x00]));
        assert_eq!(chip.frames.last().map(|f| f.read_len), Some(4));
    }

    #[test]
    fn receive_crc_error_wins_over_rx_done() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        let bits = (IrqMask::RX_DONE | IrqMask::CRC_ERR).bits();
        chip.borrow_mut().on_rx = Some((bits, b"junk".to_vec()));

        assert_eq!(device.lora_rx(1_000), Err(Error::RxCrcError));
        assert_eq!(device.poll_event(), None);
        assert!(!chip.borrow().opcodes().contains(&opcodes::READ_BUFFER));
    }

    #[test]
    fn no_control_traffic_while_rx_is_armed() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        chip.borrow_mut().on_rx = Some((IrqMask::TIMEOUT.bits(), Vec::new()));
        device.lora_rx(50).unwrap();

        let chip = chip.borrow();
        assert_eq!(
            frames_after(&chip, opcodes::SET_RX),
            [opcodes::GET_IRQ_STATUS, opcodes::CLEAR_IRQ_STATUS]
        );
    }

    #[test]
    fn receive_after_sleep_wakes_first() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        device.set_sleep().unwrap();
        chip.borrow_mut().frames.clear();
        chip.borrow_mut().on_rx = Some((IrqMask::TIMEOUT.bits(), Vec::new()));

        assert_eq!(device.lora_rx(1_000), Ok(None));

        let chip = chip.borrow();
        assert_eq!(chip.wake_pulses.len(), 1);
        assert_eq!(chip.opcodes()[0], opcodes::CLEAR_IRQ_STATUS);
        assert!(!device.is_sleeping());
    }

    #[test]
    fn receive_without_config() {
        let (mut device, chip) = mock::device(ChipVariant::Sx1262);
        assert_eq!(device.lora_rx(1_000), Err(Error::ConfigMissing));
        assert!(chip.borrow().frames.is_empty());
    }

    #[test]
    fn cancel_rx_returns_to_standby() {
        let (mut device, chip) = configured(ChipVariant::Sx1262);
        device.set_rx(RxMode::Continuous).unwrap();
        device.events.push(RadioEvent::RxDone(2)).unwrap();

        device.cancel_rx().unwrap();

        assert_eq!(device.mode(), RadioMode::Standby);
        assert_eq!(device.poll_event(), None);
        assert_eq!(chip.borrow().opcodes().last(), Some(&opcodes::SET_STANDBY));
    }
}
