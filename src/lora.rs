//! LoRa modem configuration
//!
//! [`LoraConfig`] is validated and applied by
//! [`Device::configure_lora`](crate::Device::configure_lora). Modulation and
//! packet parameters are written again on every TX and RX, so a stored
//! configuration always describes what the next operation will use.

use core::ops::RangeInclusive;

use embedded_hal::spi::SpiBus;
use log::{debug, warn};

use crate::{
    commands::{
        CalibrateImage, DeviceSelect, DioIrqConfig, ImageCalibConfig, LoraModulationParams,
        LoraPacketParams, PaConfig, PacketType, RampTime, RfFrequencyConfig, SetDioIrqParams,
        SetModulationParams, SetPaConfig, SetPacketParams, SetPacketType, SetRfFrequency,
        SetTxParams, TxParams,
    },
    controller::RadioController,
    error::{ConfigError, Error},
    registers::{LoraSyncWord, OcpConfiguration, SYNC_WORD_PRIVATE, SYNC_WORD_PUBLIC},
    Device,
};

/// Shortest preamble the modem can lock on
pub const MIN_PREAMBLE_SYMBOLS: u16 = 6;

/// LoRa spreading factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpreadingFactor {
    /// SF5
    Sf5 = 0x05,
    /// SF6
    Sf6 = 0x06,
    /// SF7
    Sf7 = 0x07,
    /// SF8
    Sf8 = 0x08,
    /// SF9
    Sf9 = 0x09,
    /// SF10
    Sf10 = 0x0A,
    /// SF11
    Sf11 = 0x0B,
    /// SF12
    Sf12 = 0x0C,
}

/// LoRa bandwidth, discriminants are the chip codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    /// 7.81 kHz
    Bw7_8 = 0x00,
    /// 10.42 kHz
    Bw10_4 = 0x08,
    /// 15.63 kHz
    Bw15_6 = 0x01,
    /// 20.83 kHz
    Bw20_8 = 0x09,
    /// 31.25 kHz
    Bw31_25 = 0x02,
    /// 41.67 kHz
    Bw41_7 = 0x0A,
    /// 62.5 kHz
    Bw62_5 = 0x03,
    /// 125 kHz
    Bw125 = 0x04,
    /// 250 kHz
    Bw250 = 0x05,
    /// 500 kHz
    Bw500 = 0x06,
}

impl Bandwidth {
    /// Bandwidth in Hz, rounded down
    pub fn hz(self) -> u32 {
        match self {
            Self::Bw7_8 => 7_810,
            Self::Bw10_4 => 10_420,
            Self::Bw15_6 => 15_630,
            Self::Bw20_8 => 20_830,
            Self::Bw31_25 => 31_250,
            Self::Bw41_7 => 41_670,
            Self::Bw62_5 => 62_500,
            Self::Bw125 => 125_000,
            Self::Bw250 => 250_000,
            Self::Bw500 => 500_000,
        }
    }
}

/// LoRa forward error correction rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    /// 4/5
    Cr4_5 = 0x01,
    /// 4/6
    Cr4_6 = 0x02,
    /// 4/7
    Cr4_7 = 0x03,
    /// 4/8
    Cr4_8 = 0x04,
}

/// LoRa header mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderType {
    /// Length, coding rate and CRC presence sent in the header
    Explicit = 0x00,
    /// No header; both ends must agree on the packet format
    Implicit = 0x01,
}

/// IQ polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IqPolarity {
    /// Standard IQ
    Standard = 0x00,
    /// Inverted IQ
    Inverted = 0x01,
}

/// Transmit PA path requested from the RF switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PaPath {
    /// High-power PA output
    HighPower,
    /// Low-power PA output
    LowPower,
}

/// SX126x family member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    /// Low-power PA only, up to +15 dBm
    Sx1261,
    /// High-power PA, up to +22 dBm
    Sx1262,
    /// High-power PA, 410-810 MHz
    Sx1268,
}

impl ChipVariant {
    /// Carrier frequencies the variant can tune to
    pub fn frequency_range(self) -> RangeInclusive<u32> {
        match self {
            Self::Sx1261 | Self::Sx1262 => 150_000_000..=960_000_000,
            Self::Sx1268 => 410_000_000..=810_000_000,
        }
    }

    /// TX power accepted by SetTxParams, in dBm
    pub fn power_range(self) -> RangeInclusive<i8> {
        match self {
            Self::Sx1261 => -3..=14,
            Self::Sx1262 | Self::Sx1268 => -3..=22,
        }
    }

    /// Clamps `power_dbm` into [`power_range`](Self::power_range)
    pub fn clip_power(self, power_dbm: i8) -> i8 {
        let range = self.power_range();
        power_dbm.clamp(*range.start(), *range.end())
    }

    /// PA preset for the requested power
    pub fn pa_config(self, power_dbm: i8) -> PaConfig {
        match self {
            Self::Sx1261 => PaConfig {
                duty_cycle: if power_dbm == 15 { 0x06 } else { 0x04 },
                hp_max: 0x00,
                device_sel: DeviceSelect::Sx1261,
                pa_lut: 0x01,
            },
            Self::Sx1262 | Self::Sx1268 => PaConfig {
                duty_cycle: 0x04,
                hp_max: 0x07,
                device_sel: DeviceSelect::Sx1262,
                pa_lut: 0x01,
            },
        }
    }

    /// Over-current limit programmed after the PA preset, in mA
    pub fn current_limit_ma(self) -> u8 {
        match self {
            Self::Sx1261 => 80,
            Self::Sx1262 | Self::Sx1268 => 140,
        }
    }
}

/// Whether LDR optimization is required for this SF/BW pair
pub fn requires_low_data_rate_optimize(sf: SpreadingFactor, bw: Bandwidth) -> bool {
    sf >= SpreadingFactor::Sf11 && bw.hz() <= Bandwidth::Bw125.hz()
}

/// LoRa modem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoraConfig {
    /// Carrier frequency in Hz
    pub frequency_hz: u32,
    /// Bandwidth
    pub bandwidth: Bandwidth,
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Coding rate
    pub coding_rate: CodingRate,
    /// Low data rate optimization, forced on where required
    pub low_data_rate_optimize: bool,
    /// Preamble length in symbols
    pub preamble_symbols: u16,
    /// Header mode
    pub header_type: HeaderType,
    /// Payload CRC
    pub crc_enable: bool,
    /// IQ polarity
    pub iq_polarity: IqPolarity,
    /// Network sync word
    pub sync_word: u16,
    /// Requested TX power in dBm, clipped per chip variant when applied
    pub tx_power_dbm: i8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 868_100_000,
            bandwidth: Bandwidth::Bw125,
            spreading_factor: SpreadingFactor::Sf9,
            coding_rate: CodingRate::Cr4_7,
            low_data_rate_optimize: false,
            preamble_symbols: 12,
            header_type: HeaderType::Explicit,
            crc_enable: true,
            iq_polarity: IqPolarity::Standard,
            sync_word: SYNC_WORD_PRIVATE,
            tx_power_dbm: 20,
        }
    }
}

impl LoraConfig {
    /// Sets the carrier frequency
    pub fn with_frequency(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    /// Sets bandwidth, spreading factor and coding rate
    pub fn with_modulation(
        mut self,
        bandwidth: Bandwidth,
        spreading_factor: SpreadingFactor,
        coding_rate: CodingRate,
    ) -> Self {
        self.bandwidth = bandwidth;
        self.spreading_factor = spreading_factor;
        self.coding_rate = coding_rate;
        self
    }

    /// Sets the preamble length
    pub fn with_preamble(mut self, symbols: u16) -> Self {
        self.preamble_symbols = symbols;
        self
    }

    /// Selects the public or private network sync word
    pub fn with_public_network(mut self, public: bool) -> Self {
        self.sync_word = if public {
            SYNC_WORD_PUBLIC
        } else {
            SYNC_WORD_PRIVATE
        };
        self
    }

    /// Sets the requested TX power
    pub fn with_tx_power(mut self, dbm: i8) -> Self {
        self.tx_power_dbm = dbm;
        self
    }

    /// Copy with LDR optimization forced on where the SF/BW pair requires it
    pub fn normalized(mut self) -> Self {
        if requires_low_data_rate_optimize(self.spreading_factor, self.bandwidth) {
            self.low_data_rate_optimize = true;
        }
        self
    }

    /// Checks the parts of the configuration the chip cannot repair itself
    pub fn validate(&self, variant: ChipVariant) -> Result<(), ConfigError> {
        if !variant.frequency_range().contains(&self.frequency_hz) {
            return Err(ConfigError::FrequencyOutOfRange(self.frequency_hz));
        }
        if self.preamble_symbols < MIN_PREAMBLE_SYMBOLS {
            return Err(ConfigError::PreambleTooShort(self.preamble_symbols));
        }
        Ok(())
    }

    pub(crate) fn modulation_params(&self) -> LoraModulationParams {
        LoraModulationParams {
            spreading_factor: self.spreading_factor,
            bandwidth: self.bandwidth,
            coding_rate: self.coding_rate,
            low_data_rate_optimize: self.low_data_rate_optimize,
        }
    }

    pub(crate) fn packet_params(&self, payload_length: u8) -> LoraPacketParams {
        LoraPacketParams {
            preamble_symbols: self.preamble_symbols,
            header_type: self.header_type,
            payload_length,
            crc_enable: self.crc_enable,
            iq_polarity: self.iq_polarity,
        }
    }
}

impl<SPI, RC> Device<SPI, RC>
where
    SPI: SpiBus,
    RC: RadioController,
{
    /// Applies and stores a LoRa configuration
    ///
    /// The configuration is normalized first, so SF11/SF12 at 125 kHz or
    /// below always runs with LDR optimization. Leaves the chip in STDBY_RC
    /// with every IRQ disabled.
    pub fn configure_lora(&mut self, config: LoraConfig) -> Result<(), Error<SPI::Error>> {
        let config = config.normalized();
        config.validate(self.variant)?;
        debug!(
            "configuring LoRa: {} Hz, {:?}, {:?}, {:?}",
            config.frequency_hz, config.spreading_factor, config.bandwidth, config.coding_rate
        );

        self.set_standby()?;
        let errors = self.device_errors()?;
        if !errors.is_empty() {
            warn!("clearing latched device errors: {:?}", errors);
        }
        self.clear_device_errors()?;
        self.clear_irq_status()?;
        self.execute_command(SetDioIrqParams {
            config: DioIrqConfig::disabled(),
        })?;

        self.set_packet_type()?;
        self.set_rf_frequency(config.frequency_hz)?;
        self.set_modulation_params(&config)?;
        self.apply_tx_power(config.tx_power_dbm)?;
        self.set_sync_word(config.sync_word)?;
        self.set_buffer_base_address()?;

        self.config = Some(config);
        Ok(())
    }

    /// Reads the LoRa sync word register
    pub fn sync_word(&mut self) -> Result<u16, Error<SPI::Error>> {
        Ok(self.read_register::<LoraSyncWord>()?.value)
    }

    /// Writes the LoRa sync word register
    ///
    /// The stored configuration is left alone; the next TX writes its own
    /// sync word again.
    pub fn set_sync_word(&mut self, sync_word: u16) -> Result<(), Error<SPI::Error>> {
        self.write_register(LoraSyncWord { value: sync_word })
    }

    /// Writes the public (`0x3444`) or private (`0x1424`) sync word
    pub fn set_public_network(&mut self, public: bool) -> Result<(), Error<SPI::Error>> {
        self.write_register(LoraSyncWord::network(public))
    }

    /// Programs the PA over-current limit, capped at 140 mA
    pub fn set_current_limit(&mut self, milliamps: u8) -> Result<(), Error<SPI::Error>> {
        self.write_register(OcpConfiguration::from_milliamps(milliamps))
    }

    /// Runs image calibration for the band containing `frequency_hz`
    pub fn calibrate_image(&mut self, frequency_hz: u32) -> Result<(), Error<SPI::Error>> {
        let config = ImageCalibConfig::for_frequency(frequency_hz)
            .ok_or(ConfigError::FrequencyOutOfRange(frequency_hz))?;
        self.execute_command(CalibrateImage { config })?;
        Ok(())
    }

    pub(crate) fn set_packet_type(&mut self) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetPacketType {
            packet_type: PacketType::LoRa,
        })?;
        Ok(())
    }

    pub(crate) fn set_rf_frequency(&mut self, frequency_hz: u32) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetRfFrequency {
            config: RfFrequencyConfig {
                frequency: frequency_hz,
            },
        })?;
        Ok(())
    }

    pub(crate) fn set_modulation_params(
        &mut self,
        config: &LoraConfig,
    ) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetModulationParams {
            params: config.modulation_params(),
        })?;
        Ok(())
    }

    pub(crate) fn set_packet_params(
        &mut self,
        config: &LoraConfig,
        payload_length: u8,
    ) -> Result<(), Error<SPI::Error>> {
        self.execute_command(SetPacketParams {
            params: config.packet_params(payload_length),
        })?;
        Ok(())
    }

    pub(crate) fn apply_tx_power(&mut self, power_dbm: i8) -> Result<(), Error<SPI::Error>> {
        self.apply_pa(self.variant, power_dbm)
    }

    /// Low-power PA preset and limits, whatever the chip variant
    pub(crate) fn apply_low_power_tx(&mut self, power_dbm: i8) -> Result<(), Error<SPI::Error>> {
        self.apply_pa(ChipVariant::Sx1261, power_dbm)
    }

    /// PA preset, then OCP (SetPaConfig resets it), then power and ramp
    fn apply_pa(&mut self, variant: ChipVariant, power_dbm: i8) -> Result<(), Error<SPI::Error>> {
        let power = variant.clip_power(power_dbm);
        if power != power_dbm {
            debug!("clipping TX power {} dBm to {} dBm", power_dbm, power);
        }

        self.execute_command(SetPaConfig {
            config: variant.pa_config(power_dbm),
        })?;
        self.set_current_limit(variant.current_limit_ma())?;
        self.execute_command(SetTxParams {
            params: TxParams {
                power,
                ramp_time: RampTime::Micros200,
            },
        })?;
        Ok(())
    }
}
