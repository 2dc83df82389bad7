#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! Driver for the DS18x20 family of 1-Wire thermometers (DS18S20, DS18B20, DS1822).
//!
//! [`Ds18x20::read_temperature`] finds one sensor by address, runs a conversion and decodes the scratchpad.
//! The call is blocking: it sleeps for the whole conversion (one second by default) and holds
//! the bus for its entire duration. Callers sharing a bus between contexts must serialize calls themselves.
use core::fmt;
use embedded_hal::delay::DelayNs;
use mias_onewire::{Address, OneWire, OneWireError, OneWireSearch};

mod scratchpad;

pub use fixed::types::I12F4;
pub use scratchpad::{Configuration, Resolution, Scratchpad};

/// A temperature in 1/16 °C steps.
pub type Temperature = I12F4;

/// Reported in place of a temperature when a reading failed.
pub const SENTINEL_CELSIUS: f32 = 1024.0;

const DS18X20_START_CONV: u8 = 0x44;
const DS18X20_READ_SCRATCH: u8 = 0xbe;

/// Supported device families, by ROM family code.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Family {
    /// DS18S20 / DS1820: 9-bit register with COUNT REMAIN extension.
    Ds18s20 = 0x10,
    /// DS18B20: programmable resolution.
    Ds18b20 = 0x28,
    /// DS1822: decoded like the DS18B20.
    Ds1822 = 0x22,
}

impl TryFrom<u8> for Family {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Family::*;
        match value {
            0x10 => Ok(Ds18s20),
            0x28 => Ok(Ds18b20),
            0x22 => Ok(Ds1822),
            other => Err(other),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::Ds18s20 => "DS18S20",
            Family::Ds18b20 => "DS18B20",
            Family::Ds1822 => "DS1822",
        })
    }
}

/// Why a temperature could not be read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadError<E> {
    /// The search ended without finding the address, or nothing answered the reset.
    DeviceNotFound,
    /// The matched address fails its CRC.
    AddressCrcInvalid,
    /// The family code is not a DS18x20 thermometer.
    UnsupportedFamily(u8),
    /// The scratchpad fails its CRC.
    ScratchpadCrcInvalid,
    /// Any other bus failure.
    Bus(OneWireError<E>),
}

impl<E> From<OneWireError<E>> for ReadError<E> {
    fn from(value: OneWireError<E>) -> Self {
        match value {
            OneWireError::NoDevicePresent => Self::DeviceNotFound,
            other => Self::Bus(other),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound => f.write_str("device not found"),
            Self::AddressCrcInvalid => f.write_str("address CRC is not valid"),
            Self::UnsupportedFamily(code) => {
                write!(f, "family {code:#04x} is not a DS18x20 device")
            }
            Self::ScratchpadCrcInvalid => f.write_str("scratchpad CRC is not valid"),
            Self::Bus(e) => write!(f, "{e}"),
        }
    }
}

/// Result of one temperature read.
pub type Reading<E> = Result<Temperature, ReadError<E>>;

/// Celsius value of a reading, or [`SENTINEL_CELSIUS`] if it failed.
pub fn celsius_or_sentinel<E>(reading: &Reading<E>) -> f32 {
    match reading {
        Ok(t) => t.to_num(),
        Err(_) => SENTINEL_CELSIUS,
    }
}

/// Celsius to Fahrenheit.
pub fn fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

/// DS18x20 read settings.
#[derive(Debug, Clone, Copy)]
pub struct Ds18x20 {
    conversion_delay_ms: u32,
    verify_scratchpad: bool,
    not_found_backoff_ms: u32,
}

impl Default for Ds18x20 {
    fn default() -> Self {
        Self {
            conversion_delay_ms: 1000,
            verify_scratchpad: true,
            not_found_backoff_ms: 250,
        }
    }
}

impl Ds18x20 {
    /// Time to wait after Convert T. The default covers a 12-bit conversion with margin.
    pub fn with_conversion_delay_ms(mut self, ms: u32) -> Self {
        self.conversion_delay_ms = ms;
        self
    }

    /// Reject scratchpads whose CRC byte does not match (on by default).
    pub fn with_scratchpad_crc(mut self, verify: bool) -> Self {
        self.verify_scratchpad = verify;
        self
    }

    /// Pause after a search that did not find the device.
    pub fn with_not_found_backoff_ms(mut self, ms: u32) -> Self {
        self.not_found_backoff_ms = ms;
        self
    }

    /// Read the temperature of the sensor at `target`.
    ///
    /// Searches the bus for `target`, starts a conversion, waits for it and decodes the scratchpad.
    /// Every call starts a fresh search.
    pub fn read_temperature<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        target: &Address,
    ) -> Reading<O::BusError> {
        let address = self.find(bus, delay, target)?;
        if !address.is_valid() {
            log::warn!("CRC is not valid for {address}");
            return Err(ReadError::AddressCrcInvalid);
        }
        let family = Family::try_from(address.family()).map_err(|code| {
            log::warn!("{address} is not a DS18x20 family device");
            ReadError::UnsupportedFamily(code)
        })?;
        log::debug!("Chip = {family}");

        bus.address(Some(&address))?;
        bus.write_byte(DS18X20_START_CONV)?;
        delay.delay_ms(self.conversion_delay_ms);

        bus.address(Some(&address))?;
        bus.write_byte(DS18X20_READ_SCRATCH)?;
        let mut buf = [0; 9];
        for b in buf.iter_mut() {
            *b = bus.read_byte()?;
        }
        let scratchpad = Scratchpad::new(buf);
        log::trace!("{address} scratchpad {buf:02x?}");
        if self.verify_scratchpad && !scratchpad.is_valid() {
            log::warn!("scratchpad CRC is not valid for {address}");
            return Err(ReadError::ScratchpadCrcInvalid);
        }

        let temp = scratchpad.temperature(family);
        let celsius: f32 = temp.to_num();
        log::info!(
            "{address}: {celsius} Celsius, {} Fahrenheit",
            fahrenheit(celsius)
        );
        Ok(temp)
    }

    fn find<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        target: &Address,
    ) -> Result<Address, ReadError<O::BusError>> {
        let mut search = OneWireSearch::new(bus);
        while let Some(candidate) = search.next()? {
            if candidate == *target {
                return Ok(candidate);
            }
        }
        log::debug!("no more addresses, {target} not on the bus");
        search.reset();
        delay.delay_ms(self.not_found_backoff_ms);
        Err(ReadError::DeviceNotFound)
    }
}
