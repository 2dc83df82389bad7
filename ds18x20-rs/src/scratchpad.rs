use crate::{Family, Temperature};
use bitfield_struct::bitfield;
use mias_onewire::OneWireCrc;

/// DS18S20 COUNT PER °C value that marks the COUNT REMAIN register as usable.
const COUNT_PER_C_FULL: u8 = 0x10;

/// The 9-byte register block read with Read Scratchpad.
///
/// | Byte | Content |
/// |------|---------|
/// | 0-1 | Temperature, little-endian two's complement |
/// | 2-3 | T<sub>H</sub> / T<sub>L</sub> alarm registers |
/// | 4 | Configuration register (DS18B20, DS1822) |
/// | 5 | Reserved |
/// | 6 | COUNT REMAIN (DS18S20) |
/// | 7 | COUNT PER °C (DS18S20) |
/// | 8 | CRC-8 of bytes 0-7 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scratchpad([u8; 9]);

impl Scratchpad {
    /// Wrap raw scratchpad bytes.
    pub const fn new(bytes: [u8; 9]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 9] {
        &self.0
    }

    /// The temperature register as read, before any family-specific scaling.
    pub const fn raw(&self) -> i16 {
        i16::from_le_bytes([self.0[0], self.0[1]])
    }

    /// The configuration register.
    pub const fn configuration(&self) -> Configuration {
        Configuration::from_bits(self.0[4])
    }

    /// COUNT REMAIN.
    pub const fn count_remain(&self) -> u8 {
        self.0[6]
    }

    /// COUNT PER °C.
    pub const fn count_per_c(&self) -> u8 {
        self.0[7]
    }

    /// `true` if byte 8 is the CRC of bytes 0-7.
    pub fn is_valid(&self) -> bool {
        OneWireCrc::validate(&self.0)
    }

    /// Temperature in 1/16 °C counts.
    ///
    /// DS18S20 registers count 1/2 °C; they are scaled by 8 and, when COUNT PER °C reads 16, the low
    /// nibble is replaced using COUNT REMAIN for the full 12-bit result. DS18B20/DS1822 registers already
    /// count 1/16 °C, but the bits below the configured resolution are undefined and are cleared.
    pub fn raw_count(&self, family: Family) -> i16 {
        let raw = self.raw();
        match family {
            Family::Ds18s20 => {
                let raw = raw << 3;
                // Register contents are untrusted, wrap like the 16-bit hardware arithmetic
                if self.count_per_c() == COUNT_PER_C_FULL {
                    (raw & !0x0f)
                        .wrapping_add(12)
                        .wrapping_sub(self.count_remain() as i16)
                } else {
                    raw
                }
            }
            Family::Ds18b20 | Family::Ds1822 => raw & self.configuration().resolution().mask(),
        }
    }

    /// Decoded temperature.
    pub fn temperature(&self, family: Family) -> Temperature {
        Temperature::from_bits(self.raw_count(family))
    }
}

/// DS18B20/DS1822 configuration register (scratchpad byte 4).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Configuration {
    #[bits(5)]
    __reserved: u8,
    /// Conversion resolution (R1:R0).
    #[bits(2)]
    pub resolution: Resolution,
    __zero: bool,
}

/// Conversion resolution of a DS18B20/DS1822.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 0.5 °C steps.
    Resolution9bit = 0,
    /// 0.25 °C steps.
    Resolution10bit = 1,
    /// 0.125 °C steps.
    Resolution11bit = 2,
    /// 0.0625 °C steps, power-on default.
    #[default]
    Resolution12bit = 3,
}

impl Resolution {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    const fn from_bits(value: u8) -> Self {
        use Resolution::*;
        match value & 0b11 {
            0 => Resolution9bit,
            1 => Resolution10bit,
            2 => Resolution11bit,
            _ => Resolution12bit,
        }
    }

    /// Mask clearing the undefined low bits of the temperature register.
    pub const fn mask(&self) -> i16 {
        use Resolution::*;
        match self {
            Resolution9bit => !0b111,
            Resolution10bit => !0b11,
            Resolution11bit => !0b1,
            Resolution12bit => !0,
        }
    }

    /// Maximum conversion time in microseconds.
    pub const fn conversion_time_us(&self) -> u32 {
        use Resolution::*;
        match self {
            Resolution9bit => 93750,
            Resolution10bit => 187500,
            Resolution11bit => 375000,
            Resolution12bit => 750000,
        }
    }
}
