use crate::OneWireCrc;
use core::{fmt, str::FromStr};

/// A 64-bit 1-Wire ROM address.
///
/// | Byte | Description |
/// |------|-------------|
/// | 0 | Family code (e.g., 0x28 for DS18B20) |
/// | 1-6 | Serial number, least significant byte first |
/// | 7 | CRC-8 of bytes 0-6 |
///
/// Bytes are stored in bus order, which is the order they are shifted out by a search
/// and shifted in by a Match ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 8]);

impl Address {
    /// Creates an address from its bytes in bus order.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Builds a well-formed address from a family code and serial, computing the CRC byte.
    pub fn with_serial(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [family, 0, 0, 0, 0, 0, 0, 0];
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = OneWireCrc::compute(&bytes[..7]);
        Self(bytes)
    }

    /// The address bytes in bus order.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Family code (first byte).
    pub const fn family(&self) -> u8 {
        self.0[0]
    }

    /// The 48-bit serial number.
    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0; 6];
        serial.copy_from_slice(&self.0[1..7]);
        serial
    }

    /// The CRC byte carried by the address.
    pub const fn crc(&self) -> u8 {
        self.0[7]
    }

    /// `true` if the CRC byte matches the CRC-8 of the first seven bytes.
    ///
    /// An address failing this check is a corrupted read and must not be used to select a device.
    pub fn is_valid(&self) -> bool {
        OneWireCrc::compute(&self.0[..7]) == self.0[7]
    }
}

impl From<u64> for Address {
    /// Little-endian: the family code is the least significant byte.
    fn from(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
}

impl From<Address> for u64 {
    fn from(value: Address) -> Self {
        u64::from_le_bytes(value.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Error parsing an [`Address`] from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressParseError {
    /// Not exactly 16 hex digits after removing separators.
    Length,
    /// A character is not a hex digit.
    Digit,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => f.write_str("a 1-Wire address is 16 hex digits"),
            Self::Digit => f.write_str("invalid hex digit in 1-Wire address"),
        }
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Parses 16 hex digits in bus order (family code first). Spaces, `:` and `-` between bytes are ignored,
    /// so `28ffd9dc93160543` and `28 ff d9 dc 93 16 05 43` are the same address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digits = [0u8; 16];
        let mut n = 0;
        for c in s.bytes().filter(|c| !matches!(c, b' ' | b':' | b'-')) {
            if n == digits.len() {
                return Err(AddressParseError::Length);
            }
            digits[n] = c;
            n += 1;
        }
        if n != digits.len() {
            return Err(AddressParseError::Length);
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| match e {
            hex::FromHexError::InvalidHexCharacter { .. } => AddressParseError::Digit,
            _ => AddressParseError::Length,
        })?;
        Ok(Self(bytes))
    }
}
