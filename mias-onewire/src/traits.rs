use crate::{
    Address, OneWireError, OneWireResult,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD},
};

/// Trait for 1-Wire communication.
/// This trait defines the basic operations required for 1-Wire communication, such as resetting the bus,
/// writing and reading bytes, and writing and reading bits.
pub trait OneWire {
    /// The status type returned by the reset operation.
    /// This type must implement the [OneWireStatus] trait.
    type Status: OneWireStatus;
    /// The error type returned by the underlying hardware.
    type BusError;

    /// Resets the 1-Wire bus and returns the status of the bus.
    ///
    /// # Errors
    /// Returns [`OneWireError::NoDevicePresent`] if no device answered the reset with a presence pulse,
    /// and [`OneWireError::ShortCircuit`] if the line could not be released.
    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError>;

    /// Writes a byte to the 1-Wire bus, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError>;

    /// Reads a byte from the 1-Wire bus, least significant bit first.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads a single bit from the 1-Wire bus.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// # Note: Not intended for public API use.
    /// ## This method is internally used by the [search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    ///
    /// Generates two read time slots and one write time slot. The write slot carries the bit read
    /// in the first slot if the two read slots differ, and `direction` if both read slots are 0.
    ///
    /// # Returns
    /// A tuple of the id bit, the complement bit and the direction actually taken.
    ///
    /// Bus masters without hardware support keep the default implementation, and the search
    /// falls back to [`OneWire::read_bit`] and [`OneWire::write_bit`].
    fn read_triplet(&mut self, _direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        Err(OneWireError::Unimplemented)
    }

    /// Addresses devices on the 1-Wire bus.
    ///
    /// Resets the bus, then issues a Match ROM followed by the 8 address bytes, or a Skip ROM if `rom` is [`None`].
    /// A function command (convert, read scratchpad, ...) must follow.
    ///
    /// Note: A read after addressing with [`None`] on a bus with multiple devices returns garbage.
    fn address(&mut self, rom: Option<&Address>) -> OneWireResult<(), Self::BusError> {
        self.reset()?;
        match rom {
            Some(rom) => {
                self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
                for &b in rom.as_bytes() {
                    self.write_byte(b)?;
                }
            }
            None => self.write_byte(ONEWIRE_SKIP_ROM_CMD)?,
        }
        Ok(())
    }
}

/// Status of the bus after a reset.
pub trait OneWireStatus {
    /// A device answered the reset with a presence pulse.
    fn presence(&self) -> bool;
    /// The line was found held low.
    fn shortcircuit(&self) -> bool;
    /// Logic level of the line, if the bus master can sample it.
    fn logic_level(&self) -> Option<bool> {
        None
    }
}
