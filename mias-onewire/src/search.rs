use crate::{
    Address, OneWire, OneWireError, OneWireResult, OneWireStatus, consts::ONEWIRE_SEARCH_CMD,
};

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It maintains the state of the search (the search cursor) between calls to [next](OneWireSearch::next).
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    last_device: bool,
    last_discrepancy: u8,
    rom: [u8; 8],
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] instance positioned at the start of the ROM space.
    pub fn new(onewire: &'a mut T) -> Self {
        Self {
            onewire,
            last_device: false,
            last_discrepancy: 0,
            rom: [0; 8],
        }
    }

    /// Resets the search cursor, so the next call to [next](OneWireSearch::next) starts a fresh scan.
    pub fn reset(&mut self) {
        self.last_device = false;
        self.last_discrepancy = 0;
        self.rom = [0; 8];
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Finds the next device on the 1-Wire bus.
    ///
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    /// Devices are returned in ascending order of their ROM read LSB first. Once every device has been
    /// returned, the method returns `None` until the cursor is [reset](OneWireSearch::reset).
    ///
    /// The CRC of a returned address is not checked here; callers must check
    /// [`Address::is_valid`] before selecting the device.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> OneWireResult<Option<Address>, T::BusError> {
        if self.last_device {
            return Ok(None);
        }
        let status = self.onewire.reset()?;
        if status.shortcircuit() {
            return Err(OneWireError::ShortCircuit);
        }
        if !status.presence() {
            return Err(OneWireError::NoDevicePresent);
        }
        let mut id_bit_num: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut idx: usize = 0;
        let mut rom_mask: u8 = 1;
        self.onewire.write_byte(ONEWIRE_SEARCH_CMD)?;
        let complete = loop {
            // Below the last discrepancy repeat the previous path, at it take the 1 branch
            let dir = if id_bit_num < self.last_discrepancy {
                self.rom[idx] & rom_mask > 0
            } else {
                id_bit_num == self.last_discrepancy
            };
            // Use the triplet if the master has one, otherwise read two bits and write the direction ourselves
            let (id_bit, complement_bit, write) = match self.onewire.read_triplet(dir) {
                Ok(triplet) => (triplet.0, triplet.1, false),
                Err(OneWireError::Unimplemented) => {
                    let id_bit = self.onewire.read_bit()?;
                    let complement_bit = self.onewire.read_bit()?;
                    (id_bit, complement_bit, true)
                }
                Err(e) => return Err(e),
            };
            if id_bit && complement_bit {
                // nobody answered this bit
                break false;
            }
            let set = if id_bit != complement_bit {
                id_bit
            } else {
                // discrepancy: both 0 and 1 present
                if !dir {
                    last_zero = id_bit_num;
                }
                dir
            };
            if set {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }

            if write {
                self.onewire.write_bit(set)?;
            }

            id_bit_num += 1;
            rom_mask <<= 1;

            if rom_mask == 0 {
                idx += 1;
                rom_mask = 1;
            }
            if id_bit_num > 64 {
                self.last_discrepancy = last_zero;
                self.last_device = self.last_discrepancy == 0;
                break true;
            }
        };

        if !complete {
            log::trace!("search pass ended without a device, cursor reset");
            self.reset();
            return Ok(None);
        }
        let address = Address::new(self.rom);
        log::trace!("search found {address}, last discrepancy {}", self.last_discrepancy);
        Ok(Some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimBus, SimDevice};
    use rand::Rng;

    fn random_address<R: Rng>(rng: &mut R, family: u8) -> Address {
        Address::with_serial(family, rng.random())
    }

    #[test]
    fn finds_every_device_once() {
        let mut rng = rand::rng();
        let mut expected: Vec<Address> = (0..8).map(|_| random_address(&mut rng, 0x28)).collect();
        expected.push(random_address(&mut rng, 0x10));
        expected.push(random_address(&mut rng, 0x22));
        let mut bus = SimBus::new(expected.iter().map(|&a| SimDevice::new(a, [0; 9])));

        let mut search = OneWireSearch::new(&mut bus);
        let mut found = Vec::new();
        while let Some(addr) = search.next().unwrap() {
            found.push(addr);
            assert!(found.len() <= expected.len(), "search did not terminate");
        }
        // ascending order of the ROM read LSB first
        let mut sorted = expected.clone();
        sorted.sort_by_key(|a| u64::from(*a).reverse_bits());
        assert_eq!(found, sorted);
    }

    #[test]
    fn single_device() {
        let addr = Address::new([0x28, 0xaa, 0x9a, 0x80, 0x13, 0x13, 0x02, 0xf5]);
        let mut bus = SimBus::new([SimDevice::new(addr, [0; 9])]);
        let mut search = OneWireSearch::new(&mut bus);
        assert_eq!(search.next().unwrap(), Some(addr));
        assert_eq!(search.next().unwrap(), None);
    }

    #[test]
    fn triplet_master_finds_the_same_devices() {
        let mut rng = rand::rng();
        let addresses: Vec<Address> = (0..5).map(|_| random_address(&mut rng, 0x28)).collect();
        let devices = || addresses.iter().map(|&a| SimDevice::new(a, [0; 9]));

        let mut plain = SimBus::new(devices());
        let mut triplet = SimBus::new(devices()).with_triplet(true);
        let mut a = OneWireSearch::new(&mut plain);
        let mut b = OneWireSearch::new(&mut triplet);
        loop {
            let (x, y) = (a.next().unwrap(), b.next().unwrap());
            assert_eq!(x, y);
            if x.is_none() {
                break;
            }
        }
    }

    #[test]
    fn reset_restarts_the_scan() {
        let a = Address::with_serial(0x28, [1, 2, 3, 4, 5, 6]);
        let b = Address::with_serial(0x28, [6, 5, 4, 3, 2, 1]);
        let mut bus = SimBus::new([SimDevice::new(a, [0; 9]), SimDevice::new(b, [0; 9])]);
        let mut search = OneWireSearch::new(&mut bus);
        let first = search.next().unwrap();
        search.reset();
        assert_eq!(search.next().unwrap(), first);
    }

    #[test]
    fn empty_bus_reports_no_presence() {
        let mut bus = SimBus::new([]);
        let mut search = OneWireSearch::new(&mut bus);
        assert_eq!(search.next(), Err(OneWireError::NoDevicePresent));
    }

    #[test]
    fn corrupted_address_is_returned_unchecked() {
        let mut bytes = *Address::with_serial(0x28, [9, 9, 9, 9, 9, 9]).as_bytes();
        bytes[7] ^= 0xff;
        let corrupt = Address::new(bytes);
        let mut bus = SimBus::new([SimDevice::new(corrupt, [0; 9])]);
        let mut search = OneWireSearch::new(&mut bus);
        let found = search.next().unwrap().unwrap();
        assert_eq!(found, corrupt);
        assert!(!found.is_valid());
    }
}
