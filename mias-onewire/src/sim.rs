//! A simulated multidrop 1-Wire bus for exercising drivers without hardware.
//!
//! Devices behave like DS18x20 sensors: they answer reset, Search ROM, Match ROM and Skip ROM,
//! count Convert T commands and return a fixed scratchpad on Read Scratchpad.
//! Reads are wired-AND, so addressing several devices and reading yields the AND of their data.

use crate::{
    Address, OneWire, OneWireError, OneWireResult, OneWireStatus,
    consts::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SEARCH_CMD, ONEWIRE_SKIP_ROM_CMD},
};
use core::convert::Infallible;
use std::collections::VecDeque;

const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xbe;

/// A device on the [`SimBus`].
#[derive(Debug, Clone)]
pub struct SimDevice {
    address: Address,
    scratchpad: [u8; 9],
    conversions: usize,
}

impl SimDevice {
    /// A device answering to `address` with the given scratchpad contents.
    pub fn new(address: Address, scratchpad: [u8; 9]) -> Self {
        Self {
            address,
            scratchpad,
            conversions: 0,
        }
    }

    /// The ROM address of the device.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Number of Convert T commands the device has received.
    pub fn conversions(&self) -> usize {
        self.conversions
    }

    fn rom_bit(&self, bit: u8) -> bool {
        (self.address.as_bytes()[(bit / 8) as usize] >> (bit % 8)) & 1 == 1
    }
}

/// Reset status of the [`SimBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimStatus {
    presence: bool,
}

impl OneWireStatus for SimStatus {
    fn presence(&self) -> bool {
        self.presence
    }

    fn shortcircuit(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStep {
    IdBit,
    ComplementBit,
    Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for a reset.
    Idle,
    RomCommand,
    Search { bit: u8, step: SearchStep },
    MatchRom { buf: [u8; 8], len: usize },
    Function,
    Reading,
}

/// Simulated 1-Wire bus.
#[derive(Debug)]
pub struct SimBus {
    devices: Vec<SimDevice>,
    active: Vec<bool>,
    phase: Phase,
    read_queue: VecDeque<u8>,
    resets: usize,
    shorted: bool,
    triplet: bool,
}

impl SimBus {
    /// A bus with the given devices attached.
    pub fn new(devices: impl IntoIterator<Item = SimDevice>) -> Self {
        let devices: Vec<SimDevice> = devices.into_iter().collect();
        Self {
            active: vec![false; devices.len()],
            devices,
            phase: Phase::Idle,
            read_queue: VecDeque::new(),
            resets: 0,
            shorted: false,
            triplet: false,
        }
    }

    /// Hold the line low, so every reset reports a short circuit.
    pub fn with_short(mut self, shorted: bool) -> Self {
        self.shorted = shorted;
        self
    }

    /// Emulate a master with hardware triplet support.
    pub fn with_triplet(mut self, triplet: bool) -> Self {
        self.triplet = triplet;
        self
    }

    /// The attached devices.
    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }

    /// The attached device with the given address.
    pub fn device(&self, address: &Address) -> Option<&SimDevice> {
        self.devices.iter().find(|d| &d.address == address)
    }

    /// Number of bus resets issued so far.
    pub fn resets(&self) -> usize {
        self.resets
    }

    fn selected(&self) -> impl Iterator<Item = &SimDevice> {
        self.devices
            .iter()
            .zip(self.active.iter())
            .filter_map(|(d, &a)| a.then_some(d))
    }

    fn function(&mut self, cmd: u8) {
        match cmd {
            CONVERT_T => {
                for (dev, &selected) in self.devices.iter_mut().zip(self.active.iter()) {
                    if selected {
                        dev.conversions += 1;
                    }
                }
                self.phase = Phase::Idle;
            }
            READ_SCRATCHPAD => {
                let mut data = [0xff; 9];
                for dev in self.selected() {
                    for (d, s) in data.iter_mut().zip(dev.scratchpad.iter()) {
                        *d &= s;
                    }
                }
                self.read_queue = data.into_iter().collect();
                self.phase = Phase::Reading;
            }
            _ => self.phase = Phase::Idle,
        }
    }
}

impl OneWire for SimBus {
    type Status = SimStatus;

    type BusError = Infallible;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        self.resets += 1;
        self.read_queue.clear();
        if self.shorted {
            self.phase = Phase::Idle;
            return Err(OneWireError::ShortCircuit);
        }
        if self.devices.is_empty() {
            self.phase = Phase::Idle;
            return Err(OneWireError::NoDevicePresent);
        }
        self.active.iter_mut().for_each(|a| *a = true);
        self.phase = Phase::RomCommand;
        Ok(SimStatus { presence: true })
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        match self.phase {
            Phase::RomCommand => {
                self.phase = match byte {
                    ONEWIRE_SEARCH_CMD => Phase::Search {
                        bit: 0,
                        step: SearchStep::IdBit,
                    },
                    ONEWIRE_MATCH_ROM_CMD => Phase::MatchRom {
                        buf: [0; 8],
                        len: 0,
                    },
                    ONEWIRE_SKIP_ROM_CMD => Phase::Function,
                    _ => Phase::Idle,
                }
            }
            Phase::MatchRom { mut buf, len } => {
                buf[len] = byte;
                if len + 1 == buf.len() {
                    for (a, dev) in self.active.iter_mut().zip(self.devices.iter()) {
                        *a = dev.address.as_bytes() == &buf;
                    }
                    self.phase = Phase::Function;
                } else {
                    self.phase = Phase::MatchRom { buf, len: len + 1 };
                }
            }
            Phase::Function => self.function(byte),
            Phase::Search { .. } => self.phase = Phase::Idle,
            Phase::Idle | Phase::Reading => {}
        }
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        Ok(match self.phase {
            Phase::Reading => self.read_queue.pop_front().unwrap_or(0xff),
            _ => 0xff,
        })
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        if let Phase::Search {
            bit: n,
            step: SearchStep::Direction,
        } = self.phase
        {
            for (a, dev) in self.active.iter_mut().zip(self.devices.iter()) {
                *a = *a && dev.rom_bit(n) == bit;
            }
            self.phase = if n == 63 {
                Phase::Function
            } else {
                Phase::Search {
                    bit: n + 1,
                    step: SearchStep::IdBit,
                }
            };
        }
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        let Phase::Search { bit, step } = self.phase else {
            // released line reads high
            return Ok(true);
        };
        let (value, next) = match step {
            SearchStep::IdBit => (
                self.selected().all(|d| d.rom_bit(bit)),
                SearchStep::ComplementBit,
            ),
            SearchStep::ComplementBit => (
                self.selected().all(|d| !d.rom_bit(bit)),
                SearchStep::Direction,
            ),
            SearchStep::Direction => (true, SearchStep::Direction),
        };
        self.phase = Phase::Search { bit, step: next };
        Ok(value)
    }

    fn read_triplet(&mut self, direction: bool) -> OneWireResult<(bool, bool, bool), Self::BusError> {
        if !self.triplet {
            return Err(OneWireError::Unimplemented);
        }
        let id_bit = self.read_bit()?;
        let complement_bit = self.read_bit()?;
        let taken = if id_bit != complement_bit {
            id_bit
        } else {
            direction || id_bit
        };
        self.write_bit(taken)?;
        Ok((id_bit, complement_bit, taken))
    }
}
