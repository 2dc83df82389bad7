#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

/*! # gpio-onewire
 *
 * A bit-banged 1-Wire bus master.
 *
 * The data line is a single open-drain GPIO with an external pull-up:
 * driving the pin low pulls the bus low, setting it high releases the bus
 * so the pull-up (or a responding device) determines the level read back.
 * All slot timing comes from a blocking [`DelayNs`](embedded_hal::delay::DelayNs)
 * timer, so the caller must not be preempted for longer than a few
 * microseconds inside a slot.
 */

pub use mias_onewire::{OneWire, OneWireError, OneWireResult};
mod onewire;
mod registers;

pub use registers::{LineStatus, Timing};

/// A bit-banged 1-Wire master.
///
/// Takes ownership of an open-drain pin (implementing both [`InputPin`](embedded_hal::digital::InputPin)
/// and [`OutputPin`](embedded_hal::digital::OutputPin)) and a timer object implementing the
/// [`DelayNs`](embedded_hal::delay::DelayNs) trait.
pub struct GpioOneWire<P, D> {
    pub(crate) pin: P,
    pub(crate) delay: D,
    pub(crate) timing: Timing,
    pub(crate) status: LineStatus,
}

impl<P, D> GpioOneWire<P, D> {
    /// Creates a new master on the given pin with standard-speed timing.
    pub fn new(pin: P, delay: D) -> Self {
        GpioOneWire {
            pin,
            delay,
            timing: Timing::default(),
            status: LineStatus::new(),
        }
    }

    /// Use custom slot timing.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Line status sampled by the most recent reset.
    pub fn status(&self) -> LineStatus {
        self.status
    }

    /// Give back the pin and the timer.
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}
