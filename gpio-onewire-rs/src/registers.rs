use bitfield_struct::bitfield;
use mias_onewire::OneWireStatus;

/// Status of the 1-Wire line, updated by every reset.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct LineStatus {
    /// A device pulled the line low during the presence-detect window.
    pub presence: bool,
    /// The line was already low before the reset pulse, so it is held
    /// by a short or a device that never released it.
    pub short_detect: bool,
    /// Level of the line sampled just before the reset pulse.
    pub logic_level: bool,
    #[bits(5)]
    __: u8,
}

impl OneWireStatus for LineStatus {
    fn presence(&self) -> bool {
        self.presence()
    }

    fn shortcircuit(&self) -> bool {
        self.short_detect()
    }

    fn logic_level(&self) -> Option<bool> {
        Some(self.logic_level())
    }
}

/// 1-Wire slot timing, in microseconds.
///
/// Defaults are the standard-speed values recommended in
/// [Maxim application note 126](https://www.analog.com/en/resources/technical-articles/1wire-communication-through-software.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    reset_low: u32,
    presence_sample: u32,
    reset_recovery: u32,
    write_one_low: u32,
    write_one_release: u32,
    write_zero_low: u32,
    write_zero_release: u32,
    read_low: u32,
    read_sample: u32,
    read_recovery: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            reset_low: 480,
            presence_sample: 70,
            reset_recovery: 410,
            write_one_low: 6,
            write_one_release: 64,
            write_zero_low: 60,
            write_zero_release: 10,
            read_low: 6,
            read_sample: 9,
            read_recovery: 55,
        }
    }
}

impl Timing {
    /// Set the reset low time (tRSTL) and the presence sampling point after release (tMSP).
    ///
    /// The recovery after sampling is stretched so the whole reset still lasts at least 960 µs.
    pub fn reset_pulse(mut self, low: u32, sample: u32) -> Self {
        self.reset_low = low;
        self.presence_sample = sample;
        self.reset_recovery = 960u32.saturating_sub(low + sample).max(410);
        self
    }

    /// Set the write slot low times for a 1 and a 0 bit. The slot length stays 70 µs.
    pub fn write_slot(mut self, one_low: u32, zero_low: u32) -> Self {
        self.write_one_low = one_low;
        self.write_one_release = 70u32.saturating_sub(one_low);
        self.write_zero_low = zero_low;
        self.write_zero_release = 70u32.saturating_sub(zero_low).max(5);
        self
    }

    /// Set the read slot low time and the sampling point after release.
    pub fn read_slot(mut self, low: u32, sample: u32) -> Self {
        self.read_low = low;
        self.read_sample = sample;
        self.read_recovery = 70u32.saturating_sub(low + sample).max(5);
        self
    }

    pub(crate) fn reset_low(&self) -> u32 {
        self.reset_low
    }

    pub(crate) fn presence_sample(&self) -> u32 {
        self.presence_sample
    }

    pub(crate) fn reset_recovery(&self) -> u32 {
        self.reset_recovery
    }

    pub(crate) fn write_bit(&self, bit: bool) -> (u32, u32) {
        if bit {
            (self.write_one_low, self.write_one_release)
        } else {
            (self.write_zero_low, self.write_zero_release)
        }
    }

    pub(crate) fn read_bit(&self) -> (u32, u32, u32) {
        (self.read_low, self.read_sample, self.read_recovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits() {
        let status = LineStatus::new().with_presence(true).with_logic_level(true);
        assert_eq!(status.into_bits(), 0b101);
        assert!(OneWireStatus::presence(&status));
        assert!(!OneWireStatus::shortcircuit(&status));
    }

    #[test]
    fn reset_pulse_keeps_minimum_length() {
        let t = Timing::default().reset_pulse(500, 70);
        assert_eq!(t.reset_low(), 500);
        assert_eq!(t.presence_sample(), 70);
        assert_eq!(t.reset_recovery(), 410);
        let t = Timing::default().reset_pulse(480, 60);
        assert_eq!(t.reset_recovery(), 420);
    }

    #[test]
    fn slots_are_70us() {
        let t = Timing::default().write_slot(10, 65);
        assert_eq!(t.write_bit(true), (10, 60));
        assert_eq!(t.write_bit(false), (65, 5));
        let (low, sample, recovery) = Timing::default().read_slot(5, 10).read_bit();
        assert_eq!(low + sample + recovery, 70);
    }
}
