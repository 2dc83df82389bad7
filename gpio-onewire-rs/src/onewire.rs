use crate::{GpioOneWire, LineStatus};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use mias_onewire::{OneWire, OneWireError, OneWireResult};

impl<P: InputPin + OutputPin, D: DelayNs> OneWire for GpioOneWire<P, D> {
    type Status = LineStatus;

    type BusError = P::Error;

    fn reset(&mut self) -> OneWireResult<Self::Status, Self::BusError> {
        self.pin.set_high()?;
        // a released line that still reads low is held by something else
        let idle_low = self.pin.is_low()?;
        let mut status = LineStatus::new()
            .with_logic_level(!idle_low)
            .with_short_detect(idle_low);
        if idle_low {
            self.status = status;
            log::warn!("1-Wire line is low before reset");
            return Err(OneWireError::ShortCircuit);
        }
        self.pin.set_low()?;
        self.delay.delay_us(self.timing.reset_low());
        self.pin.set_high()?;
        self.delay.delay_us(self.timing.presence_sample());
        let presence = self.pin.is_low()?;
        self.delay.delay_us(self.timing.reset_recovery());
        status.set_presence(presence);
        self.status = status;
        if presence {
            Ok(status)
        } else {
            Err(OneWireError::NoDevicePresent)
        }
    }

    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        let (low, release) = self.timing.write_bit(bit);
        self.pin.set_low()?;
        self.delay.delay_us(low);
        self.pin.set_high()?;
        self.delay.delay_us(release);
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        let (low, sample, recovery) = self.timing.read_bit();
        self.pin.set_low()?;
        self.delay.delay_us(low);
        self.pin.set_high()?;
        self.delay.delay_us(sample);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(recovery);
        Ok(bit)
    }
}
