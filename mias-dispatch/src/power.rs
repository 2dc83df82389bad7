use embedded_hal::digital::OutputPin;

/// Switch supplying power to the 1-Wire bus.
pub struct PowerGate<P> {
    pin: P,
    active_low: bool,
    enabled: bool,
}

impl<P: OutputPin> PowerGate<P> {
    /// A switch that powers the bus while the pin is low.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
            enabled: false,
        }
    }

    /// A switch that powers the bus while the pin is high.
    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
            enabled: false,
        }
    }

    /// Power the bus.
    pub fn enable(&mut self) -> Result<(), P::Error> {
        self.drive(true)
    }

    /// Remove bus power.
    pub fn disable(&mut self) -> Result<(), P::Error> {
        self.drive(false)
    }

    /// Last state successfully driven.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Give back the pin.
    pub fn release(self) -> P {
        self.pin
    }

    fn drive(&mut self, on: bool) -> Result<(), P::Error> {
        if on != self.active_low {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.enabled = on;
        Ok(())
    }
}
