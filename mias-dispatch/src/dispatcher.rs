use crate::{Command, Inbound, MAX_PAYLOAD_LEN, PowerGate, Reply, Transport};
use core::fmt::{self, Debug, Write};
use ds18x20::{Ds18x20, Reading, celsius_or_sentinel};
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use heapless::String;
use mias_onewire::{Address, OneWire};

/// A temperature probe and the label it is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sensor<'a> {
    /// Reported as `<label> temp: ...`.
    pub label: &'a str,
    /// ROM address of the probe.
    pub address: Address,
}

/// The air and water probes fitted to the stock node.
pub const DEFAULT_SENSORS: [Sensor<'static>; 2] = [
    Sensor {
        label: "Air",
        address: Address::new([0x28, 0xff, 0xd9, 0xdc, 0x93, 0x16, 0x05, 0x43]),
    },
    Sensor {
        label: "Water",
        address: Address::new([0x28, 0xaa, 0x9a, 0x80, 0x13, 0x13, 0x02, 0xf5]),
    },
];

/// What happened to an inbound message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A reply was handed to the transport.
    Replied(Command),
    /// Not a command; nothing was done.
    Ignored,
    /// The command ran but its reply could not be built.
    Dropped(Command),
}

/// Reply construction failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The formatted reply exceeds [`MAX_PAYLOAD_LEN`].
    ReplyTooLong,
    /// `temp` was requested with an empty sensor table.
    NoSensors,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplyTooLong => write!(f, "reply exceeds {MAX_PAYLOAD_LEN} bytes"),
            Self::NoSensors => f.write_str("no sensors configured"),
        }
    }
}

impl From<fmt::Error> for DispatchError {
    fn from(_: fmt::Error) -> Self {
        Self::ReplyTooLong
    }
}

/// Command responder owning the bus, the bus power switch and a delay source.
pub struct Dispatcher<'a, O, P, D> {
    bus: O,
    power: PowerGate<P>,
    delay: D,
    driver: Ds18x20,
    sensors: &'a [Sensor<'a>],
    settle_ms: u32,
}

impl<'a, O, P, D> Dispatcher<'a, O, P, D>
where
    O: OneWire,
    O::BusError: Debug,
    P: OutputPin,
    D: DelayNs,
{
    /// Takes ownership of the bus, power switch and delay. Bus power is switched off here.
    pub fn new(bus: O, mut power: PowerGate<P>, delay: D, sensors: &'a [Sensor<'a>]) -> Self {
        if let Err(e) = power.disable() {
            log::warn!("could not switch bus power off: {e:?}");
        }
        Self {
            bus,
            power,
            delay,
            driver: Ds18x20::default(),
            sensors,
            settle_ms: 1000,
        }
    }

    /// Sensor read settings.
    pub fn with_driver(mut self, driver: Ds18x20) -> Self {
        self.driver = driver;
        self
    }

    /// Wait after each power switch-on, and between a switch-off and the next switch-on.
    pub fn with_settle_ms(mut self, ms: u32) -> Self {
        self.settle_ms = ms;
        self
    }

    /// The configured sensors.
    pub fn sensors(&self) -> &'a [Sensor<'a>] {
        self.sensors
    }

    /// The bus power switch.
    pub fn power(&self) -> &PowerGate<P> {
        &self.power
    }

    /// Give back the bus, power switch and delay.
    pub fn release(self) -> (O, PowerGate<P>, D) {
        (self.bus, self.power, self.delay)
    }

    /// Handle one inbound message, sending at most one reply.
    pub fn handle<T: Transport>(&mut self, msg: &Inbound<'_>, transport: &mut T) -> Disposition {
        let Some(command) = Command::parse(msg.payload) else {
            log::debug!(
                "Ignoring {} byte message from {:#x}",
                msg.payload.len(),
                msg.from
            );
            return Disposition::Ignored;
        };
        log::info!("Received {command} from {:#x}", msg.from);
        let reply = match self.respond(command, msg) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Dropping {command} reply: {e}");
                return Disposition::Dropped(command);
            }
        };
        log::info!(
            "Sending message dest={:#x}, len={}, msg={}",
            reply.to(),
            reply.len(),
            reply
        );
        if let Err(e) = transport.send(reply) {
            log::warn!("Transport refused reply: {e:?}");
        }
        Disposition::Replied(command)
    }

    /// Run a command and build its reply.
    pub fn respond(&mut self, command: Command, msg: &Inbound<'_>) -> Result<Reply, DispatchError> {
        let mut text = String::<MAX_PAYLOAD_LEN>::new();
        match command {
            Command::Ping => write!(
                text,
                "Pong response, got ping from: {:#x} with rssi: {}, snr: {:.6}, hops_away: {}, hops_start: {}, mqtt_path: {}",
                msg.from,
                msg.rx_rssi,
                msg.rx_snr,
                msg.hops_away(),
                msg.hop_start,
                msg.via_mqtt as u8
            )?,
            Command::Help => {
                text.push_str("Available commands: ")
                    .map_err(|_| DispatchError::ReplyTooLong)?;
                for (i, c) in Command::ALL.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    write!(text, "{sep}{c}")?;
                }
            }
            Command::Temp => {
                let sensors = self.sensors;
                if sensors.is_empty() {
                    return Err(DispatchError::NoSensors);
                }
                for (i, sensor) in sensors.iter().enumerate() {
                    if i > 0 {
                        self.delay.delay_ms(self.settle_ms);
                    }
                    let reading = self.read_sensor(sensor);
                    let sep = if i == 0 { "" } else { ", " };
                    write!(
                        text,
                        "{sep}{} temp: {:.6}",
                        sensor.label,
                        celsius_or_sentinel(&reading)
                    )?;
                }
            }
        }
        Ok(Reply::new(msg.from, text))
    }

    /// Power the bus, read one sensor, and power the bus down again.
    fn read_sensor(&mut self, sensor: &Sensor<'_>) -> Reading<O::BusError> {
        if let Err(e) = self.power.enable() {
            log::warn!("could not switch bus power on: {e:?}");
        }
        self.delay.delay_ms(self.settle_ms);
        let reading = self
            .driver
            .read_temperature(&mut self.bus, &mut self.delay, &sensor.address);
        if let Err(e) = self.power.disable() {
            log::warn!("could not switch bus power off: {e:?}");
        }
        if let Err(e) = &reading {
            log::warn!("{} sensor {}: {e}", sensor.label, sensor.address);
        }
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_REQUEST_LEN;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        digital::{Mock as PinMock, State, Transaction},
    };
    use mias_onewire::{OneWireCrc, SimBus, SimDevice};

    #[derive(Default)]
    struct Outbox(Vec<Reply>);

    impl Transport for Outbox {
        type Error = Infallible;

        fn send(&mut self, reply: Reply) -> Result<(), Self::Error> {
            self.0.push(reply);
            Ok(())
        }
    }

    /// Pin that only remembers its level.
    #[derive(Default)]
    struct LevelPin {
        high: bool,
        writes: usize,
    }

    impl ErrorType for LevelPin {
        type Error = Infallible;
    }

    impl OutputPin for LevelPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    fn scratchpad(raw: i16) -> [u8; 9] {
        let [lo, hi] = raw.to_le_bytes();
        let mut bytes = [lo, hi, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0];
        bytes[8] = OneWireCrc::compute(&bytes[..8]);
        bytes
    }

    fn both_probes() -> SimBus {
        SimBus::new([
            SimDevice::new(DEFAULT_SENSORS[0].address, scratchpad(0x0191)),
            SimDevice::new(DEFAULT_SENSORS[1].address, scratchpad(0x00a2)),
        ])
    }

    fn message(payload: &[u8]) -> Inbound<'_> {
        Inbound {
            from: 0xdeadbeef,
            payload,
            rx_rssi: -97,
            rx_snr: 6.25,
            hop_start: 3,
            hop_limit: 1,
            via_mqtt: true,
        }
    }

    /// Power pin expectations: switched off at startup, then on/off per sensor read.
    fn power_sequence(reads: usize) -> Vec<Transaction> {
        let mut seq = vec![Transaction::set(State::High)];
        for _ in 0..reads {
            seq.push(Transaction::set(State::Low));
            seq.push(Transaction::set(State::High));
        }
        seq
    }

    #[test]
    fn startup_switches_power_off() {
        let pin = PinMock::new(&power_sequence(0));
        let dispatcher = Dispatcher::new(
            both_probes(),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        assert!(!dispatcher.power().is_enabled());
        let (_, power, _) = dispatcher.release();
        power.release().done();
    }

    #[test]
    fn ping_reply() {
        let pin = PinMock::new(&power_sequence(0));
        let mut dispatcher = Dispatcher::new(
            both_probes(),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        let disposition = dispatcher.handle(&message(b"ping"), &mut outbox);
        assert_eq!(disposition, Disposition::Replied(Command::Ping));

        let reply = &outbox.0[0];
        assert_eq!(
            reply.text(),
            "Pong response, got ping from: 0xdeadbeef with rssi: -97, snr: 6.250000, hops_away: 2, hops_start: 3, mqtt_path: 1"
        );
        assert!(reply.text().starts_with("Pong response"));
        assert_eq!(reply.to(), 0xdeadbeef);
        assert_eq!(reply.len(), reply.text().len());
        assert_eq!(reply.payload().len(), reply.len());
        assert_eq!(reply.hop_limit(), 7);
        assert!(!reply.want_ack());

        // ping never touches bus power
        let (bus, power, _) = dispatcher.release();
        power.release().done();
        assert!(bus.devices().iter().all(|d| d.conversions() == 0));
    }

    #[test]
    fn help_reply() {
        let pin = PinMock::new(&power_sequence(0));
        let mut dispatcher = Dispatcher::new(
            both_probes(),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        assert_eq!(
            dispatcher.handle(&message(b"help"), &mut outbox),
            Disposition::Replied(Command::Help)
        );
        assert_eq!(outbox.0[0].text(), "Available commands: ping, temp, help");
        let (_, power, _) = dispatcher.release();
        power.release().done();
    }

    #[test]
    fn temp_reply() {
        let pin = PinMock::new(&power_sequence(2));
        let mut dispatcher = Dispatcher::new(
            both_probes(),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        assert_eq!(
            dispatcher.handle(&message(b"temp"), &mut outbox),
            Disposition::Replied(Command::Temp)
        );
        assert_eq!(
            outbox.0[0].text(),
            "Air temp: 25.062500, Water temp: 10.125000"
        );
        assert!(!dispatcher.power().is_enabled());
        let (bus, power, _) = dispatcher.release();
        power.release().done();
        assert!(bus.devices().iter().all(|d| d.conversions() == 1));
    }

    #[test]
    fn temp_with_missing_probes_still_powers_down() {
        let pin = PinMock::new(&power_sequence(2));
        let mut dispatcher = Dispatcher::new(
            SimBus::new([]),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        dispatcher.handle(&message(b"temp"), &mut outbox);
        assert_eq!(
            outbox.0[0].text(),
            "Air temp: 1024.000000, Water temp: 1024.000000"
        );
        assert!(!dispatcher.power().is_enabled());
        let (_, power, _) = dispatcher.release();
        power.release().done();
    }

    #[test]
    fn temp_with_one_probe() {
        let bus = SimBus::new([SimDevice::new(
            DEFAULT_SENSORS[0].address,
            scratchpad(0xff5eu16 as i16),
        )]);
        let mut dispatcher = Dispatcher::new(
            bus,
            PowerGate::new(LevelPin::default()),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        dispatcher.handle(&message(b"temp"), &mut outbox);
        assert_eq!(
            outbox.0[0].text(),
            "Air temp: -10.125000, Water temp: 1024.000000"
        );
    }

    #[test]
    fn sensor_table_drives_the_reply() {
        let third = Address::with_serial(0x22, [1, 2, 3, 4, 5, 6]);
        let sensors = [
            DEFAULT_SENSORS[1],
            Sensor {
                label: "Soil",
                address: third,
            },
        ];
        let bus = SimBus::new([
            SimDevice::new(DEFAULT_SENSORS[1].address, scratchpad(0x00a2)),
            SimDevice::new(third, scratchpad(0x0050)),
        ]);
        let mut dispatcher = Dispatcher::new(
            bus,
            PowerGate::new(LevelPin::default()),
            NoopDelay::new(),
            &sensors,
        );
        let mut outbox = Outbox::default();
        dispatcher.handle(&message(b"temp"), &mut outbox);
        assert_eq!(outbox.0[0].text(), "Water temp: 10.125000, Soil temp: 5.000000");
        let (_, power, _) = dispatcher.release();
        let pin = power.release();
        // startup off, then on/off for each sensor
        assert_eq!(pin.writes, 5);
        assert!(pin.high);
    }

    #[test]
    fn unrecognized_payloads_are_ignored() {
        let pin = PinMock::new(&power_sequence(0));
        let mut dispatcher = Dispatcher::new(
            both_probes(),
            PowerGate::new(pin),
            NoopDelay::new(),
            &DEFAULT_SENSORS,
        );
        let mut outbox = Outbox::default();
        let long = [b'p'; MAX_REQUEST_LEN + 1];
        let mut padded_ping = [b' '; MAX_REQUEST_LEN + 1];
        padded_ping[..4].copy_from_slice(b"ping");
        for payload in [&b"pingpong"[..], b"PING", b"", &long, &padded_ping] {
            assert_eq!(
                dispatcher.handle(&message(payload), &mut outbox),
                Disposition::Ignored
            );
        }
        assert!(outbox.0.is_empty());
        let (bus, power, _) = dispatcher.release();
        power.release().done();
        assert!(bus.devices().iter().all(|d| d.conversions() == 0));
    }

    #[test]
    fn temp_without_sensors_is_dropped() {
        let pin = PinMock::new(&power_sequence(0));
        let mut dispatcher =
            Dispatcher::new(both_probes(), PowerGate::new(pin), NoopDelay::new(), &[]);
        let mut outbox = Outbox::default();
        assert_eq!(
            dispatcher.handle(&message(b"temp"), &mut outbox),
            Disposition::Dropped(Command::Temp)
        );
        assert!(outbox.0.is_empty());
        assert_eq!(
            dispatcher.respond(Command::Temp, &message(b"temp")),
            Err(DispatchError::NoSensors)
        );
        let (bus, power, _) = dispatcher.release();
        power.release().done();
        assert!(bus.devices().iter().all(|d| d.conversions() == 0));
    }

    #[test]
    fn oversized_reply_is_dropped() {
        let labels = [
            "Greenhouse north bench",
            "Greenhouse south bench",
            "Greenhouse east bench",
            "Greenhouse west bench",
            "Cold frame",
            "Compost heap core",
            "Rain barrel",
            "Pond surface",
        ];
        let sensors: Vec<Sensor> = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| Sensor {
                label,
                address: Address::with_serial(0x28, [i as u8; 6]),
            })
            .collect();
        let mut dispatcher = Dispatcher::new(
            SimBus::new([]),
            PowerGate::new(LevelPin::default()),
            NoopDelay::new(),
            &sensors,
        );
        let mut outbox = Outbox::default();
        assert_eq!(
            dispatcher.handle(&message(b"temp"), &mut outbox),
            Disposition::Dropped(Command::Temp)
        );
        assert!(outbox.0.is_empty());
        assert!(!dispatcher.power().is_enabled());
    }
}
