use anyhow::Context;
use clap::Parser;
use ds18x20::Ds18x20;
use embedded_hal::delay::DelayNs;
use gpio_cdev::{Chip, LineRequestFlags};
use gpio_onewire::GpioOneWire;
use linux_embedded_hal::CdevPin;
use mias_dispatch::{DEFAULT_SENSORS, Dispatcher, Inbound, PowerGate, Reply, Sensor, Transport};
use mias_onewire::Address;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

/// Answer mesh text commands typed on stdin, reading DS18x20 probes over a GPIO 1-Wire bus
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the GPIO character device
    #[arg(long, default_value = "/dev/gpiochip0")]
    chip: String,
    /// Line offset of the 1-Wire data pin
    #[arg(long, default_value_t = 4)]
    data_line: u32,
    /// Line offset of the bus power switch
    #[arg(long, default_value_t = 36)]
    power_line: u32,
    /// The power switch conducts while its line is high
    #[arg(long)]
    power_active_high: bool,
    /// Probe as LABEL=ROM, e.g. Air=28ffd9dc93160543 (repeatable)
    #[arg(long = "sensor", value_parser = parse_sensor)]
    sensors: Vec<(String, Address)>,
    /// Wait after Convert T, in milliseconds
    #[arg(long, default_value_t = 1000)]
    conversion_ms: u32,
    /// Wait after switching bus power, in milliseconds
    #[arg(long, default_value_t = 1000)]
    settle_ms: u32,
    /// Accept scratchpads with a bad CRC byte
    #[arg(long)]
    skip_scratchpad_crc: bool,
    /// Node number the stdin messages are attributed to (hex)
    #[arg(long, default_value = "0", value_parser = parse_node)]
    from: u32,
}

fn parse_sensor(s: &str) -> Result<(String, Address), String> {
    let (label, rom) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=ROM, got {s:?}"))?;
    if label.is_empty() {
        return Err("empty sensor label".into());
    }
    let address: Address = rom.parse().map_err(|e| format!("{rom:?}: {e}"))?;
    if !address.is_valid() {
        return Err(format!("{address} has a bad CRC byte"));
    }
    Ok((label.to_string(), address))
}

fn parse_node(s: &str) -> Result<u32, std::num::ParseIntError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("!"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16)
}

/// Spins on the monotonic clock. Sleeping overshoots the few-microsecond 1-Wire slots.
struct BusyDelay;

impl DelayNs for BusyDelay {
    fn delay_ns(&mut self, ns: u32) {
        let until = Instant::now() + Duration::from_nanos(ns.into());
        while Instant::now() < until {
            std::hint::spin_loop();
        }
    }
}

/// Prints replies instead of putting them on the air.
struct StdoutTransport;

impl Transport for StdoutTransport {
    type Error = io::Error;

    fn send(&mut self, reply: Reply) -> Result<(), Self::Error> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "-> {:#x} (hop_limit {}, want_ack {}): {}",
            reply.to(),
            reply.hop_limit(),
            reply.want_ack(),
            reply
        )?;
        out.flush()
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();

    let mut chip = Chip::new(&args.chip).with_context(|| format!("opening {}", args.chip))?;
    let data = chip
        .get_line(args.data_line)
        .and_then(|line| {
            line.request(
                LineRequestFlags::OUTPUT | LineRequestFlags::OPEN_DRAIN,
                1,
                "mias-onewire",
            )
        })
        .with_context(|| format!("requesting data line {}", args.data_line))?;
    let data = CdevPin::new(data).context("wrapping data line")?;
    // Start with the bus unpowered
    let power_off = if args.power_active_high { 0 } else { 1 };
    let power = chip
        .get_line(args.power_line)
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, power_off, "mias-power"))
        .with_context(|| format!("requesting power line {}", args.power_line))?;
    let power = CdevPin::new(power).context("wrapping power line")?;
    let power = if args.power_active_high {
        PowerGate::active_high(power)
    } else {
        PowerGate::new(power)
    };

    let sensors: Vec<Sensor> = if args.sensors.is_empty() {
        DEFAULT_SENSORS.to_vec()
    } else {
        args.sensors
            .iter()
            .map(|(label, address)| Sensor {
                label,
                address: *address,
            })
            .collect()
    };
    for sensor in &sensors {
        log::info!("Sensor {}: {}", sensor.label, sensor.address);
    }

    let bus = GpioOneWire::new(data, BusyDelay);
    let driver = Ds18x20::default()
        .with_conversion_delay_ms(args.conversion_ms)
        .with_scratchpad_crc(!args.skip_scratchpad_crc);
    let mut dispatcher = Dispatcher::new(bus, power, linux_embedded_hal::Delay, &sensors)
        .with_driver(driver)
        .with_settle_ms(args.settle_ms);

    let mut transport = StdoutTransport;
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let msg = Inbound {
            from: args.from,
            payload: line.as_bytes(),
            rx_rssi: 0,
            rx_snr: 0.0,
            hop_start: 0,
            hop_limit: 0,
            via_mqtt: false,
        };
        let disposition = dispatcher.handle(&msg, &mut transport);
        log::debug!("{line:?}: {disposition:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_argument() {
        let (label, address) = parse_sensor("Air=28ffd9dc93160543").unwrap();
        assert_eq!(label, "Air");
        assert_eq!(address, DEFAULT_SENSORS[0].address);
        assert!(parse_sensor("28ffd9dc93160543").is_err());
        assert!(parse_sensor("=28ffd9dc93160543").is_err());
        assert!(parse_sensor("Air=28ffd9dc93160544").is_err());
        assert!(parse_sensor("Air=28ff").is_err());
    }

    #[test]
    fn node_argument() {
        assert_eq!(parse_node("deadbeef"), Ok(0xdeadbeef));
        assert_eq!(parse_node("0x1234"), Ok(0x1234));
        assert_eq!(parse_node("!a1b2c3d4"), Ok(0xa1b2c3d4));
        assert!(parse_node("xyz").is_err());
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["mias-linux"]);
        assert_eq!(args.chip, "/dev/gpiochip0");
        assert_eq!(args.data_line, 4);
        assert_eq!(args.power_line, 36);
        assert!(!args.power_active_high);
        assert!(args.sensors.is_empty());
        assert_eq!(args.conversion_ms, 1000);
        assert_eq!(args.settle_ms, 1000);
        assert_eq!(args.from, 0);
    }

    #[test]
    fn repeated_sensors() {
        let args = Args::parse_from([
            "mias-linux",
            "--sensor",
            "Water=28aa9a80131302f5",
            "--sensor",
            "Air=28ffd9dc93160543",
            "--power-active-high",
        ]);
        assert_eq!(args.sensors.len(), 2);
        assert_eq!(args.sensors[0].0, "Water");
        assert!(args.power_active_high);
    }
}
