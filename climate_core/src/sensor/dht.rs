//! Single-wire DHT11/DHT22 driver.
//!
//! A frame is 40 bits: humidity (16), temperature (16) and an 8-bit checksum.
//! Each bit starts with a ~50µs low phase; the length of the following high
//! phase encodes the value (~27µs for 0, ~70µs for 1).

use super::{SensorDriver, SensorKind};
use crate::error::{ClimateError, ClimateResult};
use crate::reading::Reading;
use futures::future::BoxFuture;
use std::time::Duration;

/// High phases longer than this decode as a 1 bit
pub const ONE_BIT_THRESHOLD: Duration = Duration::from_micros(48);

/// Number of data bits in one frame
pub const FRAME_BITS: usize = 40;

/// Pack measured high-phase durations into the five frame bytes
pub fn bits_to_frame(high_pulses: &[Duration; FRAME_BITS]) -> [u8; 5] {
    let mut frame = [0u8; 5];
    for (i, pulse) in high_pulses.iter().enumerate() {
        if *pulse > ONE_BIT_THRESHOLD {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    frame
}

/// Validate the checksum and convert a raw frame into a reading
pub fn decode_frame(kind: SensorKind, frame: [u8; 5]) -> ClimateResult<Reading> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(ClimateError::read(format!(
            "checksum mismatch: computed {:#04x}, sensor sent {:#04x}",
            sum, frame[4]
        )));
    }

    let reading = match kind {
        SensorKind::Dht11 => {
            let humidity = frame[0] as f64 + frame[1] as f64 / 10.0;
            let magnitude = frame[2] as f64 + (frame[3] & 0x7f) as f64 / 10.0;
            let temperature = if frame[3] & 0x80 != 0 { -magnitude } else { magnitude };
            Reading::new(temperature, humidity)
        }
        SensorKind::Dht22 => {
            let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f64 / 10.0;
            let magnitude = u16::from_be_bytes([frame[2] & 0x7f, frame[3]]) as f64 / 10.0;
            let temperature = if frame[2] & 0x80 != 0 { -magnitude } else { magnitude };
            Reading::new(temperature, humidity)
        }
    };

    if !(0.0..=100.0).contains(&reading.humidity) {
        return Err(ClimateError::read(format!(
            "implausible humidity {:.1}% from {}",
            reading.humidity, kind
        )));
    }

    Ok(reading)
}

/// DHT sensor on a Raspberry Pi GPIO line
pub struct DhtSensor {
    _private: (),
}

impl DhtSensor {
    /// Check GPIO access and create the driver
    #[cfg(feature = "raspberry-pi")]
    pub fn new() -> ClimateResult<Self> {
        rppal::gpio::Gpio::new()
            .map_err(|e| ClimateError::gpio(format!("cannot access GPIO: {}", e)))?;
        Ok(Self { _private: () })
    }

    #[cfg(not(feature = "raspberry-pi"))]
    pub fn new() -> ClimateResult<Self> {
        Err(ClimateError::gpio(
            "built without the `raspberry-pi` feature; enable it or set SIMULATE=true",
        ))
    }
}

impl SensorDriver for DhtSensor {
    fn read(&self, kind: SensorKind, pin: u8) -> BoxFuture<'static, ClimateResult<Reading>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || hardware::read_frame(kind, pin))
                .await
                .map_err(|e| ClimateError::read(format!("sensor task failed: {}", e)))?
                .and_then(|frame| decode_frame(kind, frame))
        })
    }
}

#[cfg(feature = "raspberry-pi")]
mod hardware {
    use super::{bits_to_frame, FRAME_BITS};
    use crate::error::{ClimateError, ClimateResult};
    use crate::sensor::SensorKind;
    use rppal::gpio::{Gpio, IoPin, Level, Mode, PullUpDown};
    use std::time::{Duration, Instant};

    /// Longest any single phase of the protocol may last
    const EDGE_TIMEOUT: Duration = Duration::from_micros(500);

    pub(super) fn read_frame(kind: SensorKind, pin: u8) -> ClimateResult<[u8; 5]> {
        let gpio = Gpio::new().map_err(|e| ClimateError::read(format!("GPIO: {}", e)))?;
        let mut line = gpio
            .get(pin)
            .map_err(|e| ClimateError::read(format!("GPIO {}: {}", pin, e)))?
            .into_io(Mode::Output);

        // Start signal, then hand the line back to the sensor
        line.set_low();
        std::thread::sleep(kind.start_signal());
        line.set_high();
        line.set_mode(Mode::Input);
        line.set_pullupdown(PullUpDown::PullUp);

        // Response: 80µs low, 80µs high, then the first bit's low phase
        wait_for(&line, Level::Low)?;
        wait_for(&line, Level::High)?;
        wait_for(&line, Level::Low)?;

        let mut pulses = [Duration::ZERO; FRAME_BITS];
        for (bit, pulse) in pulses.iter_mut().enumerate() {
            wait_for(&line, Level::High)
                .map_err(|e| ClimateError::read(format!("bit {}: {}", bit, e)))?;
            *pulse = wait_for(&line, Level::Low)
                .map_err(|e| ClimateError::read(format!("bit {}: {}", bit, e)))?;
        }

        Ok(bits_to_frame(&pulses))
    }

    /// Busy-wait until the line reaches `level`, returning how long that took
    fn wait_for(line: &IoPin, level: Level) -> ClimateResult<Duration> {
        let start = Instant::now();
        while line.read() != level {
            if start.elapsed() > EDGE_TIMEOUT {
                return Err(ClimateError::read(format!(
                    "line did not go {:?} within {}µs",
                    level,
                    EDGE_TIMEOUT.as_micros()
                )));
            }
        }
        Ok(start.elapsed())
    }
}

#[cfg(not(feature = "raspberry-pi"))]
mod hardware {
    use crate::error::{ClimateError, ClimateResult};
    use crate::sensor::SensorKind;

    pub(super) fn read_frame(_kind: SensorKind, pin: u8) -> ClimateResult<[u8; 5]> {
        Err(ClimateError::read(format!(
            "no GPIO support compiled in, cannot read pin {}",
            pin
        )))
    }
}
