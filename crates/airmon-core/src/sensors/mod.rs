//! Sensor trait, typed readings and the drivers of the four on-board sensors

#[cfg(feature = "sensor-ags02ma")]
mod ags02ma;
#[cfg(feature = "sensor-aht20")]
mod aht20;
#[cfg(feature = "sensor-bmp280")]
mod bmp280;
#[cfg(feature = "sensor-pm1006")]
mod pm1006;

#[cfg(feature = "sensor-ags02ma")]
pub use ags02ma::Ags02maSensor;
#[cfg(feature = "sensor-aht20")]
pub use aht20::Aht20Sensor;
#[cfg(feature = "sensor-bmp280")]
pub use bmp280::{Bmp280Calibration, Bmp280Sensor};
#[cfg(feature = "sensor-pm1006")]
pub use pm1006::Pm1006Sensor;

use log::{debug, warn};
use thiserror_no_std::Error;

use crate::sampling::RawReadings;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} sent a frame with a bad checksum")]
    Checksum { sensor: &'static str },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, SensorError>>;
}

/// PM2.5 concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticulateReading {
    pub pm2_5_ug_m3: i32,
}

/// Temperature and relative humidity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_celsius: f32,
    /// Whole percent, truncated
    pub humidity_percent: i32,
}

/// Temperature and barometric pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarometricReading {
    pub temperature_celsius: f32,
    pub pressure_hpa: f32,
}

/// Total volatile organic compounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocReading {
    pub tvoc_ppb: i32,
}

/// Anything that yields one cycle of raw readings.
pub trait SensorSource {
    /// Never fails as a whole; individual values are `None` when their
    /// sensor could not be read.
    fn read_all(&mut self) -> impl Future<Output = RawReadings>;
}

/// The four sensors of the device.
pub struct SensorSuite<P, C, B, V> {
    pub particulate: P,
    pub climate: C,
    pub barometer: B,
    pub voc: V,
}

fn log_failure<T>(quantity: &str, result: Result<T, SensorError>) -> Option<T> {
    result
        .map_err(|e| warn!("Failed to get {}: {}", quantity, e))
        .ok()
}

impl<P, C, B, V> SensorSource for SensorSuite<P, C, B, V>
where
    P: Sensor<Readings = ParticulateReading>,
    C: Sensor<Readings = ClimateReading>,
    B: Sensor<Readings = BarometricReading>,
    V: Sensor<Readings = VocReading>,
{
    async fn read_all(&mut self) -> RawReadings {
        let particulate = log_failure("PM2.5", self.particulate.read().await);
        let climate = log_failure("temperature/humidity", self.climate.read().await);
        let barometric = log_failure("temperature/air pressure", self.barometer.read().await);
        let voc = log_failure("TVOC", self.voc.read().await);

        let readings = RawReadings {
            fine_dust: particulate.map(|r| r.pm2_5_ug_m3),
            temperature: climate.map(|r| r.temperature_celsius),
            humidity: climate.map(|r| r.humidity_percent),
            tvoc: voc.map(|r| r.tvoc_ppb),
            temperature2: barometric.map(|r| r.temperature_celsius),
            pressure: barometric.map(|r| r.pressure_hpa),
        };
        debug!("Raw readings: {:?}", readings);
        readings
    }
}

/// CRC-8 with polynomial 0x31 and initial value 0xFF, as used by the
/// Aosong sensors.
#[cfg(any(feature = "sensor-aht20", feature = "sensor-ags02ma"))]
pub(crate) fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct Fixed<R>(Result<R, SensorError>);

    impl<R: Copy> Sensor for Fixed<R> {
        type Readings = R;

        async fn read(&mut self) -> Result<R, SensorError> {
            self.0
        }
    }

    #[cfg(any(feature = "sensor-aht20", feature = "sensor-ags02ma"))]
    #[test]
    fn test_crc8_reference_vector() {
        assert_eq!(crc8(&[0xBE, 0xEF]), 0x92);
        assert_eq!(crc8(&[]), 0xFF);
    }

    #[test]
    fn test_failed_sensor_only_blanks_its_values() {
        let mut suite = SensorSuite {
            particulate: Fixed(Ok(ParticulateReading { pm2_5_ug_m3: 12 })),
            climate: Fixed::<ClimateReading>(Err(SensorError::Timeout {
                sensor: "AHT20",
                operation: "finish measurement",
            })),
            barometer: Fixed(Ok(BarometricReading {
                temperature_celsius: 21.5,
                pressure_hpa: 1009.25,
            })),
            voc: Fixed(Ok(VocReading { tvoc_ppb: 80 })),
        };

        let readings = block_on(suite.read_all());
        assert_eq!(
            readings,
            RawReadings {
                fine_dust: Some(12),
                temperature: None,
                humidity: None,
                tvoc: Some(80),
                temperature2: Some(21.5),
                pressure: Some(1009.25),
            }
        );
    }
}
