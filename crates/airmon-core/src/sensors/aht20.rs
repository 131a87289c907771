use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{ClimateReading, Sensor, SensorError, crc8};

const ADDRESS: u8 = 0x38;
const CMD_STATUS: u8 = 0x71;
const CMD_INITIALIZE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const POWER_ON_DELAY_MS: u64 = 40;
const MEASUREMENT_DELAY_MS: u64 = 80;
const FULL_SCALE: f32 = 1_048_576.0;

/// Aosong AHT20 temperature / humidity sensor.
pub struct Aht20Sensor<I> {
    i2c: I,
}

impl<I: I2c> Aht20Sensor<I> {
    /// Probe the sensor and load its calibration if it has not done so itself.
    pub async fn new(i2c: I) -> Result<Self, SensorError> {
        let mut sensor = Self { i2c };
        Timer::after_millis(POWER_ON_DELAY_MS).await;

        if sensor.status().await? & STATUS_CALIBRATED == 0 {
            sensor.i2c.write(ADDRESS, &CMD_INITIALIZE).await.map_err(|e| {
                error!("AHT20 initialize command failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "AHT20",
                    details: "Failed to send initialize command",
                }
            })?;
            Timer::after_millis(10).await;

            if sensor.status().await? & STATUS_CALIBRATED == 0 {
                return Err(SensorError::InitializationFailed {
                    sensor: "AHT20",
                    details: "Calibration bit not set after initialization",
                });
            }
        }

        info!("AHT20: calibrated and ready");
        Ok(sensor)
    }

    async fn status(&mut self) -> Result<u8, SensorError> {
        let mut status = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[CMD_STATUS], &mut status)
            .await
            .map_err(|e| {
                error!("AHT20 status read failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "AHT20",
                    details: "I2C communication error or sensor not responding",
                }
            })?;
        Ok(status[0])
    }
}

/// Decode a 7-byte measurement: status, 20-bit humidity, 20-bit temperature,
/// CRC.
pub(crate) fn decode(frame: &[u8; 7]) -> Result<ClimateReading, SensorError> {
    if frame[0] & STATUS_BUSY != 0 {
        return Err(SensorError::Timeout {
            sensor: "AHT20",
            operation: "finish measurement",
        });
    }
    if crc8(&frame[..6]) != frame[6] {
        return Err(SensorError::Checksum { sensor: "AHT20" });
    }

    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    Ok(ClimateReading {
        temperature_celsius: raw_temperature as f32 / FULL_SCALE * 200.0 - 50.0,
        humidity_percent: (raw_humidity as f32 / FULL_SCALE * 100.0) as i32,
    })
}

impl<I: I2c> Sensor for Aht20Sensor<I> {
    type Readings = ClimateReading;

    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.i2c.write(ADDRESS, &CMD_MEASURE).await.map_err(|e| {
            error!("AHT20 trigger failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "AHT20",
                operation: "trigger measurement",
                details: "I2C communication error",
            }
        })?;

        Timer::after_millis(MEASUREMENT_DELAY_MS).await;

        let mut frame = [0u8; 7];
        self.i2c.read(ADDRESS, &mut frame).await.map_err(|e| {
            error!("AHT20 measurement read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "AHT20",
                operation: "read temperature/humidity",
                details: "I2C communication error or sensor not responding",
            }
        })?;

        let reading = decode(&frame)?;
        debug!(
            "Temperature: {:.1} C | Humidity: {} %",
            reading.temperature_celsius, reading.humidity_percent
        );
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_i2c_bus::mock::MockI2c;
    use embassy_futures::block_on;

    fn frame(raw_humidity: u32, raw_temperature: u32) -> [u8; 7] {
        let mut frame = [
            0x1C,
            (raw_humidity >> 12) as u8,
            (raw_humidity >> 4) as u8,
            (((raw_humidity & 0x0F) << 4) | (raw_temperature >> 16)) as u8,
            (raw_temperature >> 8) as u8,
            raw_temperature as u8,
            0,
        ];
        frame[6] = crc8(&frame[..6]);
        frame
    }

    #[test]
    fn test_decode_midscale() {
        let reading = decode(&frame(0x80000, 0x66666)).unwrap();
        assert_eq!(reading.humidity_percent, 50);
        assert!((reading.temperature_celsius - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_humidity_is_truncated() {
        // 0x8FFFF is 56.25 % minus one count
        let reading = decode(&frame(0x8FFFF, 0x66666)).unwrap();
        assert_eq!(reading.humidity_percent, 56);
    }

    #[test]
    fn test_busy_or_corrupt_frames_are_rejected() {
        let mut busy = frame(0x80000, 0x66666);
        busy[0] |= STATUS_BUSY;
        busy[6] = crc8(&busy[..6]);
        assert!(matches!(decode(&busy), Err(SensorError::Timeout { .. })));

        let mut corrupt = frame(0x80000, 0x66666);
        corrupt[2] ^= 0xFF;
        assert_eq!(decode(&corrupt), Err(SensorError::Checksum { sensor: "AHT20" }));
    }

    #[test]
    fn test_read_triggers_measurement() {
        let bus = MockI2c::default()
            .respond(&[STATUS_CALIBRATED])
            .respond(&frame(0x80000, 0x66666));
        let mut sensor = block_on(Aht20Sensor::new(bus)).unwrap();

        let reading = block_on(sensor.read()).unwrap();
        assert_eq!(reading.humidity_percent, 50);
        assert_eq!(sensor.i2c.writes.last().unwrap().1, CMD_MEASURE);
    }

    #[test]
    fn test_uncalibrated_sensor_fails_init() {
        let bus = MockI2c::default().respond(&[0x00]).respond(&[0x00]);
        let result = block_on(Aht20Sensor::new(bus));
        assert!(matches!(
            result,
            Err(SensorError::InitializationFailed { sensor: "AHT20", .. })
        ));
    }
}
