use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{Sensor, SensorError, VocReading, crc8};

const ADDRESS: u8 = 0x1A;
const REG_DATA: u8 = 0x00;
const REG_VERSION: u8 = 0x11;

/// Set while the sensor is still preheating
const STATUS_NOT_READY: u8 = 0x01;
const CONVERSION_DELAY_MS: u64 = 30;

/// Aosong AGS02MA TVOC sensor.
///
/// The part only tolerates I2C clocks up to 30 kHz.
pub struct Ags02maSensor<I> {
    i2c: I,
}

impl<I: I2c> Ags02maSensor<I> {
    /// Probe the sensor by reading its firmware version.
    pub async fn new(i2c: I) -> Result<Self, SensorError> {
        let mut sensor = Self { i2c };
        let frame = sensor.read_register(REG_VERSION).await.map_err(|e| {
            error!("AGS02MA version read failed: {}", e);
            SensorError::InitializationFailed {
                sensor: "AGS02MA",
                details: "I2C communication error or sensor not responding",
            }
        })?;
        info!("AGS02MA: firmware version {}", frame[3]);
        Ok(sensor)
    }

    async fn read_register(&mut self, register: u8) -> Result<[u8; 5], SensorError> {
        self.i2c.write(ADDRESS, &[register]).await.map_err(|e| {
            error!("AGS02MA register select failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "AGS02MA",
                operation: "select register",
                details: "I2C communication error",
            }
        })?;

        Timer::after_millis(CONVERSION_DELAY_MS).await;

        let mut frame = [0u8; 5];
        self.i2c.read(ADDRESS, &mut frame).await.map_err(|e| {
            error!("AGS02MA register read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "AGS02MA",
                operation: "read register",
                details: "I2C communication error",
            }
        })?;

        if crc8(&frame[..4]) != frame[4] {
            return Err(SensorError::Checksum { sensor: "AGS02MA" });
        }
        Ok(frame)
    }
}

/// Decode a CRC-checked data frame: status byte then 24-bit ppb value.
pub(crate) fn decode(frame: &[u8; 5]) -> Result<VocReading, SensorError> {
    if frame[0] & STATUS_NOT_READY != 0 {
        return Err(SensorError::ReadFailed {
            sensor: "AGS02MA",
            operation: "read TVOC",
            details: "sensor is still preheating",
        });
    }

    let tvoc_ppb = i32::from_be_bytes([0, frame[1], frame[2], frame[3]]);
    Ok(VocReading { tvoc_ppb })
}

impl<I: I2c> Sensor for Ags02maSensor<I> {
    type Readings = VocReading;

    async fn read(&mut self) -> Result<VocReading, SensorError> {
        let frame = self.read_register(REG_DATA).await?;
        let reading = decode(&frame)?;
        debug!("TVOC: {} ppb", reading.tvoc_ppb);
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_i2c_bus::mock::MockI2c;
    use embassy_futures::block_on;

    fn frame(status: u8, tvoc: u32) -> [u8; 5] {
        let [_, a, b, c] = tvoc.to_be_bytes();
        let mut frame = [status, a, b, c, 0];
        frame[4] = crc8(&frame[..4]);
        frame
    }

    #[test]
    fn test_decode_ready_frame() {
        assert_eq!(decode(&frame(0x00, 1234)).unwrap().tvoc_ppb, 1234);
        assert_eq!(decode(&frame(0x00, 0x01_0000)).unwrap().tvoc_ppb, 65536);
    }

    #[test]
    fn test_preheating_is_a_read_failure() {
        assert!(matches!(
            decode(&frame(STATUS_NOT_READY, 0)),
            Err(SensorError::ReadFailed { sensor: "AGS02MA", .. })
        ));
    }

    #[test]
    fn test_read_checks_crc() {
        let mut corrupt = frame(0x00, 200);
        corrupt[4] ^= 0x5A;
        let bus = MockI2c::default().respond(&frame(0x00, 0x76)).respond(&corrupt);
        let mut sensor = block_on(Ags02maSensor::new(bus)).unwrap();

        assert_eq!(
            block_on(sensor.read()),
            Err(SensorError::Checksum { sensor: "AGS02MA" })
        );
    }
}
