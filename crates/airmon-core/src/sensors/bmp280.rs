use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{BarometricReading, Sensor, SensorError};

const ADDRESS: u8 = 0x76;
const CHIP_ID: u8 = 0x58;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

// Temperature x2, pressure x16, normal mode
const CTRL_MEAS: u8 = (0b010 << 5) | (0b101 << 2) | 0b11;
// 1000 ms standby, filter off
const CONFIG: u8 = 0b101 << 5;

/// Factory trimming parameters stored in the sensor's NVM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp280Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Bmp280Calibration {
    /// Parse the little-endian block starting at 0x88.
    pub fn parse(raw: &[u8; 24]) -> Self {
        let unsigned = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);

        Self {
            t1: unsigned(0),
            t2: signed(2),
            t3: signed(4),
            p1: unsigned(6),
            p2: signed(8),
            p3: signed(10),
            p4: signed(12),
            p5: signed(14),
            p6: signed(16),
            p7: signed(18),
            p8: signed(20),
            p9: signed(22),
        }
    }

    /// Floating point compensation from the datasheet.
    ///
    /// Returns temperature in degC and pressure in Pa, or `None` when the
    /// calibration would divide by zero.
    pub fn compensate(&self, adc_t: i32, adc_p: i32) -> Option<(f32, f32)> {
        let adc_t = f64::from(adc_t);
        let adc_p = f64::from(adc_p);
        let t1 = f64::from(self.t1);

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(self.t2);
        let delta = adc_t / 131072.0 - t1 / 8192.0;
        let var2 = delta * delta * f64::from(self.t3);
        let t_fine = var1 + var2;
        let temperature = t_fine / 5120.0;

        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = var2 / 4.0 + f64::from(self.p4) * 65536.0;
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * f64::from(self.p1);
        if var1 == 0.0 {
            return None;
        }

        let mut pressure = 1048576.0 - adc_p;
        pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        let var1 = f64::from(self.p9) * pressure * pressure / 2147483648.0;
        let var2 = pressure * f64::from(self.p8) / 32768.0;
        pressure += (var1 + var2 + f64::from(self.p7)) / 16.0;

        Some((temperature as f32, pressure as f32))
    }
}

/// Bosch BMP280 temperature / pressure sensor in normal mode.
pub struct Bmp280Sensor<I> {
    i2c: I,
    calibration: Bmp280Calibration,
}

impl<I: I2c> Bmp280Sensor<I> {
    /// Check the chip id, load the calibration and start normal mode.
    pub async fn new(mut i2c: I) -> Result<Self, SensorError> {
        let init_failed = |details: &'static str| SensorError::InitializationFailed {
            sensor: "BMP280",
            details,
        };

        let mut chip_id = [0u8; 1];
        i2c.write_read(ADDRESS, &[REG_CHIP_ID], &mut chip_id)
            .await
            .map_err(|e| {
                error!("BMP280 chip id read failed: {:?}", e);
                init_failed("I2C communication error or sensor not responding")
            })?;
        if chip_id[0] != CHIP_ID {
            error!("BMP280 unexpected chip id 0x{:02X}", chip_id[0]);
            return Err(init_failed("Unexpected chip id"));
        }

        let mut raw = [0u8; 24];
        i2c.write_read(ADDRESS, &[REG_CALIBRATION], &mut raw)
            .await
            .map_err(|e| {
                error!("BMP280 calibration read failed: {:?}", e);
                init_failed("Failed to read calibration data")
            })?;

        i2c.write(ADDRESS, &[REG_CONFIG, CONFIG, REG_CTRL_MEAS, CTRL_MEAS])
            .await
            .map_err(|e| {
                error!("BMP280 configuration failed: {:?}", e);
                init_failed("Failed to configure measurement mode")
            })?;

        info!("BMP280: normal mode started");
        Ok(Self {
            i2c,
            calibration: Bmp280Calibration::parse(&raw),
        })
    }
}

/// Split the six data registers into the 20-bit pressure and temperature ADC
/// values.
pub(crate) fn split_adc(data: &[u8; 6]) -> (i32, i32) {
    let raw20 = |msb: u8, lsb: u8, xlsb: u8| {
        (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
    };
    (
        raw20(data[0], data[1], data[2]),
        raw20(data[3], data[4], data[5]),
    )
}

impl<I: I2c> Sensor for Bmp280Sensor<I> {
    type Readings = BarometricReading;

    async fn read(&mut self) -> Result<BarometricReading, SensorError> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(ADDRESS, &[REG_DATA], &mut data)
            .await
            .map_err(|e| {
                error!("BMP280 measurement read failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: "BMP280",
                    operation: "read temperature/pressure",
                    details: "I2C communication error",
                }
            })?;

        let (adc_p, adc_t) = split_adc(&data);
        let (temperature_celsius, pressure_pa) = self
            .calibration
            .compensate(adc_t, adc_p)
            .ok_or(SensorError::ReadFailed {
                sensor: "BMP280",
                operation: "compensate pressure",
                details: "invalid calibration data",
            })?;

        let reading = BarometricReading {
            temperature_celsius,
            pressure_hpa: pressure_pa / 100.0,
        };
        debug!(
            "Temperature: {:.1} C | Air Pressure: {:.2} hPa",
            reading.temperature_celsius, reading.pressure_hpa
        );
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_i2c_bus::mock::MockI2c;
    use embassy_futures::block_on;

    /// Worked example from the datasheet
    const DATASHEET: Bmp280Calibration = Bmp280Calibration {
        t1: 27504,
        t2: 26435,
        t3: -1000,
        p1: 36477,
        p2: -10685,
        p3: 3024,
        p4: 2855,
        p5: 140,
        p6: -7,
        p7: 15500,
        p8: -14600,
        p9: 6000,
    };

    fn calibration_bytes(c: &Bmp280Calibration) -> [u8; 24] {
        let words = [
            c.t1 as i32, c.t2 as i32, c.t3 as i32, c.p1 as i32, c.p2 as i32, c.p3 as i32,
            c.p4 as i32, c.p5 as i32, c.p6 as i32, c.p7 as i32, c.p8 as i32, c.p9 as i32,
        ];
        let mut raw = [0u8; 24];
        for (i, word) in words.iter().enumerate() {
            raw[2 * i..2 * i + 2].copy_from_slice(&(*word as u16).to_le_bytes());
        }
        raw
    }

    #[test]
    fn test_datasheet_compensation() {
        let (temperature, pressure) = DATASHEET.compensate(519888, 415148).unwrap();
        assert!((temperature - 25.08).abs() < 0.01, "temperature {temperature}");
        assert!((pressure - 100653.27).abs() < 1.0, "pressure {pressure}");
    }

    #[test]
    fn test_parse_calibration_block() {
        assert_eq!(Bmp280Calibration::parse(&calibration_bytes(&DATASHEET)), DATASHEET);
    }

    #[test]
    fn test_zero_p1_is_rejected() {
        let broken = Bmp280Calibration { p1: 0, ..DATASHEET };
        assert_eq!(broken.compensate(519888, 415148), None);
    }

    #[test]
    fn test_split_adc() {
        // 415148 = 0x655AC, 519888 = 0x7EED0
        let data = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00];
        assert_eq!(split_adc(&data), (415148, 519888));
    }

    #[test]
    fn test_read_reports_hpa() {
        let bus = MockI2c::default()
            .respond(&[CHIP_ID])
            .respond(&calibration_bytes(&DATASHEET))
            .respond(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00]);
        let mut sensor = block_on(Bmp280Sensor::new(bus)).unwrap();

        let reading = block_on(sensor.read()).unwrap();
        assert!((reading.pressure_hpa - 1006.53).abs() < 0.01);
    }

    #[test]
    fn test_wrong_chip_id_fails_init() {
        let bus = MockI2c::default().respond(&[0x60]);
        assert!(matches!(
            block_on(Bmp280Sensor::new(bus)),
            Err(SensorError::InitializationFailed { sensor: "BMP280", .. })
        ));
    }
}
