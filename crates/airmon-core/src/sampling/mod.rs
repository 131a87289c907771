//! Sensor sample aggregation
//!
//! Raw readings from one sampling cycle are folded into one [`SampleWindow`]
//! per measured quantity. The sampling task owns the windows; other tasks only
//! ever see the [`Averages`] snapshot it publishes.

mod window;

pub use window::*;

use log::info;

use crate::config::{Offsets, PARTICULATE_SATURATED};

/// One cycle's worth of sensor values. `None` means the read failed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawReadings {
    pub fine_dust: Option<i32>,
    pub temperature: Option<f32>,
    pub humidity: Option<i32>,
    pub tvoc: Option<i32>,
    pub temperature2: Option<f32>,
    pub pressure: Option<f32>,
}

/// Latest window averages. `None` means the window is not valid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Averages {
    /// PM2.5 in ug/m3
    pub fine_dust: Option<i32>,
    /// AHT20 temperature in degC
    pub temperature: Option<f32>,
    /// Relative humidity in %
    pub humidity: Option<i32>,
    /// TVOC in ppb
    pub tvoc: Option<i32>,
    /// BMP280 temperature in degC
    pub temperature2: Option<f32>,
    /// Pressure in hPa
    pub pressure: Option<f32>,
}

impl Averages {
    pub const UNKNOWN: Self = Self {
        fine_dust: None,
        temperature: None,
        humidity: None,
        tvoc: None,
        temperature2: None,
        pressure: None,
    };
}

/// Folds a window with a reading: a missing reading discards the history.
fn fold_into<T: Sample, const N: usize>(window: &mut SampleWindow<T, N>, reading: Option<T>) {
    match reading {
        Some(value) => window.write(value),
        None => window.invalidate(),
    }
}

/// The six averaging windows of the device.
#[derive(Debug, Clone, Default)]
pub struct SampleWindows<const N: usize> {
    fine_dust: SampleWindow<i32, N>,
    temperature: SampleWindow<f32, N>,
    humidity: SampleWindow<i32, N>,
    tvoc: SampleWindow<i32, N>,
    temperature2: SampleWindow<f32, N>,
    pressure: SampleWindow<f32, N>,
}

impl<const N: usize> SampleWindows<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install calibration offsets. Particulate has none.
    pub fn apply_offsets(&mut self, offsets: &Offsets) {
        self.temperature.set_offset(offsets.temperature);
        self.humidity.set_offset(offsets.humidity);
        self.tvoc.set_offset(offsets.tvoc);
        self.temperature2.set_offset(offsets.temperature2);
        self.pressure.set_offset(offsets.pressure);
    }

    /// Fold one cycle of readings into the windows.
    ///
    /// The particulate reading is discarded while the fan has not settled, and
    /// anything above `saturation` is recorded as [`PARTICULATE_SATURATED`].
    pub fn fold(&mut self, readings: &RawReadings, particulate_settled: bool, saturation: i32) {
        let fine_dust = match readings.fine_dust {
            _ if !particulate_settled => None,
            Some(value) if value > saturation => {
                info!("Too high particulate value ({} ug/m3) detected", value);
                Some(PARTICULATE_SATURATED)
            }
            other => other,
        };

        fold_into(&mut self.fine_dust, fine_dust);
        fold_into(&mut self.temperature, readings.temperature);
        fold_into(&mut self.humidity, readings.humidity);
        fold_into(&mut self.tvoc, readings.tvoc);
        fold_into(&mut self.temperature2, readings.temperature2);
        fold_into(&mut self.pressure, readings.pressure);
    }

    pub fn averages(&self) -> Averages {
        Averages {
            fine_dust: self.fine_dust.average(),
            temperature: self.temperature.average(),
            humidity: self.humidity.average(),
            tvoc: self.tvoc.average(),
            temperature2: self.temperature2.average(),
            pressure: self.pressure.average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SATURATION: i32 = 1000;

    fn readings(fine_dust: i32) -> RawReadings {
        RawReadings {
            fine_dust: Some(fine_dust),
            temperature: Some(21.5),
            humidity: Some(45),
            tvoc: Some(120),
            temperature2: Some(22.0),
            pressure: Some(1013.0),
        }
    }

    #[test]
    fn test_unknown_until_window_filled() {
        let mut windows = SampleWindows::<3>::new();
        windows.fold(&readings(10), true, SATURATION);
        windows.fold(&readings(20), true, SATURATION);
        assert_eq!(windows.averages(), Averages::UNKNOWN);

        windows.fold(&readings(30), true, SATURATION);
        let averages = windows.averages();
        assert_eq!(averages.fine_dust, Some(20));
        assert_eq!(averages.humidity, Some(45));
        assert_eq!(averages.pressure, Some(1013.0));
    }

    #[test]
    fn test_saturated_particulate_is_clamped() {
        let mut windows = SampleWindows::<3>::new();
        for _ in 0..3 {
            windows.fold(&readings(9999), true, SATURATION);
        }
        assert_eq!(windows.averages().fine_dust, Some(PARTICULATE_SATURATED));
    }

    #[test]
    fn test_unsettled_fan_invalidates_particulate_only() {
        let mut windows = SampleWindows::<3>::new();
        for _ in 0..3 {
            windows.fold(&readings(12), true, SATURATION);
        }
        windows.fold(&readings(12), false, SATURATION);

        let averages = windows.averages();
        assert_eq!(averages.fine_dust, None);
        assert_eq!(averages.tvoc, Some(120));
    }

    #[test]
    fn test_failed_read_invalidates_that_window() {
        let mut windows = SampleWindows::<3>::new();
        for _ in 0..3 {
            windows.fold(&readings(5), true, SATURATION);
        }
        let failed = RawReadings {
            temperature: None,
            humidity: None,
            ..readings(5)
        };
        windows.fold(&failed, true, SATURATION);

        let averages = windows.averages();
        assert_eq!(averages.temperature, None);
        assert_eq!(averages.humidity, None);
        assert_eq!(averages.temperature2, Some(22.0));
        assert_eq!(averages.fine_dust, Some(5));
    }

    #[test]
    fn test_offsets_apply_to_matching_windows() {
        let mut windows = SampleWindows::<3>::new();
        windows.apply_offsets(&Offsets {
            temperature: 1.5,
            humidity: -5,
            tvoc: 10,
            temperature2: -2.0,
            pressure: 3.0,
        });
        for _ in 0..3 {
            windows.fold(&readings(40), true, SATURATION);
        }

        let averages = windows.averages();
        assert_eq!(averages.fine_dust, Some(40));
        assert_eq!(averages.temperature, Some(23.0));
        assert_eq!(averages.humidity, Some(40));
        assert_eq!(averages.tvoc, Some(130));
        assert_eq!(averages.temperature2, Some(20.0));
        assert_eq!(averages.pressure, Some(1016.0));
    }
}
