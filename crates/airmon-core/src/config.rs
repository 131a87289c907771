//! Build-time credentials, task cadence and the remotely managed device
//! configuration.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Number of samples each averaging window holds.
pub const SAMPLE_WINDOW: usize = 3;

/// Largest calibration offset magnitude accepted from the cloud.
pub const MAX_OFFSET_MAGNITUDE: f32 = 100.0;

/// Value written into the particulate window when a reading is saturated.
pub const PARTICULATE_SATURATED: i32 = i32::MAX;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub cloud: CloudConfig<'a>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CloudConfig<'a> {
    /// SmartThings device the firmware reports as
    pub device_id: &'a str,
    /// Bearer token scoped to that device
    pub access_token: &'a str,
}

/// Timing of every periodic task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    /// Time the sensors need after power-up before their first reading
    pub sensor_startup_delay: Duration,
    /// Time the particulate sensor needs after a fan state change
    pub fan_settle_delay: Duration,
    /// Steady-state sampling period
    pub sample_interval: Duration,
    /// Sampling period while the windows are being filled
    pub warmup_interval: Duration,
    /// Status reconciliation period
    pub status_interval: Duration,
    /// Configuration is fetched every `config_every` status cycles
    pub config_every: u32,
    /// Averages are pushed every `push_every` status cycles
    pub push_every: u32,
    /// Poll interval while waiting on another task's readiness bit
    pub readiness_poll: Duration,
    /// Upper bound on any lock acquisition
    pub lock_max_wait: Duration,
    /// Network health check period
    pub network_check_interval: Duration,
    /// Status LED toggle period
    pub heartbeat_period: Duration,
    /// Status LED toggle period once sensor initialization failed
    pub fault_blink_period: Duration,
    /// Particulate readings above this many ug/m3 are treated as saturated
    pub particulate_saturation: i32,
}

impl Cadence {
    pub const DEFAULT: Self = Self {
        sensor_startup_delay: Duration::from_secs(5),
        fan_settle_delay: Duration::from_secs(30),
        sample_interval: Duration::from_secs(10),
        warmup_interval: Duration::from_secs(3),
        status_interval: Duration::from_secs(5),
        config_every: 12,
        push_every: 12,
        readiness_poll: Duration::from_millis(250),
        lock_max_wait: Duration::from_secs(5),
        network_check_interval: Duration::from_secs(2),
        heartbeat_period: Duration::from_millis(1000),
        fault_blink_period: Duration::from_millis(500),
        particulate_saturation: 1000,
    };
}

impl Default for Cadence {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Calibration offsets, one per averaged quantity except particulate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offsets {
    pub temperature: f32,
    pub humidity: i32,
    pub tvoc: i32,
    pub temperature2: f32,
    pub pressure: f32,
}

impl Offsets {
    pub const ZERO: Self = Self {
        temperature: 0.0,
        humidity: 0,
        tvoc: 0,
        temperature2: 0.0,
        pressure: 0.0,
    };

    /// First offset whose magnitude exceeds [`MAX_OFFSET_MAGNITUDE`].
    pub fn first_implausible(&self) -> Option<(&'static str, f32)> {
        let fields = [
            ("temperature", self.temperature),
            ("humidity", self.humidity as f32),
            ("tvoc", self.tvoc as f32),
            ("temperature2", self.temperature2),
            ("pressure", self.pressure),
        ];

        fields
            .into_iter()
            .find(|&(_, value)| !(-MAX_OFFSET_MAGNITUDE..=MAX_OFFSET_MAGNITUDE).contains(&value))
    }
}

/// Thresholds and offsets managed from the cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    pub temp_high: i32,
    pub temp_low: i32,
    pub humidity_high: i32,
    pub humidity_low: i32,
    pub fine_dust_very_bad: i32,
    pub fine_dust_bad: i32,
    pub fine_dust_warning: i32,
    pub fine_dust_normal: i32,
    /// Strip brightness when the remote level is high
    pub illuminance_high: u8,
    /// Strip brightness when the remote level is low
    pub illuminance_low: u8,
    pub offsets: Offsets,
}

impl DeviceConfig {
    /// Configuration used until the first successful fetch.
    pub const DEFAULT: Self = Self {
        temp_high: 27,
        temp_low: 18,
        humidity_high: 60,
        humidity_low: 40,
        fine_dust_very_bad: 150,
        fine_dust_bad: 100,
        fine_dust_warning: 50,
        fine_dust_normal: 15,
        illuminance_high: 5,
        illuminance_low: 3,
        offsets: Offsets::ZERO,
    };
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offsets_are_plausible() {
        assert_eq!(DeviceConfig::DEFAULT.offsets.first_implausible(), None);
    }

    #[test]
    fn test_out_of_range_temperature_offset() {
        let offsets = Offsets {
            temperature: 150.0,
            ..Offsets::ZERO
        };
        assert_eq!(offsets.first_implausible(), Some(("temperature", 150.0)));
    }

    #[test]
    fn test_offset_bounds_are_inclusive() {
        let offsets = Offsets {
            humidity: 100,
            tvoc: -100,
            pressure: -100.0,
            ..Offsets::ZERO
        };
        assert_eq!(offsets.first_implausible(), None);

        let offsets = Offsets {
            tvoc: -101,
            ..Offsets::ZERO
        };
        assert_eq!(offsets.first_implausible(), Some(("tvoc", -101.0)));
    }

    #[test]
    fn test_nan_offset_is_implausible() {
        let offsets = Offsets {
            temperature2: f32::NAN,
            ..Offsets::ZERO
        };
        assert_eq!(offsets.first_implausible().map(|(name, _)| name), Some("temperature2"));
    }
}
