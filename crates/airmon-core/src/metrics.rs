//! Indicator color selection
//!
//! Maps the averaged readings onto indicator colors using the thresholds of
//! the current [`DeviceConfig`]. An unknown average always turns its
//! indicator off.

use crate::config::DeviceConfig;
use crate::led::{Color, colors};
use crate::sampling::Averages;

/// Comfort band of a temperature or humidity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComfortLevel {
    TooLow,
    Comfortable,
    TooHigh,
}

impl ComfortLevel {
    /// Above `high` is too high; `low` itself is still comfortable.
    pub fn assess<T: PartialOrd>(value: T, low: T, high: T) -> Self {
        if value > high {
            Self::TooHigh
        } else if value >= low {
            Self::Comfortable
        } else {
            Self::TooLow
        }
    }

    pub const fn color(self) -> Color {
        match self {
            Self::TooLow => colors::BLUE,
            Self::Comfortable => colors::GREEN,
            Self::TooHigh => colors::RED,
        }
    }
}

/// Particulate pollution band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DustLevel {
    Clean,
    Normal,
    Warning,
    Bad,
    VeryBad,
    /// Above the sensor's usable range
    Saturated,
}

impl DustLevel {
    /// Saturation wins over every configured band; bands are inclusive at
    /// their lower edge.
    pub fn assess(value: i32, config: &DeviceConfig, saturation: i32) -> Self {
        if value > saturation {
            Self::Saturated
        } else if value >= config.fine_dust_very_bad {
            Self::VeryBad
        } else if value >= config.fine_dust_bad {
            Self::Bad
        } else if value >= config.fine_dust_warning {
            Self::Warning
        } else if value >= config.fine_dust_normal {
            Self::Normal
        } else {
            Self::Clean
        }
    }

    pub const fn color(self) -> Color {
        match self {
            Self::Clean => colors::BLUE,
            Self::Normal => colors::GREEN,
            Self::Warning => colors::YELLOW,
            Self::Bad => colors::ORANGE,
            Self::VeryBad => colors::RED,
            Self::Saturated => colors::WHITE,
        }
    }
}

/// Colors of the three measurement indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorColors {
    pub temperature: Color,
    pub humidity: Color,
    pub fine_dust: Color,
}

impl IndicatorColors {
    pub fn select(averages: &Averages, config: &DeviceConfig, saturation: i32) -> Self {
        let temperature = averages.temperature.map_or(colors::OFF, |t| {
            ComfortLevel::assess(t, config.temp_low as f32, config.temp_high as f32).color()
        });
        let humidity = averages.humidity.map_or(colors::OFF, |h| {
            ComfortLevel::assess(h, config.humidity_low, config.humidity_high).color()
        });
        let fine_dust = averages.fine_dust.map_or(colors::OFF, |d| {
            DustLevel::assess(d, config, saturation).color()
        });

        Self {
            temperature,
            humidity,
            fine_dust,
        }
    }
}

/// Strip brightness for a remote switch level (0..=100).
pub fn brightness_for_level(level: i32, config: &DeviceConfig) -> u8 {
    if level >= 70 {
        config.illuminance_high
    } else if level >= 30 {
        config.illuminance_low
    } else {
        0
    }
}
