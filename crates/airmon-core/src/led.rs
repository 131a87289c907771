//! WS2812 indicator strip
//!
//! The strip is shared by the presentation, sampling and status tasks. Pixel
//! state is kept in a [`PixelBuffer`] and pushed to the hardware through a
//! [`PixelSink`] only on refresh.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::{Duration, with_timeout};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::WebColors;

use crate::app_state::{AppError, DeviceError};

pub type Color = Rgb888;

pub mod colors {
    use super::*;

    pub const OFF: Color = Rgb888::BLACK;
    pub const RED: Color = Rgb888::CSS_RED;
    // CSS "green" is half intensity
    pub const GREEN: Color = Rgb888::CSS_LIME;
    pub const BLUE: Color = Rgb888::CSS_BLUE;
    pub const YELLOW: Color = Rgb888::CSS_YELLOW;
    pub const ORANGE: Color = Rgb888::CSS_ORANGE;
    pub const WHITE: Color = Rgb888::CSS_WHITE;
}

/// Pixel positions on the strip.
pub mod pixels {
    pub const STRIP_LEN: usize = 8;
    /// Pixels used by the startup sweep and the error flash
    pub const SWEEP_LEN: usize = 7;

    pub const FINE_DUST: usize = 0;
    pub const TEMPERATURE: usize = 2;
    pub const HUMIDITY: usize = 4;
    /// Red while the last cloud exchange failed
    pub const BOTTOM: usize = 7;
}

/// Highest global brightness level; channels are rendered at full scale.
pub const MAX_BRIGHTNESS: u8 = 8;

/// Strip operations the tasks rely on.
pub trait LedStrip {
    fn set_color(&mut self, index: usize, color: Color, auto_refresh: bool)
    -> Result<(), DeviceError>;
    fn set_brightness(&mut self, level: u8) -> Result<(), DeviceError>;
    fn refresh(&mut self) -> Result<(), DeviceError>;
}

/// Destination of rendered pixels, i.e. the strip driver.
pub trait PixelSink {
    fn write(&mut self, pixels: &[Color]) -> Result<(), DeviceError>;
}

/// Logical pixel colors plus a global brightness level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer<const N: usize> {
    pixels: [Color; N],
    brightness: u8,
}

impl<const N: usize> PixelBuffer<N> {
    pub const fn new(brightness: u8) -> Self {
        Self {
            pixels: [colors::OFF; N],
            brightness,
        }
    }

    pub fn set(&mut self, index: usize, color: Color) -> Result<(), DeviceError> {
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(DeviceError::Rejected { device: "LED strip" })?;
        *pixel = color;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Color> {
        self.pixels.get(index).copied()
    }

    pub fn set_brightness(&mut self, level: u8) -> Result<(), DeviceError> {
        if level > MAX_BRIGHTNESS {
            return Err(DeviceError::Rejected { device: "LED strip" });
        }
        self.brightness = level;
        Ok(())
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Pixels as sent to the strip: each channel shifted right by
    /// `MAX_BRIGHTNESS - brightness`.
    pub fn rendered(&self) -> [Color; N] {
        let shift = u32::from(MAX_BRIGHTNESS - self.brightness);
        let scale = |channel: u8| channel.checked_shr(shift).unwrap_or(0);

        self.pixels
            .map(|pixel| Rgb888::new(scale(pixel.r()), scale(pixel.g()), scale(pixel.b())))
    }
}

/// [`LedStrip`] over a [`PixelSink`], rendering the buffer on refresh.
pub struct BufferedStrip<S, const N: usize> {
    sink: S,
    buffer: PixelBuffer<N>,
}

impl<S: PixelSink, const N: usize> BufferedStrip<S, N> {
    pub const fn new(sink: S, brightness: u8) -> Self {
        Self {
            sink,
            buffer: PixelBuffer::new(brightness),
        }
    }

    pub fn buffer(&self) -> &PixelBuffer<N> {
        &self.buffer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: PixelSink, const N: usize> LedStrip for BufferedStrip<S, N> {
    fn set_color(
        &mut self,
        index: usize,
        color: Color,
        auto_refresh: bool,
    ) -> Result<(), DeviceError> {
        self.buffer.set(index, color)?;
        if auto_refresh {
            self.refresh()?;
        }
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DeviceError> {
        self.buffer.set_brightness(level)?;
        self.refresh()
    }

    fn refresh(&mut self) -> Result<(), DeviceError> {
        self.sink.write(&self.buffer.rendered())
    }
}

/// Strip shared between tasks.
///
/// Lock waits are bounded like the shared cells; a strip failure is
/// unrecoverable.
pub struct Indicators<L> {
    max_wait: Duration,
    strip: AsyncMutex<CriticalSectionRawMutex, L>,
}

impl<L: LedStrip> Indicators<L> {
    pub fn new(strip: L, max_wait: Duration) -> Self {
        Self {
            max_wait,
            strip: AsyncMutex::new(strip),
        }
    }

    /// Run `f` with exclusive access to the strip.
    pub async fn with<R>(
        &self,
        f: impl FnOnce(&mut L) -> Result<R, DeviceError>,
    ) -> Result<R, AppError> {
        let mut strip = with_timeout(self.max_wait, self.strip.lock())
            .await
            .map_err(|_| {
                log::error!(
                    "strip: lock not acquired within {} ms",
                    self.max_wait.as_millis()
                );
                AppError::LockTimeout { cell: "strip" }
            })?;

        f(&mut strip).map_err(|e| {
            log::error!("LED strip failure: {}", e);
            AppError::Indicator(e)
        })
    }

    /// Bottom pixel: red after a failed cloud exchange, off after a good one.
    pub async fn show_exchange_result(&self, ok: bool) -> Result<(), AppError> {
        let color = if ok { colors::OFF } else { colors::RED };
        self.with(|strip| strip.set_color(pixels::BOTTOM, color, true))
            .await
    }

    pub async fn set_brightness(&self, level: u8) -> Result<(), AppError> {
        self.with(|strip| strip.set_brightness(level)).await
    }

    /// Set every sweep pixel to `color` and refresh.
    pub async fn fill_sweep(&self, color: Color) -> Result<(), AppError> {
        self.with(|strip| {
            for index in 0..pixels::SWEEP_LEN {
                strip.set_color(index, color, false)?;
            }
            strip.refresh()
        })
        .await
    }
}
