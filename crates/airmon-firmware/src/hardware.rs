//! Board peripherals of the airmon device
//!
//! Creates the sensor buses, brings the four sensors up in order and adapts
//! the GPIO and RMT peripherals to the traits the device tasks drive.

use airmon_core::app_state::DeviceError;
use airmon_core::async_i2c_bus::SharedI2cDevice;
use airmon_core::fan::FanActuator;
use airmon_core::led::{BufferedStrip, Color, Indicators, PixelSink, pixels};
use airmon_core::sensors::{
    Ags02maSensor, Aht20Sensor, Bmp280Sensor, Pm1006Sensor, SensorError, SensorSuite,
};
use airmon_core::tasks::StatusLed;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::Duration;
use embedded_graphics::pixelcolor::RgbColor;
use esp_hal::gpio::Output;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::{Async, Blocking};
use esp_hal_smartled::Ws2812SmartLeds;
use log::{error, info};
use smart_leds::{RGB8, SmartLedsWrite};

/// RMT pulses per strip refresh: 24 bits per pixel plus the end marker.
pub const STRIP_BUFFER_SIZE: usize = pixels::STRIP_LEN * 24 + 1;

const PM1006_BAUD_RATE: u32 = 9600;
const PM1006_TIMEOUT: Duration = Duration::from_secs(1);

pub type SensorBus = AsyncMutex<CriticalSectionRawMutex, I2c<'static, Async>>;
pub type BusDevice = SharedI2cDevice<'static, CriticalSectionRawMutex, I2c<'static, Async>>;

pub type BoardSensors = SensorSuite<
    Pm1006Sensor<Uart<'static, Async>>,
    Aht20Sensor<BusDevice>,
    Bmp280Sensor<BusDevice>,
    Ags02maSensor<BusDevice>,
>;

pub type BoardStrip = BufferedStrip<Ws2812Sink, { pixels::STRIP_LEN }>;
pub type BoardIndicators = Indicators<BoardStrip>;

/// Create the sensor I2C bus at 100 kHz.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO8<'static>,
    scl: esp_hal::peripherals::GPIO9<'static>,
) -> Result<I2c<'static, Async>, SensorError> {
    let bus = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .map_err(|e| {
        error!("I2C configuration rejected: {:?}", e);
        SensorError::InitializationFailed {
            sensor: "I2C bus",
            details: "invalid configuration",
        }
    })?;

    Ok(bus.with_sda(sda).with_scl(scl).into_async())
}

/// Create the PM1006 UART.
pub fn create_pm1006_uart(
    uart1: esp_hal::peripherals::UART1<'static>,
    tx: esp_hal::peripherals::GPIO17<'static>,
    rx: esp_hal::peripherals::GPIO18<'static>,
) -> Result<Uart<'static, Async>, SensorError> {
    let uart = Uart::new(uart1, UartConfig::default().with_baudrate(PM1006_BAUD_RATE)).map_err(
        |e| {
            error!("UART configuration rejected: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "PM1006",
                details: "invalid UART configuration",
            }
        },
    )?;

    Ok(uart.with_tx(tx).with_rx(rx).into_async())
}

/// Bring up every sensor; the first failure aborts.
pub async fn init_sensors(
    bus: &'static SensorBus,
    uart: Uart<'static, Async>,
) -> Result<BoardSensors, SensorError> {
    info!("Initializing PM1006...");
    let particulate = Pm1006Sensor::new(uart, PM1006_TIMEOUT);

    info!("Initializing AHT20...");
    let climate = Aht20Sensor::new(SharedI2cDevice::new(bus)).await?;

    info!("Initializing BMP280...");
    let barometer = Bmp280Sensor::new(SharedI2cDevice::new(bus)).await?;

    info!("Initializing AGS02MA...");
    let voc = Ags02maSensor::new(SharedI2cDevice::new(bus)).await?;

    info!("Sensors ready");
    Ok(SensorSuite {
        particulate,
        climate,
        barometer,
        voc,
    })
}

/// WS2812 strip driven over RMT.
pub struct Ws2812Sink {
    driver: Ws2812SmartLeds<'static, STRIP_BUFFER_SIZE, Blocking>,
}

impl Ws2812Sink {
    pub fn new(driver: Ws2812SmartLeds<'static, STRIP_BUFFER_SIZE, Blocking>) -> Self {
        Self { driver }
    }
}

impl PixelSink for Ws2812Sink {
    fn write(&mut self, frame: &[Color]) -> Result<(), DeviceError> {
        let pixels = frame.iter().map(|c| RGB8::new(c.r(), c.g(), c.b()));
        self.driver.write(pixels).map_err(|e| {
            error!("WS2812 write failed: {:?}", e);
            DeviceError::Rejected {
                device: "WS2812 strip",
            }
        })
    }
}

/// Particulate sensor fan on a switched GPIO.
pub struct FanPin(pub Output<'static>);

impl FanActuator for FanPin {
    fn on(&mut self) -> Result<(), DeviceError> {
        self.0.set_high();
        Ok(())
    }

    fn off(&mut self) -> Result<(), DeviceError> {
        self.0.set_low();
        Ok(())
    }
}

/// On-board status LED.
pub struct StatusPin(pub Output<'static>);

impl StatusLed for StatusPin {
    fn toggle(&mut self) -> Result<(), DeviceError> {
        self.0.toggle();
        Ok(())
    }
}
