//! Desktop simulator for the airmon air-quality monitor.
//!
//! Runs the device tasks from airmon-core on a single-threaded tokio runtime
//! against simulated peripherals: drifting sensor values, an LED strip that
//! logs its frames, an in-memory cloud device, a console fan and status LED,
//! and a network link that drops now and then.
//!
//! # Environment
//!
//! | Variable                     | Effect                                        |
//! |------------------------------|-----------------------------------------------|
//! | `RUST_LOG`                   | log filter, `info` by default                 |
//! | `AIRMON_WIFI_SSID`           | access point name shown in the logs           |
//! | `AIRMON_WIFI_PASSWORD`       | accepted for parity with the firmware         |
//! | `AIRMON_DEVICE_ID`           | cloud device id                               |
//! | `AIRMON_ACCESS_TOKEN`        | cloud access token                            |
//! | `AIRMON_SIM_SENSOR_FAULT`    | pretend sensor initialization failed          |
//! | `AIRMON_SIM_BAD_OFFSET`      | serve an out-of-range offset after a while    |

use std::time::Instant as WallClock;

use embassy_time::{Duration, Instant, Timer};
use embedded_graphics::pixelcolor::RgbColor;
use log::{debug, error, info, warn};

use airmon_core::app_state::{AppError, AppState, DeviceError, Readiness};
use airmon_core::cloud::{CloudClient, CloudError, DeviceStatus, StatusReport};
use airmon_core::config::{Cadence, CloudConfig, Config, DeviceConfig, InternetConfig, Offsets};
use airmon_core::fan::{FanActuator, FanState};
use airmon_core::led::{BufferedStrip, Color, Indicators, PixelSink, pixels};
use airmon_core::network::{NetworkError, NetworkLink};
use airmon_core::sensors::{
    BarometricReading, ClimateReading, ParticulateReading, Sensor, SensorError, SensorSuite,
    VocReading,
};
use airmon_core::tasks::{
    StatusContext, StatusLed, heartbeat_task, network_task, presentation_task, sampling_task,
    status_task,
};

/// Timings shortened so a full startup takes seconds rather than a minute.
const SIMULATED: Cadence = Cadence {
    sensor_startup_delay: Duration::from_secs(2),
    fan_settle_delay: Duration::from_secs(6),
    sample_interval: Duration::from_secs(2),
    warmup_interval: Duration::from_secs(1),
    status_interval: Duration::from_secs(1),
    config_every: 5,
    push_every: 5,
    readiness_poll: Duration::from_millis(100),
    lock_max_wait: Duration::from_secs(1),
    network_check_interval: Duration::from_secs(2),
    heartbeat_period: Duration::from_millis(1000),
    fault_blink_period: Duration::from_millis(500),
    particulate_saturation: 1000,
};

/// Status fetches between remote fan speed changes.
const FAN_FLIP_EVERY: u32 = 20;

/// Network checks between simulated link drops.
const LINK_DROP_EVERY: u32 = 15;

// ---------------------------------------------------------------------------
// Simulated sensors
// ---------------------------------------------------------------------------

/// Slowly drifting value around `base`.
fn drift(started: WallClock, base: f64, amplitude: f64, period_secs: f64) -> f64 {
    let t = started.elapsed().as_secs_f64();
    base + amplitude * (t / period_secs).sin()
}

struct SimParticulate {
    started: WallClock,
}

impl Sensor for SimParticulate {
    type Readings = ParticulateReading;

    async fn read(&mut self) -> Result<ParticulateReading, SensorError> {
        // Peaks above the saturation threshold once per cycle
        let pm2_5 = drift(self.started, 500.0, 600.0, 40.0).max(0.0);
        Ok(ParticulateReading {
            pm2_5_ug_m3: pm2_5 as i32,
        })
    }
}

struct SimClimate {
    started: WallClock,
}

impl Sensor for SimClimate {
    type Readings = ClimateReading;

    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        Ok(ClimateReading {
            temperature_celsius: drift(self.started, 23.0, 6.0, 30.0) as f32,
            humidity_percent: drift(self.started, 50.0, 15.0, 45.0) as i32,
        })
    }
}

struct SimBarometer {
    started: WallClock,
}

impl Sensor for SimBarometer {
    type Readings = BarometricReading;

    async fn read(&mut self) -> Result<BarometricReading, SensorError> {
        Ok(BarometricReading {
            temperature_celsius: drift(self.started, 24.0, 5.0, 30.0) as f32,
            pressure_hpa: drift(self.started, 1013.25, 8.0, 120.0) as f32,
        })
    }
}

/// VOC sensor that misses every fifth reading.
struct SimVoc {
    started: WallClock,
    reads: u32,
}

impl Sensor for SimVoc {
    type Readings = VocReading;

    async fn read(&mut self) -> Result<VocReading, SensorError> {
        self.reads += 1;
        if self.reads % 5 == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "AGS02MA",
                operation: "read TVOC",
                details: "simulated bus error",
            });
        }
        Ok(VocReading {
            tvoc_ppb: drift(self.started, 150.0, 100.0, 60.0) as i32,
        })
    }
}

// ---------------------------------------------------------------------------
// Simulated actuators and indicators
// ---------------------------------------------------------------------------

/// Pixel sink that logs a frame whenever it differs from the previous one.
#[derive(Default)]
struct ConsoleStrip {
    last: Option<[Color; pixels::STRIP_LEN]>,
}

impl PixelSink for ConsoleStrip {
    fn write(&mut self, frame: &[Color]) -> Result<(), DeviceError> {
        let mut current = [Color::BLACK; pixels::STRIP_LEN];
        current.copy_from_slice(frame);
        if self.last == Some(current) {
            return Ok(());
        }
        self.last = Some(current);

        let rendered: Vec<String> = current
            .iter()
            .map(|c| {
                if *c == Color::BLACK {
                    String::from("  .   ")
                } else {
                    format!("{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
                }
            })
            .collect();
        info!("strip [{}]", rendered.join(" "));
        Ok(())
    }
}

struct ConsoleFan;

impl FanActuator for ConsoleFan {
    fn on(&mut self) -> Result<(), DeviceError> {
        info!("fan: on");
        Ok(())
    }

    fn off(&mut self) -> Result<(), DeviceError> {
        info!("fan: off");
        Ok(())
    }
}

#[derive(Default)]
struct ConsoleLed {
    lit: bool,
}

impl StatusLed for ConsoleLed {
    fn toggle(&mut self) -> Result<(), DeviceError> {
        self.lit = !self.lit;
        debug!("status led: {}", if self.lit { "on" } else { "off" });
        Ok(())
    }
}

/// Link that drops every [`LINK_DROP_EVERY`] checks and takes a moment to
/// come back.
struct FlakyLink {
    ssid: String,
    checks: u32,
    connected: bool,
}

impl NetworkLink for FlakyLink {
    fn is_connected(&mut self) -> bool {
        self.checks += 1;
        if self.checks % LINK_DROP_EVERY == 0 {
            warn!("network: simulated link drop");
            self.connected = false;
        }
        self.connected
    }

    async fn reconnect(&mut self) -> Result<(), NetworkError> {
        info!("network: associating with {}", self.ssid);
        Timer::after(Duration::from_millis(300)).await;
        self.connected = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory cloud device
// ---------------------------------------------------------------------------

struct InMemoryCloud {
    device_id: String,
    status_requests: u32,
    config_requests: u32,
    /// Config fetch after which an out-of-range offset is served
    bad_offset_after: Option<u32>,
}

impl CloudClient for InMemoryCloud {
    async fn get_status(&mut self) -> Result<DeviceStatus, CloudError> {
        self.status_requests += 1;
        let n = self.status_requests;

        // Brightness level ramps 0..=100 and wraps
        let level = ((n * 7) % 101) as i32;
        let fan_speed = if (n / FAN_FLIP_EVERY) % 2 == 0 { 2 } else { 0 };
        Ok(DeviceStatus { level, fan_speed })
    }

    async fn get_config(&mut self) -> Result<DeviceConfig, CloudError> {
        self.config_requests += 1;
        if self.config_requests % 4 == 0 {
            return Err(CloudError::Status(503));
        }

        let temperature = match self.bad_offset_after {
            Some(after) if self.config_requests > after => 250.0,
            _ => -0.5,
        };
        Ok(DeviceConfig {
            offsets: Offsets {
                temperature,
                humidity: 2,
                ..Offsets::ZERO
            },
            ..DeviceConfig::DEFAULT
        })
    }

    async fn push_status(&mut self, report: &StatusReport) -> Result<(), CloudError> {
        info!("cloud[{}] <- {:?}", self.device_id, report);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Supervision
// ---------------------------------------------------------------------------

/// Run a task to completion; an unrecoverable error ends the process the way
/// a restart ends the firmware.
async fn supervise<T>(name: &str, task: impl Future<Output = Result<T, AppError>>) {
    if let Err(e) = task.await {
        error!("{} task failed: {}; restarting", name, e);
        std::process::exit(1);
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let ssid = env_or("AIRMON_WIFI_SSID", "simulated-ap");
    let password = env_or("AIRMON_WIFI_PASSWORD", "");
    let device_id = env_or("AIRMON_DEVICE_ID", "00000000-0000-0000-0000-000000000000");
    let access_token = env_or("AIRMON_ACCESS_TOKEN", "simulated-token");
    let config = Config {
        internet: InternetConfig {
            ssid: &ssid,
            password: &password,
        },
        cloud: CloudConfig {
            device_id: &device_id,
            access_token: &access_token,
        },
    };
    info!(
        "Starting airmon simulator as device {} on {}",
        config.cloud.device_id, config.internet.ssid
    );

    let state = AppState::new(SIMULATED, FanState::started(Instant::now()));
    let indicators = Indicators::new(
        BufferedStrip::<_, { pixels::STRIP_LEN }>::new(ConsoleStrip::default(), 8),
        SIMULATED.lock_max_wait,
    );
    let mut status_led = ConsoleLed::default();

    if std::env::var_os("AIRMON_SIM_SENSOR_FAULT").is_some() {
        error!("Simulated sensor initialization failure");
        state.readiness.mark(Readiness::SensorInitFailed);
        tokio::join!(
            heartbeat_task(&state, &mut status_led),
            supervise("presentation", presentation_task(&state, &indicators)),
        );
        return;
    }

    let started = WallClock::now();
    let mut sensors = SensorSuite {
        particulate: SimParticulate { started },
        climate: SimClimate { started },
        barometer: SimBarometer { started },
        voc: SimVoc { started, reads: 0 },
    };
    let mut cloud = InMemoryCloud {
        device_id: config.cloud.device_id.to_owned(),
        status_requests: 0,
        config_requests: 0,
        bad_offset_after: std::env::var_os("AIRMON_SIM_BAD_OFFSET").map(|_| 6),
    };
    let mut fan = ConsoleFan;
    let mut link = FlakyLink {
        ssid: config.internet.ssid.to_owned(),
        checks: 0,
        connected: true,
    };

    let sensors_started = Instant::now();
    tokio::join!(
        heartbeat_task(&state, &mut status_led),
        supervise("presentation", presentation_task(&state, &indicators)),
        supervise(
            "sampling",
            sampling_task(&state, &mut sensors, &indicators, sensors_started),
        ),
        supervise(
            "status",
            status_task(StatusContext {
                state: &state,
                cloud: &mut cloud,
                fan: &mut fan,
                indicators: &indicators,
            }),
        ),
        network_task(&state, &mut link),
    );
}
