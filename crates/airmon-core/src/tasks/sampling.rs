use core::convert::Infallible;

use embassy_time::{Instant, Timer};
use log::{debug, info};

use super::show_measurements;
use crate::app_state::{AppError, AppState, Readiness};
use crate::config::SAMPLE_WINDOW;
use crate::led::{Indicators, LedStrip};
use crate::sampling::SampleWindows;
use crate::sensors::SensorSource;

/// Cycles run at the short warm-up interval before the windows are full.
pub const WARMUP_CYCLES: usize = SAMPLE_WINDOW - 1;

/// Periodically read the sensors, fold the readings into the averaging windows
/// and publish the averages.
///
/// `sensors_started` is when sensor initialization finished; the first
/// reading is taken no earlier than `sensor_startup_delay` after it.
pub async fn sampling_task<S: SensorSource, L: LedStrip>(
    state: &AppState,
    sensors: &mut S,
    indicators: &Indicators<L>,
    sensors_started: Instant,
) -> Result<Infallible, AppError> {
    let cadence = state.cadence;

    info!("Waiting for sensors to initialize");
    Timer::at(sensors_started + cadence.sensor_startup_delay).await;

    if let Some(settled_at) = state.fan_state().settled_at(cadence.fan_settle_delay) {
        info!("Waiting for the particulate sensor fan");
        Timer::at(settled_at).await;
    }

    let mut windows = SampleWindows::<SAMPLE_WINDOW>::new();
    let mut warmup_left = WARMUP_CYCLES;
    let mut next_wake = Instant::now();

    loop {
        let config = state.config.snapshot().await?;
        windows.apply_offsets(&config.offsets);

        let readings = sensors.read_all().await;
        let settled = state
            .fan_state()
            .is_settled(Instant::now(), cadence.fan_settle_delay);
        windows.fold(&readings, settled, cadence.particulate_saturation);

        if warmup_left > 0 {
            warmup_left -= 1;
            info!("(Startup) Waiting for sensors to be ready for the next reading");
            next_wake += cadence.warmup_interval;

            if warmup_left == 0 {
                state.readiness.mark(Readiness::SamplingStarted);
                info!("Sampling started");
            }
        } else {
            let averages = windows.averages();
            state.averages.publish(averages).await?;
            debug!("Averages published: {:?}", averages);

            if state.readiness.is_set(Readiness::PresentationEnded) {
                show_measurements(state, indicators).await?;
            } else {
                debug!("Skipping indicator update until the startup animation ends");
            }
            next_wake += cadence.sample_interval;
        }

        Timer::at(next_wake).await;
    }
}
