use embassy_time::{Duration, Timer};
use log::{debug, error, info};

use crate::app_state::{AppError, AppState, Readiness};
use crate::led::{Indicators, LedStrip, colors, pixels};
use crate::metrics::IndicatorColors;

const SWEEP_STEP: Duration = Duration::from_millis(100);
const ERROR_FLASH_PERIOD: Duration = Duration::from_millis(500);

/// Color the measurement indicators from the current averages and
/// configuration.
///
/// The two cells are read as independent snapshots.
pub async fn show_measurements<L: LedStrip>(
    state: &AppState,
    indicators: &Indicators<L>,
) -> Result<(), AppError> {
    let averages = state.averages.snapshot().await?;
    let config = state.config.snapshot().await?;
    let picked = IndicatorColors::select(&averages, &config, state.cadence.particulate_saturation);

    if averages.temperature.is_none() {
        info!("Temperature is unknown, turning its pixel off");
    }
    if averages.humidity.is_none() {
        info!("Humidity is unknown, turning its pixel off");
    }
    if averages.fine_dust.is_none() {
        info!("PM2.5 is unknown, turning its pixel off");
    }

    indicators
        .with(|strip| {
            strip.set_color(pixels::TEMPERATURE, picked.temperature, false)?;
            strip.set_color(pixels::HUMIDITY, picked.humidity, false)?;
            strip.set_color(pixels::FINE_DUST, picked.fine_dust, false)?;
            strip.refresh()
        })
        .await?;

    debug!("Indicators updated: {:?}", picked);
    Ok(())
}

/// Startup animation.
///
/// Sweeps a blue pixel along the strip until both the sampling and the status
/// task are running, then shows the first measurements and hands indicator
/// updates over to the sampling task. If sensor initialization failed the
/// strip flashes red forever instead.
pub async fn presentation_task<L: LedStrip>(
    state: &AppState,
    indicators: &Indicators<L>,
) -> Result<(), AppError> {
    let readiness = &state.readiness;
    let halted = || readiness.all_tasks_started() || readiness.sensor_init_failed();

    while !halted() {
        for index in 0..pixels::SWEEP_LEN {
            if halted() {
                break;
            }
            indicators
                .with(|strip| strip.set_color(index, colors::BLUE, true))
                .await?;
            Timer::after(SWEEP_STEP).await;
            indicators
                .with(|strip| strip.set_color(index, colors::OFF, false))
                .await?;
        }
    }

    if readiness.sensor_init_failed() {
        error!("Sensors did not initialize, device is unusable until restart");
        loop {
            indicators.fill_sweep(colors::RED).await?;
            Timer::after(ERROR_FLASH_PERIOD).await;
            indicators.fill_sweep(colors::OFF).await?;
            Timer::after(ERROR_FLASH_PERIOD).await;
        }
    }

    show_measurements(state, indicators).await?;
    readiness.mark(Readiness::PresentationEnded);
    info!("Startup animation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fan::FanState;
    use crate::sampling::Averages;
    use crate::tasks::testing::{FAST, indicators};
    use embassy_futures::block_on;
    use embassy_time::with_timeout;

    #[test]
    fn test_hands_over_once_both_tasks_started() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let (indicators, sink) = indicators();
        block_on(state.averages.publish(Averages {
            temperature: Some(30.0),
            humidity: Some(50),
            ..Averages::UNKNOWN
        }))
        .unwrap();
        state.readiness.mark(Readiness::SamplingStarted);
        state.readiness.mark(Readiness::StatusStarted);

        block_on(presentation_task(&state, &indicators)).unwrap();

        assert!(state.readiness.is_set(Readiness::PresentationEnded));
        let frame = sink.last().unwrap();
        assert_eq!(frame[pixels::TEMPERATURE], colors::RED);
        assert_eq!(frame[pixels::HUMIDITY], colors::GREEN);
        assert_eq!(frame[pixels::FINE_DUST], colors::OFF);
    }

    #[test]
    fn test_sweeps_until_ready() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let (indicators, sink) = indicators();

        let result = block_on(with_timeout(
            Duration::from_millis(250),
            presentation_task(&state, &indicators),
        ));

        assert!(result.is_err(), "presentation ended without readiness");
        assert!(!state.readiness.is_set(Readiness::PresentationEnded));
        let lit = sink
            .frames
            .borrow()
            .iter()
            .filter(|frame| frame.contains(&colors::BLUE))
            .count();
        assert!(lit >= 2);
    }

    #[test]
    fn test_sensor_failure_flashes_forever() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let (indicators, sink) = indicators();
        state.readiness.mark(Readiness::SensorInitFailed);

        let result = block_on(with_timeout(
            Duration::from_millis(700),
            presentation_task(&state, &indicators),
        ));

        assert!(result.is_err());
        assert!(!state.readiness.is_set(Readiness::PresentationEnded));
        let frames = sink.frames.borrow();
        assert!(frames.iter().any(|f| f[..pixels::SWEEP_LEN].iter().all(|&c| c == colors::RED)));
        assert!(frames.iter().any(|f| f.iter().all(|&c| c == colors::OFF)));
    }
}
