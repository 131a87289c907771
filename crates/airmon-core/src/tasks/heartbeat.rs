use core::convert::Infallible;

use embassy_time::{Instant, Timer};
use log::warn;

use crate::app_state::{AppState, DeviceError};

/// On-board status LED.
pub trait StatusLed {
    fn toggle(&mut self) -> Result<(), DeviceError>;
}

/// Blink the status LED, twice as fast once sensor initialization failed.
pub async fn heartbeat_task<S: StatusLed>(state: &AppState, led: &mut S) -> Infallible {
    let cadence = &state.cadence;
    let mut next_wake = Instant::now();

    loop {
        if let Err(e) = led.toggle() {
            warn!("Status LED toggle failed: {}", e);
        }

        next_wake += if state.readiness.sensor_init_failed() {
            cadence.fault_blink_period
        } else {
            cadence.heartbeat_period
        };
        Timer::at(next_wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::Readiness;
    use crate::fan::FanState;
    use crate::tasks::testing::FAST;
    use embassy_futures::block_on;
    use embassy_time::{Duration, with_timeout};

    #[derive(Default)]
    struct CountingLed {
        toggles: u32,
    }

    impl StatusLed for CountingLed {
        fn toggle(&mut self) -> Result<(), DeviceError> {
            self.toggles += 1;
            if self.toggles % 2 == 0 {
                return Err(DeviceError::Unresponsive { device: "status led" });
            }
            Ok(())
        }
    }

    fn toggles_within(state: &AppState, millis: u64) -> u32 {
        let mut led = CountingLed::default();
        let _ = block_on(with_timeout(
            Duration::from_millis(millis),
            heartbeat_task(state, &mut led),
        ));
        led.toggles
    }

    /// Five and a half healthy blink periods
    fn window() -> u64 {
        (FAST.heartbeat_period * 5 + FAST.heartbeat_period / 2).as_millis()
    }

    #[test]
    fn test_blinks_through_toggle_failures() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let toggles = toggles_within(&state, window());
        // One toggle at start plus one per period, give or take a late tick
        assert!((5..=7).contains(&toggles), "{} toggles", toggles);
    }

    #[test]
    fn test_blinks_faster_after_sensor_failure() {
        let state = AppState::new(FAST, FanState::STOPPED);
        state.readiness.mark(Readiness::SensorInitFailed);
        let toggles = toggles_within(&state, window());
        // Half the period: eleven toggles in the same window
        assert!((10..=12).contains(&toggles), "{} toggles", toggles);
    }
}
