//! Particulate sensor fan
//!
//! The PM1006 draws air through its chamber with a small fan. Its readings are
//! meaningless until the fan has been running for the settle delay, so the
//! time of the last switch-on is tracked alongside the on/off state.

use embassy_time::{Duration, Instant};

use crate::app_state::DeviceError;

/// Switches the fan on and off.
pub trait FanActuator {
    fn on(&mut self) -> Result<(), DeviceError>;
    fn off(&mut self) -> Result<(), DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanState {
    pub running: bool,
    /// Last switch-on time; `None` while the fan is off
    pub started_at: Option<Instant>,
}

impl FanState {
    pub const STOPPED: Self = Self {
        running: false,
        started_at: None,
    };

    pub const fn started(at: Instant) -> Self {
        Self {
            running: true,
            started_at: Some(at),
        }
    }

    /// Earliest instant at which particulate readings can be trusted.
    pub fn settled_at(&self, settle: Duration) -> Option<Instant> {
        self.started_at.map(|started| started + settle)
    }

    /// Whether the fan has been running for at least `settle` at `now`.
    ///
    /// A switch-on time later than `now` counts as zero elapsed time.
    pub fn is_settled(&self, now: Instant, settle: Duration) -> bool {
        match self.started_at {
            Some(started) => now.saturating_duration_since(started) >= settle,
            None => false,
        }
    }
}

/// Bring the fan in line with the remote fan speed.
///
/// Only an edge (running vs. requested) touches the actuator. On failure the
/// previous state is returned unchanged so the edge is seen again next cycle.
pub fn reconcile_fan<F: FanActuator>(
    fan: &mut F,
    current: FanState,
    fan_speed: i32,
    now: Instant,
) -> FanState {
    let requested = fan_speed != 0;
    if requested == current.running {
        return current;
    }

    if requested {
        match fan.on() {
            Ok(()) => {
                log::info!("Fan switched on");
                FanState::started(now)
            }
            Err(e) => {
                log::error!("Failed to turn on fan: {}", e);
                current
            }
        }
    } else {
        match fan.off() {
            Ok(()) => {
                log::info!("Fan switched off");
                FanState::STOPPED
            }
            Err(e) => {
                log::error!("Failed to turn off fan: {}", e);
                current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockFan {
        on_calls: u32,
        off_calls: u32,
        fail: bool,
    }

    impl FanActuator for MockFan {
        fn on(&mut self) -> Result<(), DeviceError> {
            self.on_calls += 1;
            if self.fail {
                return Err(DeviceError::Rejected { device: "fan" });
            }
            Ok(())
        }

        fn off(&mut self) -> Result<(), DeviceError> {
            self.off_calls += 1;
            if self.fail {
                return Err(DeviceError::Rejected { device: "fan" });
            }
            Ok(())
        }
    }

    const SETTLE: Duration = Duration::from_secs(30);

    #[test]
    fn test_settle_boundary() {
        let toggled = Instant::from_secs(100);
        let fan = FanState::started(toggled);

        assert!(!fan.is_settled(toggled + SETTLE - Duration::from_millis(1), SETTLE));
        assert!(fan.is_settled(toggled + SETTLE + Duration::from_millis(1), SETTLE));
        assert_eq!(fan.settled_at(SETTLE), Some(Instant::from_secs(130)));
    }

    #[test]
    fn test_toggle_in_the_future_is_not_settled() {
        let fan = FanState::started(Instant::from_secs(500));
        assert!(!fan.is_settled(Instant::from_secs(10), SETTLE));
    }

    #[test]
    fn test_stopped_fan_never_settles() {
        assert!(!FanState::STOPPED.is_settled(Instant::from_secs(10_000), SETTLE));
        assert_eq!(FanState::STOPPED.settled_at(SETTLE), None);
    }

    #[test]
    fn test_reconcile_only_acts_on_edges() {
        let mut fan = MockFan::default();
        let now = Instant::from_secs(42);
        let running = FanState::started(Instant::from_secs(1));

        assert_eq!(reconcile_fan(&mut fan, running, 3, now), running);
        assert_eq!(fan.on_calls, 0);

        let stopped = reconcile_fan(&mut fan, running, 0, now);
        assert_eq!(stopped, FanState::STOPPED);
        assert_eq!(fan.off_calls, 1);

        let restarted = reconcile_fan(&mut fan, stopped, 1, now);
        assert_eq!(restarted, FanState::started(now));
        assert_eq!(fan.on_calls, 1);
    }

    #[test]
    fn test_failed_toggle_keeps_previous_state() {
        let mut fan = MockFan {
            fail: true,
            ..Default::default()
        };
        let stopped = reconcile_fan(&mut fan, FanState::STOPPED, 2, Instant::from_secs(5));
        assert_eq!(stopped, FanState::STOPPED);

        // Edge is still pending, so the next cycle retries
        reconcile_fan(&mut fan, stopped, 2, Instant::from_secs(10));
        assert_eq!(fan.on_calls, 2);
    }
}
