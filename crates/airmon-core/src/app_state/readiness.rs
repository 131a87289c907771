//! One-way startup flags

use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sampling finished its warm-up cycles
    SamplingStarted,
    /// Status task completed its first full exchange
    StatusStarted,
    /// Startup animation handed over to steady-state colors
    PresentationEnded,
    /// Sensors failed to initialize; the device is unusable until restart
    SensorInitFailed,
}

impl Readiness {
    const fn bit(self) -> u8 {
        match self {
            Self::SamplingStarted => 1 << 0,
            Self::StatusStarted => 1 << 1,
            Self::PresentationEnded => 1 << 2,
            Self::SensorInitFailed => 1 << 3,
        }
    }
}

/// Monotonic bitset: bits are only ever set.
#[derive(Debug, Default)]
pub struct ReadinessFlags(AtomicU8);

impl ReadinessFlags {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn mark(&self, flag: Readiness) {
        self.0.fetch_or(flag.bit(), Ordering::AcqRel);
    }

    pub fn is_set(&self, flag: Readiness) -> bool {
        self.0.load(Ordering::Acquire) & flag.bit() != 0
    }

    /// Both the sampling and the status task are running.
    pub fn all_tasks_started(&self) -> bool {
        self.is_set(Readiness::SamplingStarted) && self.is_set(Readiness::StatusStarted)
    }

    pub fn sensor_init_failed(&self) -> bool {
        self.is_set(Readiness::SensorInitFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_cleared() {
        let flags = ReadinessFlags::new();
        assert!(!flags.is_set(Readiness::SamplingStarted));
        assert!(!flags.all_tasks_started());
        assert!(!flags.sensor_init_failed());
    }

    #[test]
    fn test_all_tasks_started_needs_both_bits() {
        let flags = ReadinessFlags::new();
        flags.mark(Readiness::SamplingStarted);
        assert!(!flags.all_tasks_started());

        flags.mark(Readiness::StatusStarted);
        assert!(flags.all_tasks_started());
        assert!(!flags.is_set(Readiness::PresentationEnded));
    }

    #[test]
    fn test_marking_twice_keeps_other_bits() {
        let flags = ReadinessFlags::new();
        flags.mark(Readiness::PresentationEnded);
        flags.mark(Readiness::SamplingStarted);
        flags.mark(Readiness::SamplingStarted);

        assert!(flags.is_set(Readiness::PresentationEnded));
        assert!(flags.is_set(Readiness::SamplingStarted));
        assert!(!flags.is_set(Readiness::StatusStarted));
    }
}
