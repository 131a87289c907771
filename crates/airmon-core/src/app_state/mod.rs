//! Application-wide state and error types for airmon
//!
//! Everything the long-lived tasks exchange lives in [`AppState`], which is
//! created once at startup and handed to each task by reference.

mod readiness;
mod shared_cell;

pub use readiness::*;
pub use shared_cell::*;

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use thiserror_no_std::Error;

use crate::config::{Cadence, DeviceConfig};
use crate::fan::FanState;
use crate::sampling::Averages;

/// Shared context of the running device.
///
/// `config` is written by the status task only and `averages` by the
/// sampling task only; every other access is a snapshot read.
pub struct AppState {
    pub cadence: Cadence,
    pub config: SharedCell<DeviceConfig>,
    pub averages: SharedCell<Averages>,
    pub readiness: ReadinessFlags,
    fan: BlockingMutex<CriticalSectionRawMutex, Cell<FanState>>,
}

impl AppState {
    /// Cold state: default configuration, unknown averages, no readiness bit.
    pub fn new(cadence: Cadence, fan: FanState) -> Self {
        Self {
            cadence,
            config: SharedCell::new("config", DeviceConfig::DEFAULT, cadence.lock_max_wait),
            averages: SharedCell::new("averages", Averages::UNKNOWN, cadence.lock_max_wait),
            readiness: ReadinessFlags::new(),
            fan: BlockingMutex::new(Cell::new(fan)),
        }
    }

    /// Last recorded fan state
    pub fn fan_state(&self) -> FanState {
        self.fan.lock(|fan| fan.get())
    }

    pub fn record_fan_state(&self, state: FanState) {
        self.fan.lock(|fan| fan.set(state));
    }
}

/// Failure reported by an actuator or indicator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("{device} rejected the command")]
    Rejected { device: &'static str },
    #[error("{device} is not responding")]
    Unresponsive { device: &'static str },
}

/// Unrecoverable conditions.
///
/// A task returning one of these stops; the binary's supervisor logs it and
/// restarts the device, discarding all in-memory state.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AppError {
    #[error("{cell} lock was not released in time")]
    LockTimeout { cell: &'static str },
    #[error("implausible {field} offset {value} in remote configuration")]
    ImplausibleOffset { field: &'static str, value: f32 },
    #[error("indicator failure: {0}")]
    Indicator(DeviceError),
}

impl From<DeviceError> for AppError {
    fn from(value: DeviceError) -> Self {
        Self::Indicator(value)
    }
}
