//! Hardware-independent core library for airmon
//!
//! This crate contains all platform-agnostic logic of the air-quality
//! monitor: averaging windows, the shared state cells the tasks exchange data
//! through, the long-lived tasks themselves, sensor drivers, LED indicator
//! logic and the SmartThings request codec.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod app_state;
pub mod async_i2c_bus;
pub mod cloud;
pub mod config;
pub mod fan;
pub mod led;
pub mod metrics;
pub mod network;
pub mod sampling;
pub mod sensors;
pub mod tasks;
