//! Cloud automation service
//!
//! The device is mirrored by a SmartThings device. Its status (a switch level
//! and a fan speed) and preferences (the [`DeviceConfig`]) are fetched
//! periodically, and the averaged readings are pushed back as device events.

mod smartthings;

pub use smartthings::*;

use alloc::vec::Vec;

use thiserror_no_std::Error;

use crate::config::DeviceConfig;
use crate::sampling::Averages;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudError {
    #[error("request failed: {0}")]
    Transport(&'static str),
    #[error("server answered with HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(&'static str),
    #[error("failed to encode request body")]
    Encode,
}

/// Remote controls of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Switch level, 0..=100
    pub level: i32,
    /// Zero means the fan should be off
    pub fan_speed: i32,
}

/// Values pushed upstream, in the units the remote schema expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub fine_dust: Option<i32>,
    pub temperature: Option<f32>,
    pub humidity: Option<i32>,
    pub tvoc: Option<i32>,
    pub temperature2: Option<f32>,
    pub pressure_kpa: Option<f32>,
}

impl StatusReport {
    pub fn from_averages(averages: &Averages) -> Self {
        Self {
            fine_dust: averages.fine_dust,
            temperature: averages.temperature,
            humidity: averages.humidity,
            tvoc: averages.tvoc,
            temperature2: averages.temperature2,
            pressure_kpa: averages.pressure.map(|hpa| hpa / 10.0),
        }
    }
}

/// Typed access to the remote service.
pub trait CloudClient {
    fn get_status(&mut self) -> impl Future<Output = Result<DeviceStatus, CloudError>>;
    fn get_config(&mut self) -> impl Future<Output = Result<DeviceConfig, CloudError>>;
    fn push_status(&mut self, report: &StatusReport)
    -> impl Future<Output = Result<(), CloudError>>;
}

/// Authenticated HTTPS+JSON plumbing underneath a [`CloudClient`].
pub trait RestTransport {
    /// GET `url` with a bearer token and return the response body.
    fn get(&mut self, url: &str, token: &str)
    -> impl Future<Output = Result<Vec<u8>, CloudError>>;

    /// POST a JSON `body` to `url` with a bearer token.
    fn post(
        &mut self,
        url: &str,
        token: &str,
        body: &[u8],
    ) -> impl Future<Output = Result<(), CloudError>>;
}
