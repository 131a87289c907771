//! SmartThings REST API client

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{CloudClient, CloudError, DeviceStatus, RestTransport, StatusReport};
use crate::config::{DeviceConfig, Offsets};
use crate::led::MAX_BRIGHTNESS;

pub const API_BASE: &str = "https://api.smartthings.com/v1";

/// Longest request URL; device ids are 36-character UUIDs.
pub const URL_CAPACITY: usize = 128;

pub type Url = heapless::String<URL_CAPACITY>;

fn url(args: core::fmt::Arguments<'_>) -> Result<Url, CloudError> {
    let mut url = Url::new();
    url.write_fmt(args).map_err(|_| CloudError::Encode)?;
    Ok(url)
}

pub fn status_url(device_id: &str) -> Result<Url, CloudError> {
    url(format_args!("{API_BASE}/devices/{device_id}/components/main/status"))
}

pub fn preferences_url(device_id: &str) -> Result<Url, CloudError> {
    url(format_args!("{API_BASE}/devices/{device_id}/preferences"))
}

pub fn events_url(device_id: &str) -> Result<Url, CloudError> {
    url(format_args!("{API_BASE}/virtualdevices/{device_id}/events"))
}

/// `{"value": ...}` wrapper used by attributes and preferences alike.
/// Numbers may arrive as integers or decimals, so they are read as `f64`.
#[derive(Deserialize)]
struct Value {
    value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    switch_level: SwitchLevel,
    fan_speed: FanSpeed,
}

#[derive(Deserialize)]
struct SwitchLevel {
    level: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FanSpeed {
    fan_speed: Value,
}

#[derive(Deserialize)]
struct PreferencesResponse {
    values: Preferences,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Preferences {
    temp_high: Value,
    temp_low: Value,
    humi_high: Value,
    humi_low: Value,
    fine_dust_very_bad: Value,
    fine_dust_bad: Value,
    fine_dust_warning: Value,
    fine_dust_normal: Value,
    illuminance_high: Value,
    illuminance_low: Value,
    temperature_offset: Value,
    humidity_offset: Value,
    tvoc_offset: Value,
    temperature2_offset: Value,
    pressure_offset: Value,
}

fn brightness(name: &str, value: f64) -> u8 {
    let clamped = value.clamp(0.0, f64::from(MAX_BRIGHTNESS));
    if clamped != value {
        warn!("{} preference {} clamped to {}", name, value, clamped);
    }
    clamped as u8
}

impl Preferences {
    fn into_config(self) -> DeviceConfig {
        DeviceConfig {
            temp_high: self.temp_high.value as i32,
            temp_low: self.temp_low.value as i32,
            humidity_high: self.humi_high.value as i32,
            humidity_low: self.humi_low.value as i32,
            fine_dust_very_bad: self.fine_dust_very_bad.value as i32,
            fine_dust_bad: self.fine_dust_bad.value as i32,
            fine_dust_warning: self.fine_dust_warning.value as i32,
            fine_dust_normal: self.fine_dust_normal.value as i32,
            illuminance_high: brightness("illuminanceHigh", self.illuminance_high.value),
            illuminance_low: brightness("illuminanceLow", self.illuminance_low.value),
            offsets: Offsets {
                temperature: self.temperature_offset.value as f32,
                humidity: self.humidity_offset.value as i32,
                tvoc: self.tvoc_offset.value as i32,
                temperature2: self.temperature2_offset.value as f32,
                pressure: self.pressure_offset.value as f32,
            },
        }
    }
}

pub fn parse_status(body: &[u8]) -> Result<DeviceStatus, CloudError> {
    let response: StatusResponse = serde_json::from_slice(body).map_err(|e| {
        warn!("Unexpected status response: {}", e);
        CloudError::Decode("device status")
    })?;

    Ok(DeviceStatus {
        level: response.switch_level.level.value as i32,
        fan_speed: response.fan_speed.fan_speed.value as i32,
    })
}

pub fn parse_preferences(body: &[u8]) -> Result<DeviceConfig, CloudError> {
    let response: PreferencesResponse = serde_json::from_slice(body).map_err(|e| {
        warn!("Unexpected preferences response: {}", e);
        CloudError::Decode("device preferences")
    })?;

    Ok(response.values.into_config())
}

#[derive(Serialize)]
#[serde(untagged)]
enum EventValue {
    Integer(i32),
    Decimal(f64),
}

#[derive(Serialize)]
struct DeviceEvent {
    component: &'static str,
    capability: &'static str,
    attribute: &'static str,
    value: EventValue,
    unit: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsBody {
    device_events: Vec<DeviceEvent>,
}

/// Round to one decimal place, as shown in the app.
fn one_decimal(value: f32) -> EventValue {
    EventValue::Decimal(libm::round(f64::from(value) * 10.0) / 10.0)
}

/// Build the events body. Unknown values are left out.
pub fn events_body(report: &StatusReport) -> Result<Vec<u8>, CloudError> {
    let candidates = [
        (
            "airQuality",
            "fineDustSensor",
            "fineDustLevel",
            report.fine_dust.map(EventValue::Integer),
            "μg/m^3",
        ),
        (
            "airQuality",
            "temperatureMeasurement",
            "temperature",
            report.temperature.map(one_decimal),
            "C",
        ),
        (
            "airQuality",
            "relativeHumidityMeasurement",
            "humidity",
            report.humidity.map(EventValue::Integer),
            "%",
        ),
        (
            "airQuality",
            "tvocMeasurement",
            "tvocLevel",
            report.tvoc.map(EventValue::Integer),
            "ppb",
        ),
        (
            "airPressure",
            "temperatureMeasurement",
            "temperature",
            report.temperature2.map(one_decimal),
            "C",
        ),
        (
            "airPressure",
            "atmosphericPressureMeasurement",
            "atmosphericPressure",
            report.pressure_kpa.map(one_decimal),
            "kPa",
        ),
    ];

    let device_events = candidates
        .into_iter()
        .filter_map(|(component, capability, attribute, value, unit)| {
            let Some(value) = value else {
                debug!("Skipping unknown {}/{}", component, attribute);
                return None;
            };
            Some(DeviceEvent {
                component,
                capability,
                attribute,
                value,
                unit,
            })
        })
        .collect();

    serde_json::to_vec(&EventsBody { device_events }).map_err(|_| CloudError::Encode)
}

/// [`CloudClient`] for one SmartThings (virtual) device.
pub struct SmartThingsClient<T> {
    transport: T,
    device_id: String,
    access_token: String,
}

impl<T: RestTransport> SmartThingsClient<T> {
    pub fn new(transport: T, device_id: &str, access_token: &str) -> Self {
        Self {
            transport,
            device_id: device_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: RestTransport> CloudClient for SmartThingsClient<T> {
    async fn get_status(&mut self) -> Result<DeviceStatus, CloudError> {
        let body = self
            .transport
            .get(&status_url(&self.device_id)?, &self.access_token)
            .await?;
        parse_status(&body)
    }

    async fn get_config(&mut self) -> Result<DeviceConfig, CloudError> {
        let body = self
            .transport
            .get(&preferences_url(&self.device_id)?, &self.access_token)
            .await?;
        parse_preferences(&body)
    }

    async fn push_status(&mut self, report: &StatusReport) -> Result<(), CloudError> {
        let body = events_body(report)?;
        self.transport
            .post(&events_url(&self.device_id)?, &self.access_token, &body)
            .await?;
        info!("Successfully updated current status");
        Ok(())
    }
}
