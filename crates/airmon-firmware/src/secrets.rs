//! Credentials baked in by the build script.

use airmon_core::config::{CloudConfig, Config, InternetConfig};

pub const CONFIG: Config<'static> = Config {
    internet: InternetConfig {
        ssid: env!("AIRMON_WIFI_SSID"),
        password: env!("AIRMON_WIFI_PASSWORD"),
    },
    cloud: CloudConfig {
        device_id: env!("AIRMON_DEVICE_ID"),
        access_token: env!("AIRMON_ACCESS_TOKEN"),
    },
};
