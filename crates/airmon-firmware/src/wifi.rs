//! Wi-Fi station link
//!
//! Only the association is managed here. The DHCP lease is renewed by the
//! network stack, which runs on the cloud executor.

use airmon_core::config::InternetConfig;
use airmon_core::network::{NetworkError, NetworkLink};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{info, warn};

/// Station link to the configured access point.
pub struct WifiLink<'a> {
    controller: WifiController<'a>,
}

impl<'a> WifiLink<'a> {
    pub fn new(
        mut controller: WifiController<'a>,
        config: &InternetConfig<'_>,
    ) -> Result<Self, NetworkError> {
        let client = ClientConfig::default()
            .with_ssid(config.ssid.into())
            .with_password(config.password.into());

        controller
            .set_config(&ModeConfig::Client(client))
            .map_err(|e| {
                warn!("Wi-Fi mode config failed: {:?}", e);
                NetworkError::Driver("mode configuration rejected")
            })?;

        Ok(Self { controller })
    }
}

impl NetworkLink for WifiLink<'_> {
    fn is_connected(&mut self) -> bool {
        matches!(self.controller.is_connected(), Ok(true))
    }

    async fn reconnect(&mut self) -> Result<(), NetworkError> {
        if !self.controller.is_started().unwrap_or(false) {
            self.controller.start_async().await.map_err(|e| {
                warn!("Wi-Fi start failed: {:?}", e);
                NetworkError::Driver("radio did not start")
            })?;
        }

        let _ = self.controller.disconnect_async().await;
        self.controller.connect_async().await.map_err(|e| {
            warn!("Wi-Fi connect failed: {:?}", e);
            NetworkError::AssociationFailed
        })?;

        info!("Associated with the access point");
        Ok(())
    }
}
