use core::convert::Infallible;

use embassy_time::{Instant, Timer};
use log::{error, info};

use crate::app_state::{AppError, AppState, Readiness};
use crate::cloud::{CloudClient, StatusReport};
use crate::fan::{FanActuator, reconcile_fan};
use crate::led::{Indicators, LedStrip};
use crate::metrics::brightness_for_level;

/// Peripherals and the cloud client the status task drives.
pub struct StatusContext<'a, C, F, L> {
    pub state: &'a AppState,
    pub cloud: &'a mut C,
    pub fan: &'a mut F,
    pub indicators: &'a Indicators<L>,
}

impl<C: CloudClient, F: FanActuator, L: LedStrip> StatusContext<'_, C, F, L> {
    /// Fetch the remote status, then apply brightness and fan speed.
    ///
    /// A failed fetch only lights the error pixel.
    pub async fn sync_status(&mut self) -> Result<(), AppError> {
        let status = match self.cloud.get_status().await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to get status: {}", e);
                return self.indicators.show_exchange_result(false).await;
            }
        };
        self.indicators.show_exchange_result(true).await?;
        info!("switchLevel: {}, fanSpeed: {}", status.level, status.fan_speed);

        let config = self.state.config.snapshot().await?;
        self.indicators
            .set_brightness(brightness_for_level(status.level, &config))
            .await?;

        let fan = reconcile_fan(
            self.fan,
            self.state.fan_state(),
            status.fan_speed,
            Instant::now(),
        );
        self.state.record_fan_state(fan);
        Ok(())
    }

    /// Fetch and install the remote configuration.
    ///
    /// Offsets outside the plausible range are rejected before anything is
    /// installed.
    pub async fn sync_config(&mut self) -> Result<(), AppError> {
        let config = match self.cloud.get_config().await {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to get config: {}", e);
                return self.indicators.show_exchange_result(false).await;
            }
        };
        self.indicators.show_exchange_result(true).await?;

        if let Some((field, value)) = config.offsets.first_implausible() {
            error!("Rejecting configuration: {} offset {} out of range", field, value);
            return Err(AppError::ImplausibleOffset { field, value });
        }

        self.state.config.publish(config).await?;
        info!("Configuration installed");
        Ok(())
    }

    /// Push the current averages upstream.
    pub async fn push_averages(&mut self) -> Result<(), AppError> {
        let averages = self.state.averages.snapshot().await?;
        let report = StatusReport::from_averages(&averages);

        match self.cloud.push_status(&report).await {
            Ok(()) => self.indicators.show_exchange_result(true).await,
            Err(e) => {
                error!("Failed to update current status: {}", e);
                self.indicators.show_exchange_result(false).await
            }
        }
    }
}

/// Reconcile status and configuration with the cloud.
///
/// Runs one config, status and push exchange at startup (the push only once
/// sampling has started), then every `status_interval` fetches the status,
/// every `config_every` cycles the configuration and every `push_every`
/// cycles pushes the averages.
pub async fn status_task<C: CloudClient, F: FanActuator, L: LedStrip>(
    mut ctx: StatusContext<'_, C, F, L>,
) -> Result<Infallible, AppError> {
    let cadence = ctx.state.cadence;
    let config_every = cadence.config_every.max(1);
    let push_every = cadence.push_every.max(1);

    ctx.sync_config().await?;
    ctx.sync_status().await?;

    while !ctx.state.readiness.is_set(Readiness::SamplingStarted) {
        Timer::after(cadence.readiness_poll).await;
    }
    ctx.push_averages().await?;
    ctx.state.readiness.mark(Readiness::StatusStarted);
    info!("Status task started");

    let mut next_wake = Instant::now();
    let mut cycle: u32 = 0;
    loop {
        ctx.sync_status().await?;
        if cycle % config_every == 0 {
            ctx.sync_config().await?;
        }
        if cycle % push_every == 0 {
            ctx.push_averages().await?;
        }

        cycle = cycle.wrapping_add(1);
        next_wake += cadence.status_interval;
        Timer::at(next_wake).await;
    }
}
