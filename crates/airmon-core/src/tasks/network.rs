use core::convert::Infallible;

use embassy_time::{Instant, Timer};
use log::{error, info};

use crate::app_state::AppState;
use crate::network::NetworkLink;

/// Keep the station link up, reconnecting whenever it drops.
///
/// Failures are logged and retried on the next check; the link is never a
/// reason to restart.
pub async fn network_task<N: NetworkLink>(state: &AppState, link: &mut N) -> Infallible {
    let mut next_wake = Instant::now();
    loop {
        if !link.is_connected() {
            info!("Network disconnected, reconnecting");
            match link.reconnect().await {
                Ok(()) => info!("Network connected"),
                Err(e) => error!("Network reconnect failed: {}", e),
            }
        }

        next_wake += state.cadence.network_check_interval;
        Timer::at(next_wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fan::FanState;
    use crate::network::NetworkError;
    use crate::tasks::testing::FAST;
    use embassy_futures::block_on;
    use embassy_time::{Duration, with_timeout};

    struct FlakyLink {
        connected: bool,
        failures_left: u32,
        attempts: u32,
    }

    impl NetworkLink for FlakyLink {
        fn is_connected(&mut self) -> bool {
            self.connected
        }

        async fn reconnect(&mut self) -> Result<(), NetworkError> {
            self.attempts += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(NetworkError::AssociationFailed);
            }
            self.connected = true;
            Ok(())
        }
    }

    #[test]
    fn test_retries_until_connected() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let mut link = FlakyLink {
            connected: false,
            failures_left: 2,
            attempts: 0,
        };

        let _ = block_on(with_timeout(
            Duration::from_millis(80),
            network_task(&state, &mut link),
        ));

        assert!(link.connected);
        assert_eq!(link.attempts, 3);
    }

    #[test]
    fn test_connected_link_is_left_alone() {
        let state = AppState::new(FAST, FanState::STOPPED);
        let mut link = FlakyLink {
            connected: true,
            failures_left: 0,
            attempts: 0,
        };

        let _ = block_on(with_timeout(
            Duration::from_millis(40),
            network_task(&state, &mut link),
        ));

        assert_eq!(link.attempts, 0);
    }
}
