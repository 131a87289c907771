//! Long-lived device tasks
//!
//! Each task is a plain async function over the shared [`AppState`] and the
//! peripherals it owns, so the same code runs on the board executor and in the
//! simulator. Tasks that can hit an unrecoverable condition return
//! [`AppError`]; the binary decides how to restart.
//!
//! [`AppState`]: crate::app_state::AppState
//! [`AppError`]: crate::app_state::AppError

mod heartbeat;
mod network;
mod presentation;
mod sampling;
mod status;

pub use heartbeat::*;
pub use network::*;
pub use presentation::*;
pub use sampling::*;
pub use status::*;

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the task tests.

    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    use embassy_time::Duration;

    use crate::app_state::DeviceError;
    use crate::config::Cadence;
    use crate::led::{BufferedStrip, Color, Indicators, PixelSink, pixels};

    pub const FAST: Cadence = Cadence {
        sensor_startup_delay: Duration::from_millis(5),
        fan_settle_delay: Duration::from_millis(20),
        sample_interval: Duration::from_millis(10),
        warmup_interval: Duration::from_millis(5),
        status_interval: Duration::from_millis(10),
        config_every: 2,
        push_every: 2,
        readiness_poll: Duration::from_millis(2),
        lock_max_wait: Duration::from_millis(50),
        network_check_interval: Duration::from_millis(10),
        heartbeat_period: Duration::from_millis(40),
        fault_blink_period: Duration::from_millis(20),
        particulate_saturation: 1000,
    };

    pub type Frame = [Color; pixels::STRIP_LEN];

    /// Sink whose frames stay inspectable after the strip moved into
    /// [`Indicators`].
    #[derive(Clone, Default)]
    pub struct SharedSink {
        pub frames: Rc<RefCell<Vec<Frame>>>,
    }

    impl SharedSink {
        pub fn last(&self) -> Option<Frame> {
            self.frames.borrow().last().copied()
        }
    }

    impl PixelSink for SharedSink {
        fn write(&mut self, pixels: &[Color]) -> Result<(), DeviceError> {
            let mut frame = [crate::led::colors::OFF; pixels::STRIP_LEN];
            frame.copy_from_slice(pixels);
            self.frames.borrow_mut().push(frame);
            Ok(())
        }
    }

    pub type TestStrip = BufferedStrip<SharedSink, { pixels::STRIP_LEN }>;
    pub type TestIndicators = Indicators<TestStrip>;

    pub fn indicators() -> (TestIndicators, SharedSink) {
        let sink = SharedSink::default();
        let strip = BufferedStrip::new(sink.clone(), 8);
        (Indicators::new(strip, FAST.lock_max_wait), sink)
    }
}
