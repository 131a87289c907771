//! Shared async I2C bus
//!
//! The AHT20, BMP280 and AGS02MA sit on one bus. Each driver gets its own
//! [`SharedI2cDevice`]; a transaction holds the bus mutex across its awaits so
//! transfers of different drivers never interleave.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

pub struct SharedI2cDevice<'a, M: RawMutex, T> {
    bus: &'a Mutex<M, T>,
}

impl<'a, M: RawMutex, T> SharedI2cDevice<'a, M, T> {
    #[inline]
    pub const fn new(bus: &'a Mutex<M, T>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, T: ErrorType> ErrorType for SharedI2cDevice<'_, M, T> {
    type Error = T::Error;
}

impl<M: RawMutex, T: I2c> I2c for SharedI2cDevice<'_, M, T> {
    /// `read`, `write` and `write_read` are provided in terms of this.
    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.transaction(address, operations).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory I2C bus for driver tests.

    use std::collections::VecDeque;
    use std::vec::Vec;

    use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

    /// Queued responses are returned for reads in order; writes are recorded.
    #[derive(Default)]
    pub struct MockI2c {
        pub writes: Vec<(u8, Vec<u8>)>,
        pub responses: VecDeque<Vec<u8>>,
    }

    impl MockI2c {
        pub fn respond(mut self, bytes: &[u8]) -> Self {
            self.responses.push_back(bytes.to_vec());
            self
        }
    }

    #[derive(Debug)]
    pub struct MockError;

    impl embedded_hal_async::i2c::Error for MockError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    impl ErrorType for MockI2c {
        type Error = MockError;
    }

    impl I2c for MockI2c {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buffer) => {
                        let response = self.responses.pop_front().ok_or(MockError)?;
                        if response.len() != buffer.len() {
                            return Err(MockError);
                        }
                        buffer.copy_from_slice(&response);
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockI2c;
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn test_devices_share_one_bus() {
        let bus: Mutex<CriticalSectionRawMutex, _> =
            Mutex::new(MockI2c::default().respond(&[0xAB]));
        let mut first = SharedI2cDevice::new(&bus);
        let mut second = SharedI2cDevice::new(&bus);

        block_on(first.write(0x38, &[0x71])).unwrap();
        let mut buffer = [0u8; 1];
        block_on(second.write_read(0x1A, &[0x00], &mut buffer)).unwrap();

        assert_eq!(buffer, [0xAB]);
        let bus = block_on(bus.lock());
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[1].0, 0x1A);
    }
}
