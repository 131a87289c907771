//! Readers-writer protected value with bounded waits

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::rwlock::RwLock;
use embassy_time::{Duration, with_timeout};
use log::{debug, error};

use super::AppError;

/// A `Copy` value shared between tasks.
///
/// Any number of readers may hold the lock at once; a writer excludes
/// everyone. Readers only ever receive a full copy, so no reference into the
/// shared value outlives the critical section. Every acquisition is bounded by
/// `max_wait`; running out of time yields [`AppError::LockTimeout`].
pub struct SharedCell<T: Copy> {
    name: &'static str,
    max_wait: Duration,
    lock: RwLock<CriticalSectionRawMutex, T>,
}

impl<T: Copy> SharedCell<T> {
    pub fn new(name: &'static str, value: T, max_wait: Duration) -> Self {
        Self {
            name,
            max_wait,
            lock: RwLock::new(value),
        }
    }

    /// Copy the current value out under the read lock.
    pub async fn snapshot(&self) -> Result<T, AppError> {
        let guard = with_timeout(self.max_wait, self.lock.read())
            .await
            .map_err(|_| self.timed_out("read"))?;
        let value = *guard;
        drop(guard);

        debug!("{}: snapshot taken", self.name);
        Ok(value)
    }

    /// Replace the whole value under the write lock.
    pub async fn publish(&self, value: T) -> Result<(), AppError> {
        let mut guard = with_timeout(self.max_wait, self.lock.write())
            .await
            .map_err(|_| self.timed_out("write"))?;
        *guard = value;
        drop(guard);

        debug!("{}: new value published", self.name);
        Ok(())
    }

    fn timed_out(&self, access: &'static str) -> AppError {
        error!(
            "{}: {} lock not acquired within {} ms",
            self.name,
            access,
            self.max_wait.as_millis()
        );
        AppError::LockTimeout { cell: self.name }
    }
}

#[cfg(test)]
impl<T: Copy> SharedCell<T> {
    /// Hold the read lock, keeping writers out until the guard drops.
    pub(crate) async fn hold_read(
        &self,
    ) -> embassy_sync::rwlock::RwLockReadGuard<'_, CriticalSectionRawMutex, T> {
        self.lock.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::thread;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Triple {
        a: u32,
        b: u32,
        c: u32,
    }

    impl Triple {
        fn uniform(v: u32) -> Self {
            Self { a: v, b: v, c: v }
        }
    }

    #[test]
    fn test_publish_then_snapshot() {
        let cell = SharedCell::new("test", Triple::uniform(0), Duration::from_millis(100));

        block_on(cell.publish(Triple::uniform(7))).unwrap();
        assert_eq!(block_on(cell.snapshot()).unwrap(), Triple::uniform(7));
    }

    #[test]
    fn test_readers_do_not_exclude_each_other() {
        let cell = SharedCell::new("test", 42u32, Duration::from_millis(50));

        let _held = block_on(cell.lock.read());
        assert_eq!(block_on(cell.snapshot()).unwrap(), 42);
    }

    #[test]
    fn test_read_times_out_while_writer_holds_lock() {
        let cell = SharedCell::new("averages", 1u32, Duration::from_millis(20));

        let _writer = block_on(cell.lock.write());
        let result = block_on(cell.snapshot());

        assert!(matches!(
            result,
            Err(AppError::LockTimeout { cell: "averages" })
        ));
    }

    #[test]
    fn test_write_times_out_while_reader_holds_lock() {
        let cell = SharedCell::new("config", 1u32, Duration::from_millis(20));

        let _reader = block_on(cell.lock.read());
        let result = block_on(cell.publish(2));

        assert!(matches!(result, Err(AppError::LockTimeout { cell: "config" })));
    }

    #[test]
    fn test_no_torn_reads_under_contention() {
        const WRITES: u32 = 1_000;
        const READERS: usize = 3;

        let cell = Arc::new(SharedCell::new(
            "stress",
            Triple::uniform(0),
            Duration::from_secs(5),
        ));
        // Highest value a writer has started to publish
        let started = Arc::new(AtomicU32::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let started = Arc::clone(&started);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut last_seen = 0;
                    let mut observed = 0u32;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let snapshot = block_on(cell.snapshot()).unwrap();
                        let ceiling = started.load(Ordering::Acquire);

                        assert_eq!(snapshot.a, snapshot.b, "torn read: {snapshot:?}");
                        assert_eq!(snapshot.b, snapshot.c, "torn read: {snapshot:?}");
                        assert!(snapshot.a <= ceiling, "value {} never written", snapshot.a);
                        assert!(snapshot.a >= last_seen, "went back in time");

                        last_seen = snapshot.a;
                        observed += 1;
                        if finished {
                            break;
                        }
                    }
                    observed
                })
            })
            .collect();

        for value in 1..=WRITES {
            started.store(value, Ordering::Release);
            block_on(cell.publish(Triple::uniform(value))).unwrap();
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(block_on(cell.snapshot()).unwrap(), Triple::uniform(WRITES));
    }
}
