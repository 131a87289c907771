use embassy_time::{Duration, with_timeout};
use embedded_io_async::{Read, ReadReady, Write};
use log::{debug, error, warn};

use super::{ParticulateReading, Sensor, SensorError};

/// "Read measured result of particle" command
const REQUEST: [u8; 5] = [0x11, 0x02, 0x0B, 0x01, 0xE1];
const RESPONSE_HEADER: [u8; 3] = [0x16, 0x11, 0x0B];
const FRAME_LEN: usize = 20;
/// Upper bound on bytes discarded while looking for a frame
const MAX_SKIPPED: usize = 2 * FRAME_LEN;

fn uart_error(operation: &'static str, details: &'static str) -> SensorError {
    SensorError::ReadFailed {
        sensor: "PM1006",
        operation,
        details,
    }
}

/// Offset of the next possible frame start after index 0.
///
/// A header cut off by the end of the buffer still counts as a candidate.
fn next_frame_start(bytes: &[u8]) -> usize {
    (1..bytes.len())
        .find(|&start| {
            let tail = &bytes[start..];
            let len = tail.len().min(RESPONSE_HEADER.len());
            tail[..len] == RESPONSE_HEADER[..len]
        })
        .unwrap_or(bytes.len())
}

/// Cubic PM1006 particulate sensor on a 9600 baud UART.
///
/// Bytes left over from an earlier exchange are discarded before each
/// request, and the reply is realigned on its header, so a late or torn frame
/// only costs the reading it belongs to.
pub struct Pm1006Sensor<U> {
    uart: U,
    timeout: Duration,
}

impl<U: Read + ReadReady + Write> Pm1006Sensor<U> {
    pub const fn new(uart: U, timeout: Duration) -> Self {
        Self { uart, timeout }
    }

    /// Drop whatever is already waiting in the receive buffer.
    async fn discard_pending(&mut self) -> Result<(), SensorError> {
        let mut scratch = [0u8; FRAME_LEN];
        let mut dropped = 0;

        while dropped < MAX_SKIPPED
            && self
                .uart
                .read_ready()
                .map_err(|_| uart_error("discard stale bytes", "UART status error"))?
        {
            let count = self.uart.read(&mut scratch).await.map_err(|e| {
                error!("PM1006 stale byte read failed: {:?}", e);
                uart_error("discard stale bytes", "UART read error")
            })?;
            if count == 0 {
                break;
            }
            dropped += count;
        }

        if dropped > 0 {
            warn!("PM1006: dropped {} stale bytes", dropped);
        }
        Ok(())
    }

    async fn request(&mut self) -> Result<(), SensorError> {
        self.uart.write_all(&REQUEST).await.map_err(|e| {
            error!("PM1006 request failed: {:?}", e);
            uart_error("send measurement request", "UART write error")
        })?;
        self.uart.flush().await.map_err(|e| {
            error!("PM1006 flush failed: {:?}", e);
            uart_error("send measurement request", "UART flush error")
        })
    }

    /// Read until a frame with a valid header and checksum lines up.
    async fn receive(&mut self) -> Result<ParticulateReading, SensorError> {
        let mut frame = [0u8; FRAME_LEN];
        let mut filled = 0;
        let mut skipped = 0;

        loop {
            self.uart
                .read_exact(&mut frame[filled..])
                .await
                .map_err(|e| {
                    error!("PM1006 response read failed: {:?}", e);
                    uart_error("receive measurement", "UART read error")
                })?;

            let rejected = match decode(&frame) {
                Ok(reading) => return Ok(reading),
                Err(e) => e,
            };

            let start = next_frame_start(&frame);
            skipped += start;
            if skipped > MAX_SKIPPED {
                return Err(rejected);
            }
            debug!("PM1006: realigning frame by {} bytes", start);
            frame.copy_within(start.., 0);
            filled = FRAME_LEN - start;
        }
    }
}

/// Decode a response frame. Every byte of a valid frame sums to zero.
pub(crate) fn decode(frame: &[u8; FRAME_LEN]) -> Result<ParticulateReading, SensorError> {
    if frame[..RESPONSE_HEADER.len()] != RESPONSE_HEADER {
        return Err(uart_error("decode measurement", "unexpected frame header"));
    }

    let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != 0 {
        return Err(SensorError::Checksum { sensor: "PM1006" });
    }

    let pm2_5_ug_m3 = i32::from(u16::from_be_bytes([frame[5], frame[6]]));
    Ok(ParticulateReading { pm2_5_ug_m3 })
}

impl<U: Read + ReadReady + Write> Sensor for Pm1006Sensor<U> {
    type Readings = ParticulateReading;

    async fn read(&mut self) -> Result<ParticulateReading, SensorError> {
        self.discard_pending().await?;
        self.request().await?;

        let reading = with_timeout(self.timeout, self.receive())
            .await
            .map_err(|_| SensorError::Timeout {
                sensor: "PM1006",
                operation: "receive measurement",
            })??;
        debug!("PM2.5: {} ug/m3", reading.pm2_5_ug_m3);
        Ok(reading)
    }
}
