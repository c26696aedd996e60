//! Capture-window gate: decides whether the device's own periodic capture
//! job is running right now, so commands that contend for the camera or
//! sensors can be refused instead of colliding with it.

use bluer::Uuid;
use log::warn;
use time::OffsetDateTime;

use crate::ble::transport::GattTransport;
use crate::error::{Error, Result};
use crate::settings::decode_numeric;
use crate::uuids;

pub const DEFAULT_BUFFER_SECONDS: i64 = 5; // Slack around each capture slot

/// Capture schedule as the four device-reported integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_encoded: i64, // HHMM packed as H*100+M, e.g. 800 for 08:00
    pub end_encoded: i64,
    pub duration_seconds: i64,
    pub interval_seconds: i64,
}

/// Time of day for a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl ClockTime {
    /// Local wall-clock time, falling back to UTC when the local offset
    /// cannot be determined.
    pub fn now() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self {
            hours: i64::from(now.hour()),
            minutes: i64::from(now.minute()),
            seconds: i64::from(now.second()),
        }
    }
}

/// True when `now` falls inside an active capture slot of `window`.
///
/// The capture job starts a slot of `duration_seconds` at every
/// `interval_seconds` boundary measured from the window start, between the
/// window's start and end times. `buffer_seconds` widens each slot on both
/// sides. A window with a zero interval never reports active.
pub fn is_within_active_window(now: ClockTime, window: TimeWindow, buffer_seconds: i64) -> bool {
    let now_encoded = now.hours * 100 + now.minutes;
    let in_window = now_encoded >= window.start_encoded && now_encoded < window.end_encoded;
    if !in_window || window.interval_seconds <= 0 {
        return false;
    }

    let start_seconds =
        (window.start_encoded / 100) * 3600 + (window.start_encoded % 100) * 60;
    let now_seconds = now.hours * 3600 + now.minutes * 60 + now.seconds;
    let elapsed = now_seconds - start_seconds;
    let phase = elapsed.rem_euclid(window.interval_seconds);

    phase <= window.duration_seconds + buffer_seconds
        || phase > window.interval_seconds - buffer_seconds
}

/// Read the four schedule fields fresh from the device.
pub async fn read_window<T: GattTransport>(transport: &mut T) -> Result<TimeWindow> {
    Ok(TimeWindow {
        start_encoded: read_encoded(transport, uuids::CAPTURE_START).await?,
        end_encoded: read_encoded(transport, uuids::CAPTURE_END).await?,
        duration_seconds: read_encoded(transport, uuids::CAPTURE_DURATION).await?,
        interval_seconds: read_encoded(transport, uuids::CAPTURE_INTERVAL).await?,
    })
}

async fn read_encoded<T: GattTransport>(transport: &mut T, characteristic: Uuid) -> Result<i64> {
    let wire = transport.read(uuids::addr(characteristic)).await?;
    let digits = decode_numeric(&wire)?;
    digits
        .parse()
        .map_err(|_| Error::DecodeFailed { text: wire })
}

/// True when the capture job must be assumed running.
///
/// Reads the schedule fresh and checks it against the local clock. Any
/// failure to read or decode the schedule counts as active, so the gated
/// command is refused rather than run blind.
pub async fn is_capture_active<T: GattTransport>(transport: &mut T, buffer_seconds: i64) -> bool {
    let window = match read_window(transport).await {
        Ok(window) => window,
        Err(e) => {
            warn!("Could not read the capture schedule, assuming active: {}", e);
            return true;
        }
    };
    is_within_active_window(ClockTime::now(), window, buffer_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::mock::MockTransport;

    fn window() -> TimeWindow {
        TimeWindow {
            start_encoded: 800,
            end_encoded: 1800,
            duration_seconds: 60,
            interval_seconds: 300,
        }
    }

    fn at(hours: i64, minutes: i64, seconds: i64) -> ClockTime {
        ClockTime {
            hours,
            minutes,
            seconds,
        }
    }

    #[test]
    fn test_slot_start_is_active() {
        // 08:00:00 is phase 0 of the first slot
        assert!(is_within_active_window(at(8, 0, 0), window(), 5));
        // Still inside duration + buffer at 08:01:05
        assert!(is_within_active_window(at(8, 1, 5), window(), 5));
    }

    #[test]
    fn test_between_slots_is_idle() {
        // 08:02:00 is phase 120: past 65, not yet within 5 of the next slot
        assert!(!is_within_active_window(at(8, 2, 0), window(), 5));
    }

    #[test]
    fn test_tail_buffer_before_the_next_slot_is_active() {
        // Phase 296 of 300 is within the 5-second tail buffer
        assert!(is_within_active_window(at(8, 4, 56), window(), 5));
        assert!(!is_within_active_window(at(8, 4, 55), window(), 5));
    }

    #[test]
    fn test_outside_the_window_is_idle_regardless_of_phase() {
        assert!(!is_within_active_window(at(7, 59, 59), window(), 5));
        // The end bound is exclusive
        assert!(!is_within_active_window(at(18, 0, 0), window(), 5));
        assert!(is_within_active_window(at(17, 55, 0), window(), 5));
    }

    #[test]
    fn test_zero_interval_never_reports_active() {
        let mut window = window();
        window.interval_seconds = 0;
        assert!(!is_within_active_window(at(8, 0, 0), window, 5));
    }

    #[tokio::test]
    async fn test_unreadable_schedule_blocks() {
        // No scripted responses: every schedule read fails
        let mut transport = MockTransport::new();
        assert!(is_capture_active(&mut transport, 5).await);
    }

    #[tokio::test]
    async fn test_undecodable_schedule_blocks() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CAPTURE_START, "capture_window_start_time = 0800");
        transport.push_read(uuids::CAPTURE_END, "no digits");

        assert!(is_capture_active(&mut transport, 5).await);
    }

    #[tokio::test]
    async fn test_schedule_reads_decode_the_wire_shape() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CAPTURE_START, "capture_window_start_time = 0800");
        transport.push_read(uuids::CAPTURE_END, "capture_window_end_time = 1800");
        transport.push_read(uuids::CAPTURE_DURATION, "capture_duration_seconds = 60");
        transport.push_read(uuids::CAPTURE_INTERVAL, "capture_interval_seconds = 300");

        let window = read_window(&mut transport).await.unwrap();
        assert_eq!(
            window,
            TimeWindow {
                start_encoded: 800,
                end_encoded: 1800,
                duration_seconds: 60,
                interval_seconds: 300,
            }
        );
    }
}
