//! Fixed GATT registry for the AppMAIS service.
//!
//! The firmware keys every endpoint off one service UUID plus a 16-bit-style
//! sub-ID in the first UUID group. The constants below are the complete wire
//! contract this client depends on; nothing here is discovered at runtime.

use bluer::Uuid;

use crate::ble::transport::CharacteristicAddress;

pub const SERVICE: Uuid = Uuid::from_u128(0x00000001_710e_4a5b_8d75_3e5b444bc3cf); // AppMAIS GATT service

pub const PASSWORD: Uuid = Uuid::from_u128(0x00000601_710e_4a5b_8d75_3e5b444bc3cf); // Password check (write then read back)

pub const CPU_SENSOR: Uuid = Uuid::from_u128(0x00000002_710e_4a5b_8d75_3e5b444bc3cf); // Live CPU temperature reading

pub const CPU_LINE: Uuid = Uuid::from_u128(0x00000301_710e_4a5b_8d75_3e5b444bc3cf); // Most recent line of the cpu log
pub const HUMIDITY_LINE: Uuid = Uuid::from_u128(0x00000302_710e_4a5b_8d75_3e5b444bc3cf); // Most recent line of the humidity/temperature log
pub const SCALE_LINE: Uuid = Uuid::from_u128(0x00000308_710e_4a5b_8d75_3e5b444bc3cf); // Most recent line of the scale log
pub const LINE_CURSOR_RESET: Uuid = Uuid::from_u128(0x00000305_710e_4a5b_8d75_3e5b444bc3cf); // Rewinds the line-read cursor

pub const CPU_FILE: Uuid = Uuid::from_u128(0x00000211_710e_4a5b_8d75_3e5b444bc3cf); // Full cpu log, chunked
pub const HT_FILE: Uuid = Uuid::from_u128(0x00000212_710e_4a5b_8d75_3e5b444bc3cf); // Full humidity/temperature log, chunked
pub const SCALE_FILE: Uuid = Uuid::from_u128(0x00000213_710e_4a5b_8d75_3e5b444bc3cf); // Full scale log, chunked
pub const FILE_CURSOR_RESET: Uuid = Uuid::from_u128(0x00000208_710e_4a5b_8d75_3e5b444bc3cf); // Rewinds the file-read cursor

pub const AUDIO_INFO: Uuid = Uuid::from_u128(0x00000201_710e_4a5b_8d75_3e5b444bc3cf); // Newest audio recording: "<path>, <bytes>"
pub const VIDEO_INFO: Uuid = Uuid::from_u128(0x00000202_710e_4a5b_8d75_3e5b444bc3cf); // Newest video recording: "<path>, <bytes>"
pub const FRAME: Uuid = Uuid::from_u128(0x00000203_710e_4a5b_8d75_3e5b444bc3cf); // JPEG frame from the newest recording, chunked
pub const FRAME_CURSOR_RESET: Uuid = Uuid::from_u128(0x00000204_710e_4a5b_8d75_3e5b444bc3cf); // Rewinds the frame cursor
pub const STATIC_FILE: Uuid = Uuid::from_u128(0x00000207_710e_4a5b_8d75_3e5b444bc3cf); // Arbitrary file pull (e.g. a fresh still), chunked
pub const VIDEO_SIZE_LINE: Uuid = Uuid::from_u128(0x00000209_710e_4a5b_8d75_3e5b444bc3cf); // Per-recording file-size log, one line per read
pub const VIDEO_SIZE_CURSOR_RESET: Uuid = Uuid::from_u128(0x00000210_710e_4a5b_8d75_3e5b444bc3cf); // Rewinds the file-size line cursor

pub const COMMAND: Uuid = Uuid::from_u128(0x00000501_710e_4a5b_8d75_3e5b444bc3cf); // Shell command execution on the Pi

pub const CAPTURE_START: Uuid = Uuid::from_u128(0x00000101_710e_4a5b_8d75_3e5b444bc3cf); // capture_window_start_time (HHMM)
pub const CAPTURE_END: Uuid = Uuid::from_u128(0x00000102_710e_4a5b_8d75_3e5b444bc3cf); // capture_window_end_time (HHMM)
pub const CAPTURE_DURATION: Uuid = Uuid::from_u128(0x00000103_710e_4a5b_8d75_3e5b444bc3cf); // capture_duration_seconds
pub const CAPTURE_INTERVAL: Uuid = Uuid::from_u128(0x00000104_710e_4a5b_8d75_3e5b444bc3cf); // capture_interval_seconds
pub const VIDEO_CAPTURE_START: Uuid = Uuid::from_u128(0x00000105_710e_4a5b_8d75_3e5b444bc3cf); // Camera-specific window start
pub const VIDEO_CAPTURE_END: Uuid = Uuid::from_u128(0x00000106_710e_4a5b_8d75_3e5b444bc3cf); // Camera-specific window end
pub const VIDEO_CAPTURE_DURATION: Uuid = Uuid::from_u128(0x00000107_710e_4a5b_8d75_3e5b444bc3cf); // Camera-specific duration
pub const VIDEO_CAPTURE_INTERVAL: Uuid = Uuid::from_u128(0x00000108_710e_4a5b_8d75_3e5b444bc3cf); // Camera-specific interval

pub const MIC_TOGGLE: Uuid = Uuid::from_u128(0x00000401_710e_4a5b_8d75_3e5b444bc3cf); // Microphone on/off
pub const CAMERA_TOGGLE: Uuid = Uuid::from_u128(0x00000402_710e_4a5b_8d75_3e5b444bc3cf); // Camera on/off
pub const TEMPERATURE_TOGGLE: Uuid = Uuid::from_u128(0x00000403_710e_4a5b_8d75_3e5b444bc3cf); // Temperature sensor on/off
pub const AIR_QUALITY_TOGGLE: Uuid = Uuid::from_u128(0x00000404_710e_4a5b_8d75_3e5b444bc3cf); // Air-quality sensor on/off
pub const SCALE_TOGGLE: Uuid = Uuid::from_u128(0x00000405_710e_4a5b_8d75_3e5b444bc3cf); // Scale on/off
pub const CPU_TOGGLE: Uuid = Uuid::from_u128(0x00000406_710e_4a5b_8d75_3e5b444bc3cf); // CPU sensor on/off

/// Address a characteristic within the AppMAIS service.
pub const fn addr(characteristic: Uuid) -> CharacteristicAddress {
    CharacteristicAddress {
        service: SERVICE,
        characteristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_firmware_strings() {
        assert_eq!(SERVICE.to_string(), "00000001-710e-4a5b-8d75-3e5b444bc3cf");
        assert_eq!(PASSWORD.to_string(), "00000601-710e-4a5b-8d75-3e5b444bc3cf");
        assert_eq!(CPU_FILE.to_string(), "00000211-710e-4a5b-8d75-3e5b444bc3cf");
        assert_eq!(
            VIDEO_SIZE_LINE.to_string(),
            "00000209-710e-4a5b-8d75-3e5b444bc3cf"
        );
        assert_eq!(
            CAPTURE_START.to_string(),
            "00000101-710e-4a5b-8d75-3e5b444bc3cf"
        );
    }

    #[test]
    fn test_addr_stays_in_service() {
        let addr = addr(COMMAND);
        assert_eq!(addr.service, SERVICE);
        assert_eq!(addr.characteristic, COMMAND);
    }
}
