//! Newest-recording metadata and chunked media pulls.

use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;

use crate::ble::transport::GattTransport;
use crate::error::{Error, Result};
use crate::transfer::{self, FileSource, Framing};
use crate::uuids;

pub const FRAME_FILE_NAME: &str = "video_frame.jpg"; // Local name for a pulled frame
pub const STILL_FILE_NAME: &str = "picture.jpg"; // Local name for a pulled still
pub const STILL_COMMAND: &str = "libcamera-still -o picture.jpg"; // Shell command that produces the still on the Pi

// Recording file names carry their creation time: ...@2024-06-11@14-15-33.h264
static CREATION_STAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\d{4}-\d{2}-\d{2})@(\d{2})-(\d{2})-(\d{2})\.").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Newest recording as reported by an info characteristic: `<path>, <bytes>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub path: String,
    pub size_bytes: u64,
}

impl MediaInfo {
    /// Parse an info payload. The size part tolerates stray text around the
    /// number; a payload without the `, ` separator is malformed.
    pub fn parse(wire_text: &str) -> Result<Self> {
        let (path, size_text) = match wire_text.split_once(", ") {
            Some(parts) => parts,
            None => {
                return Err(Error::DecodeFailed {
                    text: wire_text.to_string(),
                })
            }
        };
        let size_bytes = DIGITS
            .find(size_text)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        Ok(Self {
            path: path.to_string(),
            size_bytes,
        })
    }

    /// Creation timestamp embedded in the file name, rendered like
    /// `2024-06-11 at 02:15:33 pm`. None when the name has no stamp.
    pub fn creation_stamp(&self) -> Option<String> {
        let captures = CREATION_STAMP.captures(&self.path)?;
        let date = &captures[1];
        let hours: u8 = captures[2].parse().ok()?;
        let minutes: u8 = captures[3].parse().ok()?;
        let seconds: u8 = captures[4].parse().ok()?;

        let period = if hours < 12 { "am" } else { "pm" };
        let display_hours = match hours % 12 {
            0 => 12,
            hours => hours,
        };
        Some(format!(
            "{} at {:02}:{:02}:{:02} {}",
            date, display_hours, minutes, seconds, period
        ))
    }

    pub fn human_size(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

/// Render a byte count with 1024-based units, two decimals above bytes.
pub fn format_file_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    let kilobytes = bytes_f / KIB;
    let megabytes = bytes_f / KIB.powi(2);
    let gigabytes = bytes_f / KIB.powi(3);

    if gigabytes >= 1.0 {
        format!("{:.2} GB", gigabytes)
    } else if megabytes >= 1.0 {
        format!("{:.2} MB", megabytes)
    } else if kilobytes >= 1.0 {
        format!("{:.2} KB", kilobytes)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Read the newest audio recording's metadata.
pub async fn read_audio_info<T: GattTransport>(transport: &mut T) -> Result<MediaInfo> {
    let wire = transport.read(uuids::addr(uuids::AUDIO_INFO)).await?;
    MediaInfo::parse(&wire)
}

/// Read the newest video recording's metadata.
pub async fn read_video_info<T: GattTransport>(transport: &mut T) -> Result<MediaInfo> {
    let wire = transport.read(uuids::addr(uuids::VIDEO_INFO)).await?;
    MediaInfo::parse(&wire)
}

/// Chunked source serving a JPEG frame out of the newest recording.
pub fn frame_source() -> FileSource {
    FileSource {
        data: uuids::addr(uuids::FRAME),
        reset: uuids::addr(uuids::FRAME_CURSOR_RESET),
        framing: Framing::SizeSentinel {
            max_chunk: transfer::MAX_CHUNK_SIZE,
        },
    }
}

/// Chunked source serving the most recently produced static file, e.g. a
/// still fresh from [`STILL_COMMAND`].
pub fn static_file_source() -> FileSource {
    FileSource {
        data: uuids::addr(uuids::STATIC_FILE),
        reset: uuids::addr(uuids::FILE_CURSOR_RESET),
        framing: Framing::SizeSentinel {
            max_chunk: transfer::MAX_CHUNK_SIZE,
        },
    }
}

/// Line source serving the per-recording file-size log.
pub fn video_size_source() -> FileSource {
    FileSource {
        data: uuids::addr(uuids::VIDEO_SIZE_LINE),
        reset: uuids::addr(uuids::VIDEO_SIZE_CURSOR_RESET),
        framing: Framing::ValueSentinel {
            terminator: transfer::EOF_SENTINEL,
        },
    }
}

/// Pull the newest video's frame into `dir` as [`FRAME_FILE_NAME`].
pub async fn pull_frame<T: GattTransport>(transport: &mut T, dir: &Path) -> Result<PathBuf> {
    save_media(transport, frame_source(), dir, FRAME_FILE_NAME).await
}

/// Pull the most recent static file into `dir` as [`STILL_FILE_NAME`].
pub async fn pull_still<T: GattTransport>(transport: &mut T, dir: &Path) -> Result<PathBuf> {
    save_media(transport, static_file_source(), dir, STILL_FILE_NAME).await
}

async fn save_media<T: GattTransport>(
    transport: &mut T,
    source: FileSource,
    dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    let payload = transfer::pull_bytes(transport, source).await?;
    let path = dir.join(name);
    fs::write(&path, &payload)
        .await
        .map_err(|e| Error::TransferFailed {
            characteristic: source.data.characteristic,
            reason: format!("could not save {}: {}", path.display(), e),
        })?;
    info!("Saved {} bytes to {}", payload.len(), path.display());
    Ok(path)
}
