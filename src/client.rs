//! High-level client for one hive monitor.
//!
//! Every operation takes `&mut self`: the device advances per-characteristic
//! cursors, so pulls and reads against one monitor must never interleave.
//! The borrow checker enforces that ordering for free.

use std::path::{Path, PathBuf};

use log::{info, warn};
use tokio::time::Duration;

use crate::ble::adapter::BluerTransport;
use crate::ble::transport::GattTransport;
use crate::error::Result;
use crate::gate;
use crate::media::{self, MediaInfo};
use crate::series::{self, SeriesState};
use crate::settings::DeviceSettings;
use crate::transfer::{self, FileSource, Framing};
use crate::uuids;

/// One monitored sensor channel.
///
/// The parsing algorithm is channel-agnostic; a channel only selects the
/// source characteristic and which CSV column carries its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    CpuTemperature,
    AmbientTemperature,
    Humidity,
    Scale,
    VideoFileSize,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 5] = [
        SensorChannel::CpuTemperature,
        SensorChannel::AmbientTemperature,
        SensorChannel::Humidity,
        SensorChannel::Scale,
        SensorChannel::VideoFileSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensorChannel::CpuTemperature => "cpu temperature",
            SensorChannel::AmbientTemperature => "ambient temperature",
            SensorChannel::Humidity => "humidity",
            SensorChannel::Scale => "scale",
            SensorChannel::VideoFileSize => "video file size",
        }
    }

    fn value_column(self) -> usize {
        match self {
            SensorChannel::Humidity => 2,
            _ => 1,
        }
    }

    fn source(self) -> FileSource {
        match self {
            SensorChannel::CpuTemperature => sized_source(uuids::CPU_FILE),
            SensorChannel::AmbientTemperature | SensorChannel::Humidity => {
                sized_source(uuids::HT_FILE)
            }
            SensorChannel::Scale => sized_source(uuids::SCALE_FILE),
            SensorChannel::VideoFileSize => media::video_size_source(),
        }
    }
}

fn sized_source(data: bluer::Uuid) -> FileSource {
    FileSource {
        data: uuids::addr(data),
        reset: uuids::addr(uuids::FILE_CURSOR_RESET),
        framing: Framing::SizeSentinel {
            max_chunk: transfer::MAX_CHUNK_SIZE,
        },
    }
}

/// Outcome of a command write that contends with the capture job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Sent,
    DeviceBusy,
}

/// Outcome of a take-picture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureOutcome {
    Saved(PathBuf),
    DeviceBusy,
}

/// Most recent cpu log record.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuLine {
    pub label: String,
    pub temperature: Option<f64>,
    pub status: Option<String>,
}

/// Most recent humidity/temperature log record.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateLine {
    pub label: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub status: Option<String>,
}

/// Most recent scale log record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleLine {
    pub label: String,
    pub mass: Option<f64>,
}

/// Snapshot of the most recent record of every sensor log.
///
/// A field is None when its read or parse failed; one bad line never takes
/// the rest of the snapshot down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestLines {
    pub cpu: Option<CpuLine>,
    pub climate: Option<ClimateLine>,
    pub scale: Option<ScaleLine>,
}

/// Client for one connected hive monitor, generic over the transport so the
/// protocol logic also runs against scripted devices.
pub struct AppmaisClient<T: GattTransport> {
    transport: T,
    gate_buffer_seconds: i64,
}

impl AppmaisClient<BluerTransport> {
    /// Connect to the monitor at `address` over the system Bluetooth stack.
    pub async fn connect(address: &str, discovery_timeout: Duration) -> Result<Self> {
        let transport = BluerTransport::connect(address, discovery_timeout).await?;
        Ok(Self::new(transport))
    }
}

impl<T: GattTransport> AppmaisClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            gate_buffer_seconds: gate::DEFAULT_BUFFER_SECONDS,
        }
    }

    /// Widen or narrow the safety margin around scheduled capture runs.
    pub fn set_gate_buffer(&mut self, seconds: i64) {
        self.gate_buffer_seconds = seconds;
    }

    /// Pull one channel's complete log and parse it into series state.
    pub async fn pull_series(&mut self, channel: SensorChannel) -> Result<SeriesState> {
        let source = channel.source();
        let state = match source.framing {
            Framing::SizeSentinel { .. } => {
                let text = transfer::pull_text(&mut self.transport, source).await?;
                series::parse_series(&text, channel.value_column())
            }
            Framing::ValueSentinel { .. } => {
                let lines = transfer::pull_lines(&mut self.transport, source).await?;
                series::parse_series(&lines.join("\n"), channel.value_column())
            }
        };
        info!(
            "Pulled {}: {} points, {} nan, {} interpolated, {} failures",
            channel.name(),
            state.ledger_values.len(),
            state.nan_count,
            state.interpolated_indices.len(),
            state.failure_count
        );
        Ok(state)
    }

    /// Read the most recent record of every sensor log.
    ///
    /// Rewinds the line cursor once, then reads each line characteristic a
    /// single time.
    pub async fn latest_lines(&mut self) -> LatestLines {
        let reset = uuids::addr(uuids::LINE_CURSOR_RESET);
        if let Err(e) = transfer::reset_offset(&mut self.transport, reset).await {
            warn!("Could not rewind the line cursor: {}", e);
        }

        LatestLines {
            cpu: self
                .read_line(uuids::CPU_LINE, "cpu line")
                .await
                .and_then(|line| parse_cpu_line(&line)),
            climate: self
                .read_line(uuids::HUMIDITY_LINE, "climate line")
                .await
                .and_then(|line| parse_climate_line(&line)),
            scale: self
                .read_line(uuids::SCALE_LINE, "scale line")
                .await
                .and_then(|line| parse_scale_line(&line)),
        }
    }

    async fn read_line(&mut self, characteristic: bluer::Uuid, what: &str) -> Option<String> {
        match self.transport.read(uuids::addr(characteristic)).await {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Could not read the {}: {}", what, e);
                None
            }
        }
    }

    /// Read the live CPU temperature text.
    pub async fn live_cpu(&mut self) -> Result<String> {
        let value = self.transport.read(uuids::addr(uuids::CPU_SENSOR)).await?;
        Ok(value.trim().to_string())
    }

    /// Check a password with the device.
    ///
    /// The reply arrives on the same characteristic: a first payload byte of
    /// numeric 1 accepts, anything else rejects.
    pub async fn authenticate(&mut self, password: &str) -> Result<bool> {
        let addr = uuids::addr(uuids::PASSWORD);
        self.transport.write(addr, password).await?;
        let reply = self.transport.read_bytes(addr).await?;
        Ok(reply.first() == Some(&1))
    }

    /// Send a shell command, unless the device's own capture job is running.
    pub async fn send_command(&mut self, command: &str) -> Result<CommandOutcome> {
        if gate::is_capture_active(&mut self.transport, self.gate_buffer_seconds).await {
            info!("Capture job active, refusing command {:?}", command);
            return Ok(CommandOutcome::DeviceBusy);
        }
        self.transport
            .write(uuids::addr(uuids::COMMAND), command)
            .await?;
        info!("Sent command {:?}", command);
        Ok(CommandOutcome::Sent)
    }

    /// Take a fresh still on the device and pull it into `dir`.
    pub async fn take_picture(&mut self, dir: &Path) -> Result<PictureOutcome> {
        match self.send_command(media::STILL_COMMAND).await? {
            CommandOutcome::DeviceBusy => Ok(PictureOutcome::DeviceBusy),
            CommandOutcome::Sent => {
                let path = media::pull_still(&mut self.transport, dir).await?;
                Ok(PictureOutcome::Saved(path))
            }
        }
    }

    /// Pull the newest video's frame into `dir`.
    pub async fn pull_frame(&mut self, dir: &Path) -> Result<PathBuf> {
        media::pull_frame(&mut self.transport, dir).await
    }

    pub async fn audio_info(&mut self) -> Result<MediaInfo> {
        media::read_audio_info(&mut self.transport).await
    }

    pub async fn video_info(&mut self) -> Result<MediaInfo> {
        media::read_video_info(&mut self.transport).await
    }

    /// Read a fresh settings snapshot.
    pub async fn read_settings(&mut self) -> DeviceSettings {
        let mut settings = DeviceSettings::new();
        settings.refresh(&mut self.transport).await;
        settings
    }

    /// Write the dirty fields of `settings` back to the device.
    pub async fn commit_settings(&mut self, settings: &mut DeviceSettings) -> usize {
        settings.commit(&mut self.transport).await
    }

    /// True when the capture job must be assumed running.
    pub async fn is_capture_active(&mut self) -> bool {
        gate::is_capture_active(&mut self.transport, self.gate_buffer_seconds).await
    }
}

fn clean_label(raw: &str) -> String {
    raw.trim().replace('"', "")
}

fn parse_cpu_line(line: &str) -> Option<CpuLine> {
    let fields: Vec<&str> = line.split(',').collect();
    let value = fields.get(1)?;
    let status = fields
        .get(2)
        .and_then(|field| field.split_once('|'))
        .map(|(_, status)| status.trim().to_string());
    Some(CpuLine {
        label: clean_label(fields[0]),
        temperature: value.trim().parse().ok(),
        status,
    })
}

fn parse_climate_line(line: &str) -> Option<ClimateLine> {
    let fields: Vec<&str> = line.split(',').collect();
    let temperature = fields.get(1)?.trim().parse().ok();
    let humidity = fields
        .get(2)
        .map(|field| match field.split_once('|') {
            Some((value, _)) => value,
            None => *field,
        })
        .and_then(|value| value.trim().parse().ok());
    let status = line
        .split_once('|')
        .map(|(_, status)| status.trim().to_string());
    Some(ClimateLine {
        label: clean_label(fields[0]),
        temperature,
        humidity,
        status,
    })
}

fn parse_scale_line(line: &str) -> Option<ScaleLine> {
    let fields: Vec<&str> = line.split(',').collect();
    let value = fields.get(1)?;
    Some(ScaleLine {
        label: clean_label(fields[0]),
        mass: value.trim().parse().ok(),
    })
}
