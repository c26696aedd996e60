//! Device configuration: wire codecs, local edits, dirty-checking, write-back.
//!
//! Config characteristics answer reads with human-readable text such as
//! `capture_interval_seconds = 300` or `auto_start: true`, but expect only the
//! bare value back on write. Encoding is therefore not the inverse of
//! decoding. Every field keeps the value it had at read time, and submit
//! writes exactly the fields whose value differs from that snapshot.

use bluer::Uuid;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ble::transport::GattTransport;
use crate::error::{Error, Result};
use crate::uuids;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\D*(\d+)").unwrap());
static TOGGLE_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*(\S+)").unwrap());

/// Extract the first digit run from wire text like `capture_interval_seconds = 300`.
pub fn decode_numeric(wire_text: &str) -> Result<String> {
    let trimmed = wire_text.trim();
    match DIGIT_RUN.captures(trimmed) {
        Some(captures) => Ok(captures[1].to_string()),
        None => Err(Error::DecodeFailed {
            text: trimmed.to_string(),
        }),
    }
}

/// The device expects the bare value back, not the `key = value` wire shape.
pub fn encode_numeric(value: &str) -> String {
    value.trim().to_string()
}

/// Decode a toggle payload like `auto_start: true`.
///
/// The value after the colon is truth-tested against the literal `true`,
/// case-insensitively; without a colon the whole payload is tested. Anything
/// else is off.
pub fn decode_toggle(wire_text: &str) -> bool {
    let trimmed = wire_text.trim();
    let value = match TOGGLE_VALUE.captures(trimmed) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    };
    value.to_lowercase() == "true"
}

pub fn encode_toggle(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

/// One numeric device variable and the snapshot it is diffed against.
///
/// An empty value means the field has not been read successfully yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericField {
    pub name: &'static str,
    pub characteristic: Uuid,
    pub value: String,
    original: String,
}

impl NumericField {
    fn new(name: &'static str, characteristic: Uuid) -> Self {
        Self {
            name,
            characteristic,
            value: String::new(),
            original: String::new(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.original
    }
}

/// One sensor on/off switch and its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleField {
    pub name: &'static str,
    pub characteristic: Uuid,
    pub enabled: bool,
    original: bool,
}

impl ToggleField {
    fn new(name: &'static str, characteristic: Uuid) -> Self {
        Self {
            name,
            characteristic,
            enabled: false,
            original: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.enabled != self.original
    }
}

const NUMERIC_FIELDS: [(&str, Uuid); 8] = [
    ("capture_window_start_time", uuids::CAPTURE_START),
    ("capture_window_end_time", uuids::CAPTURE_END),
    ("capture_duration_seconds", uuids::CAPTURE_DURATION),
    ("capture_interval_seconds", uuids::CAPTURE_INTERVAL),
    ("v_capture_window_start_time", uuids::VIDEO_CAPTURE_START),
    ("v_capture_window_end_time", uuids::VIDEO_CAPTURE_END),
    ("v_capture_duration_seconds", uuids::VIDEO_CAPTURE_DURATION),
    ("v_capture_interval_seconds", uuids::VIDEO_CAPTURE_INTERVAL),
];

const TOGGLE_FIELDS: [(&str, Uuid); 6] = [
    ("microphone", uuids::MIC_TOGGLE),
    ("camera", uuids::CAMERA_TOGGLE),
    ("temperature", uuids::TEMPERATURE_TOGGLE),
    ("air_quality", uuids::AIR_QUALITY_TOGGLE),
    ("scale", uuids::SCALE_TOGGLE),
    ("cpu", uuids::CPU_TOGGLE),
];

/// Every editable device variable, numeric and toggle.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub numbers: Vec<NumericField>,
    pub toggles: Vec<ToggleField>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSettings {
    pub fn new() -> Self {
        Self {
            numbers: NUMERIC_FIELDS
                .iter()
                .map(|(name, characteristic)| NumericField::new(name, *characteristic))
                .collect(),
            toggles: TOGGLE_FIELDS
                .iter()
                .map(|(name, characteristic)| ToggleField::new(name, *characteristic))
                .collect(),
        }
    }

    /// Read every field fresh from the device and re-snapshot it.
    ///
    /// A failed read or decode leaves that one field at its previous value
    /// and moves on; a settings screen with one unreadable field still shows
    /// the others.
    pub async fn refresh<T: GattTransport>(&mut self, transport: &mut T) {
        for field in &mut self.numbers {
            match transport.read(uuids::addr(field.characteristic)).await {
                Ok(wire) => match decode_numeric(&wire) {
                    Ok(value) => {
                        field.value = value.clone();
                        field.original = value;
                    }
                    Err(e) => debug!("Keeping previous {}: {}", field.name, e),
                },
                Err(e) => warn!("Could not read {}: {}", field.name, e),
            }
        }
        for toggle in &mut self.toggles {
            match transport.read(uuids::addr(toggle.characteristic)).await {
                Ok(wire) => {
                    let enabled = decode_toggle(&wire);
                    toggle.enabled = enabled;
                    toggle.original = enabled;
                }
                Err(e) => warn!("Could not read {} toggle: {}", toggle.name, e),
            }
        }
    }

    /// Change a numeric field locally. Returns false for an unknown name.
    pub fn set_number(&mut self, name: &str, value: &str) -> bool {
        match self.numbers.iter_mut().find(|field| field.name == name) {
            Some(field) => {
                field.value = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Flip a toggle locally. Returns false for an unknown name.
    pub fn set_toggle(&mut self, name: &str, enabled: bool) -> bool {
        match self.toggles.iter_mut().find(|toggle| toggle.name == name) {
            Some(toggle) => {
                toggle.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn number(&self, name: &str) -> Option<&str> {
        self.numbers
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn toggle(&self, name: &str) -> Option<bool> {
        self.toggles
            .iter()
            .find(|toggle| toggle.name == name)
            .map(|toggle| toggle.enabled)
    }

    /// Names and new values of every field that differs from its snapshot,
    /// for the confirmation step before a commit.
    pub fn dirty(&self) -> Vec<(&'static str, String)> {
        let mut changes = Vec::new();
        for field in &self.numbers {
            if field.is_dirty() {
                changes.push((field.name, field.value.clone()));
            }
        }
        for toggle in &self.toggles {
            if toggle.is_dirty() {
                changes.push((toggle.name, encode_toggle(toggle.enabled).to_string()));
            }
        }
        changes
    }

    /// Write every dirty field, then re-read so the snapshots match the
    /// device again. Untouched fields are never written. A failed write is
    /// logged and does not stop the remaining fields.
    ///
    /// # Returns
    /// How many writes were issued successfully
    pub async fn commit<T: GattTransport>(&mut self, transport: &mut T) -> usize {
        let mut written = 0;
        for field in &self.numbers {
            if !field.is_dirty() {
                continue;
            }
            let payload = encode_numeric(&field.value);
            match transport
                .write(uuids::addr(field.characteristic), &payload)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => warn!("Could not write {}: {}", field.name, e),
            }
        }
        for toggle in &self.toggles {
            if !toggle.is_dirty() {
                continue;
            }
            let payload = encode_toggle(toggle.enabled);
            match transport
                .write(uuids::addr(toggle.characteristic), payload)
                .await
            {
                Ok(()) => written += 1,
                Err(e) => warn!("Could not write {} toggle: {}", toggle.name, e),
            }
        }

        if written > 0 {
            self.refresh(transport).await;
        }
        written
    }
}
