use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300; // The monitor appends records every five minutes
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20; // Discovery scan window for an unknown device
const DEFAULT_GATE_BUFFER_SECS: i64 = appmais_ble::gate::DEFAULT_BUFFER_SECONDS;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub device_mac: String,
    pub password: Option<String>,
    pub poll_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub gate_buffer_secs: i64,
    pub frame_dir: PathBuf,
    pub pull_frame: bool,
}

impl MonitorConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let device_mac = env::var("APPMAIS_DEVICE_MAC")
            .map_err(|_| "APPMAIS_DEVICE_MAC environment variable not set")?;
        if device_mac.trim().is_empty() {
            return Err("APPMAIS_DEVICE_MAC is empty. Set it to the monitor's Bluetooth MAC address, e.g. B8:27:EB:01:02:03".into());
        }

        let password = env::var("APPMAIS_PASSWORD").ok().filter(|p| !p.is_empty());

        let poll_interval_secs =
            numeric_var("APPMAIS_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let connect_timeout_secs =
            numeric_var("APPMAIS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let gate_buffer_secs = numeric_var("APPMAIS_GATE_BUFFER_SECS", DEFAULT_GATE_BUFFER_SECS)?;

        let frame_dir = env::var("APPMAIS_FRAME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let pull_frame = env::var("APPMAIS_PULL_FRAME")
            .map(|value| {
                let value = value.trim().to_lowercase();
                value == "true" || value == "1"
            })
            .unwrap_or(false);

        Ok(MonitorConfig {
            device_mac: device_mac.trim().to_string(),
            password,
            poll_interval_secs,
            connect_timeout_secs,
            gate_buffer_secs,
            frame_dir,
            pull_frame,
        })
    }
}

fn numeric_var<T: FromStr>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{} is not a number: '{}'", name, value).into()),
        Err(_) => Ok(default),
    }
}
