mod config;

use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use appmais_ble::client::{AppmaisClient, SensorChannel};
use appmais_ble::utils::{format_datetime, format_hhmm};
use appmais_ble::{DeviceSettings, GattTransport};
use config::MonitorConfig;

const RETRY_DELAY_SECS: u64 = 10; // Pause before another connection attempt
const MAX_SILENT_CYCLES: u32 = 3; // Reconnect after this many polls without a single successful pull

async fn main_loop(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting AppMAIS hive monitor for {}", config.device_mac);

    loop {
        // Connect with user-paced retry
        let mut client = match AppmaisClient::connect(
            &config.device_mac,
            Duration::from_secs(config.connect_timeout_secs),
        )
        .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("Connection failed: {}", e);
                info!("Retrying in {} seconds", RETRY_DELAY_SECS);
                sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                continue;
            }
        };
        client.set_gate_buffer(config.gate_buffer_secs);

        if let Some(password) = &config.password {
            match client.authenticate(password).await {
                Ok(true) => info!("Password accepted"),
                Ok(false) => {
                    return Err("the monitor rejected the configured password".into());
                }
                Err(e) => {
                    error!("Password check failed: {}", e);
                    sleep(Duration::from_secs(RETRY_DELAY_SECS)).await;
                    continue;
                }
            }
        }

        log_device_snapshot(&mut client).await;

        // Poll until the link looks dead, then reconnect from scratch
        let mut silent_cycles = 0;
        loop {
            let pulled = poll_once(&mut client, &config).await;
            if pulled == 0 {
                silent_cycles += 1;
                if silent_cycles >= MAX_SILENT_CYCLES {
                    warn!("No data in {} polls, reconnecting", silent_cycles);
                    break;
                }
            } else {
                silent_cycles = 0;
            }

            sleep(Duration::from_secs(config.poll_interval_secs)).await;
        }
    }
}

/// Log the capture schedule, sensor switches and newest recordings once per
/// connection.
async fn log_device_snapshot<T: GattTransport>(client: &mut AppmaisClient<T>) {
    let settings = client.read_settings().await;
    info!("Capture window: {}", describe_window(&settings, ""));
    info!("Video window: {}", describe_window(&settings, "v_"));

    let enabled: Vec<&str> = settings
        .toggles
        .iter()
        .filter(|toggle| toggle.enabled)
        .map(|toggle| toggle.name)
        .collect();
    if enabled.is_empty() {
        info!("Sensors enabled: none");
    } else {
        info!("Sensors enabled: {}", enabled.join(", "));
    }

    match client.audio_info().await {
        Ok(audio) => info!(
            "Newest audio: {} ({}), recorded {}",
            audio.path,
            audio.human_size(),
            audio
                .creation_stamp()
                .unwrap_or_else(|| "at an unknown time".to_string())
        ),
        Err(e) => warn!("Could not read the audio file info: {}", e),
    }
    match client.video_info().await {
        Ok(video) => info!(
            "Newest video: {} ({}), recorded {}",
            video.path,
            video.human_size(),
            video
                .creation_stamp()
                .unwrap_or_else(|| "at an unknown time".to_string())
        ),
        Err(e) => warn!("Could not read the video file info: {}", e),
    }
}

fn describe_window(settings: &DeviceSettings, prefix: &str) -> String {
    let clock = |name: &str| {
        settings
            .number(&format!("{}capture_window_{}_time", prefix, name))
            .and_then(|value| value.parse::<i64>().ok())
            .map(format_hhmm)
            .unwrap_or_else(|| "?".to_string())
    };
    let seconds = |name: &str| {
        settings
            .number(&format!("{}capture_{}_seconds", prefix, name))
            .filter(|value| !value.is_empty())
            .unwrap_or("?")
            .to_string()
    };
    format!(
        "{} - {}, {}s every {}s",
        clock("start"),
        clock("end"),
        seconds("duration"),
        seconds("interval")
    )
}

/// One monitoring cycle. Returns how many series pulls succeeded.
async fn poll_once<T: GattTransport>(
    client: &mut AppmaisClient<T>,
    config: &MonitorConfig,
) -> usize {
    info!("Poll cycle at: {}", format_datetime(&OffsetDateTime::now_utc()));

    if client.is_capture_active().await {
        info!("The capture job is running; pulled files may grow mid-read");
    }

    match client.live_cpu().await {
        Ok(value) => info!("Live CPU temperature: {}°C", value),
        Err(e) => warn!("Could not read the live CPU temperature: {}", e),
    }

    let lines = client.latest_lines().await;
    if let Some(cpu) = &lines.cpu {
        info!(
            "Latest cpu record {}: {}°C, status {}",
            cpu.label,
            show(cpu.temperature),
            cpu.status.as_deref().unwrap_or("?")
        );
    }
    if let Some(climate) = &lines.climate {
        info!(
            "Latest climate record {}: {}°C, {}% humidity, status {}",
            climate.label,
            show(climate.temperature),
            show(climate.humidity),
            climate.status.as_deref().unwrap_or("?")
        );
    }
    if let Some(scale) = &lines.scale {
        info!("Latest scale record {}: mass {}", scale.label, show(scale.mass));
    }

    let mut pulled = 0;
    for channel in SensorChannel::ALL {
        match client.pull_series(channel).await {
            Ok(_) => pulled += 1,
            Err(e) => warn!("Could not pull the {} series: {}", channel.name(), e),
        }
    }

    if config.pull_frame {
        if let Err(e) = client.pull_frame(&config.frame_dir).await {
            warn!("Could not pull the video frame: {}", e);
        }
    }

    pulled
}

fn show(value: Option<f64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "?".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match MonitorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Run the monitor or wait for the shutdown signal; cancellation drops any
    // in-flight connection attempt without printing its retry notice
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
