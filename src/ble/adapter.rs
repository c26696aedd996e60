//! bluer-backed transport for AppMAIS hive monitors.
//!
//! The firmware serves every payload as base64 text and expects base64 text
//! back, so this adapter owns that codec: callers above see decoded bytes and
//! write plain strings.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, AdapterEvent, Address, Device, Session, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::time::{sleep, timeout, Duration, Instant};

use crate::ble::transport::{CharacteristicAddress, GattTransport};
use crate::error::{Error, Result};

const CONNECT_ATTEMPTS: u32 = 3; // Tries for the initial, user-paced connect only
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1); // Pause between failed connect tries
const SERVICE_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15); // Wait for the GATT database download
const OPERATION_TIMEOUT: Duration = Duration::from_secs(10); // Per-read/write deadline

/// Connected hive monitor with its GATT database indexed for direct lookup.
pub struct BluerTransport {
    _session: Session,
    device: Device,
    characteristics: HashMap<(Uuid, Uuid), Characteristic>,
}

impl BluerTransport {
    /// Connect to the hive monitor at `address`.
    ///
    /// Brings the default adapter up, scans for the device if the adapter does
    /// not already know it, connects, and waits for service resolution.
    ///
    /// # Arguments
    /// * `address` - Bluetooth MAC address, e.g. "B8:27:EB:01:02:03"
    /// * `discovery_timeout` - How long to scan for a device the adapter has never seen
    ///
    /// # Returns
    /// A transport ready for characteristic reads and writes
    pub async fn connect(address: &str, discovery_timeout: Duration) -> Result<Self> {
        let target =
            Address::from_str(address).map_err(|_| Error::InvalidAddress(address.to_string()))?;

        // Initialize Bluetooth session
        let session = match Session::new().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create Bluetooth session: {}", e);
                return Err(connect_error(target, &e));
            }
        };

        // Get the default Bluetooth adapter
        let adapter = match session.default_adapter().await {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Failed to get default Bluetooth adapter: {}", e);
                return Err(connect_error(target, &e));
            }
        };

        // Ensure Bluetooth adapter is powered on
        if let Err(e) = adapter.set_powered(true).await {
            error!("Failed to power on adapter: {}", e);
            return Err(connect_error(target, &e));
        }

        // Scan only when the adapter has never seen the device
        let known = adapter
            .device_addresses()
            .await
            .map_err(|e| connect_error(target, &e))?;
        if !known.contains(&target) {
            discover_device(&adapter, target, discovery_timeout).await?;
        }

        let device = adapter
            .device(target)
            .map_err(|e| connect_error(target, &e))?;

        connect_device(&device, CONNECT_ATTEMPTS).await?;
        let characteristics = index_characteristics(&device).await?;
        info!(
            "Connected to {} ({} characteristics resolved)",
            target,
            characteristics.len()
        );

        Ok(Self {
            _session: session,
            device,
            characteristics,
        })
    }

    /// Reconnect once if the link dropped since the last operation.
    ///
    /// A single repair attempt: if that connect fails, the operation fails.
    async fn ensure_connected(&mut self) -> Result<()> {
        if self.device.is_connected().await.unwrap_or(false) {
            return Ok(());
        }
        warn!("Connection to {} lost, reconnecting", self.device.address());
        connect_device(&self.device, 1).await?;
        // The GATT object paths change across reconnects, so re-index
        self.characteristics = index_characteristics(&self.device).await?;
        Ok(())
    }

    fn characteristic(&self, addr: CharacteristicAddress) -> Result<Characteristic> {
        self.characteristics
            .get(&(addr.service, addr.characteristic))
            .cloned()
            .ok_or(Error::CharacteristicMissing {
                characteristic: addr.characteristic,
            })
    }
}

#[async_trait]
impl GattTransport for BluerTransport {
    async fn read_bytes(&mut self, addr: CharacteristicAddress) -> Result<Vec<u8>> {
        self.ensure_connected().await?;
        let characteristic = self.characteristic(addr)?;
        let raw = match timeout(OPERATION_TIMEOUT, characteristic.read()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                return Err(Error::ReadFailed {
                    characteristic: addr.characteristic,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(Error::ReadFailed {
                    characteristic: addr.characteristic,
                    reason: format!("no response within {:?}", OPERATION_TIMEOUT),
                })
            }
        };
        decode_payload(addr.characteristic, &raw)
    }

    async fn write(&mut self, addr: CharacteristicAddress, value: &str) -> Result<()> {
        self.ensure_connected().await?;
        let characteristic = self.characteristic(addr)?;
        let encoded = STANDARD.encode(value.as_bytes());
        match timeout(OPERATION_TIMEOUT, characteristic.write(encoded.as_bytes())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if rejected_but_applied(&e.to_string()) => {
                debug!(
                    "Write to {} reported \"{}\" but the value was applied",
                    addr.characteristic, e
                );
                Ok(())
            }
            Ok(Err(e)) => Err(Error::WriteFailed {
                characteristic: addr.characteristic,
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::WriteFailed {
                characteristic: addr.characteristic,
                reason: format!("no acknowledgement within {:?}", OPERATION_TIMEOUT),
            }),
        }
    }
}

/// Run device discovery until `target` is seen or the scan window closes.
async fn discover_device(adapter: &Adapter, target: Address, window: Duration) -> Result<()> {
    info!("Scanning for {}", target);
    let events = match adapter.discover_devices().await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(connect_error(target, &e));
        }
    };

    let found = timeout(window, async {
        let mut events = events;
        while let Some(event) = events.next().await {
            debug!("Discovery event: {:?}", event);
            if let AdapterEvent::DeviceAdded(addr) = event {
                if addr == target {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    if found {
        Ok(())
    } else {
        Err(Error::ConnectFailed {
            address: target.to_string(),
            reason: format!("not discovered within {:?}", window),
        })
    }
}

/// Connect with up to `attempts` tries, then wait until the GATT database is
/// resolved. The silent repair path passes 1 so a dropped link never retries
/// more than once per operation.
async fn connect_device(device: &Device, attempts: u32) -> Result<()> {
    let address = device.address();
    if !device.is_connected().await.unwrap_or(false) {
        if let Err(e) = attempt_connect(attempts, || device.connect()).await {
            error!("Failed to connect to {}: {}", address, e);
            return Err(connect_error(address, &e));
        }
    }

    let deadline = Instant::now() + SERVICE_RESOLVE_TIMEOUT;
    while !device.is_services_resolved().await.unwrap_or(false) {
        if Instant::now() >= deadline {
            return Err(Error::ConnectFailed {
                address: address.to_string(),
                reason: "services did not resolve".to_string(),
            });
        }
        sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

/// Drive `connect` until one try lands, up to `attempts` tries. Pauses between
/// tries but not after the last failure, which is returned as-is.
async fn attempt_connect<F, Fut, E>(attempts: u32, connect: F) -> std::result::Result<(), E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                debug!("Connect attempt {} of {} failed: {}", attempt, attempts, e);
                attempt += 1;
                sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Walk every service and build a (service, characteristic) lookup table.
async fn index_characteristics(device: &Device) -> Result<HashMap<(Uuid, Uuid), Characteristic>> {
    let address = device.address();
    let mut map = HashMap::new();
    for service in device
        .services()
        .await
        .map_err(|e| connect_error(address, &e))?
    {
        let service_uuid = service
            .uuid()
            .await
            .map_err(|e| connect_error(address, &e))?;
        for characteristic in service
            .characteristics()
            .await
            .map_err(|e| connect_error(address, &e))?
        {
            let characteristic_uuid = characteristic
                .uuid()
                .await
                .map_err(|e| connect_error(address, &e))?;
            map.insert((service_uuid, characteristic_uuid), characteristic);
        }
    }
    Ok(map)
}

fn connect_error<E: std::fmt::Display>(address: Address, error: &E) -> Error {
    Error::ConnectFailed {
        address: address.to_string(),
        reason: error.to_string(),
    }
}

/// Strip buffer padding and decode the base64 text the firmware puts on the air.
fn decode_payload(characteristic: Uuid, raw: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(raw).map_err(|_| Error::ReadFailed {
        characteristic,
        reason: "payload is not base64 text".to_string(),
    })?;
    let text = text.trim_matches(char::from(0)).trim();
    STANDARD.decode(text).map_err(|e| Error::ReadFailed {
        characteristic,
        reason: format!("base64 decode failed: {}", e),
    })
}

/// BlueZ surfaces some firmware write acks as "Operation was rejected" even
/// though the value lands on the device. That one failure counts as success.
pub fn rejected_but_applied(message: &str) -> bool {
    message.contains("Operation was rejected")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::uuids;

    #[test]
    fn test_decode_payload_strips_buffer_padding() {
        // "26.1" arrives as "MjYuMQ==" inside a zero-padded fixed buffer
        let raw = b"MjYuMQ==\0\0\0\0".to_vec();
        let decoded = decode_payload(uuids::CPU_SENSOR, &raw).unwrap();
        assert_eq!(decoded, b"26.1");
    }

    #[test]
    fn test_decode_payload_rejects_non_base64() {
        let err = decode_payload(uuids::CPU_SENSOR, b"%%%").unwrap_err();
        assert!(matches!(err, Error::ReadFailed { .. }));
    }

    #[test]
    fn test_rejected_writes_count_as_applied() {
        assert!(rejected_but_applied("Operation was rejected"));
        assert!(rejected_but_applied(
            "org.bluez.Error.Failed: Operation was rejected"
        ));
        assert!(!rejected_but_applied("Operation failed with ATT error 0x0e"));
        assert!(!rejected_but_applied("not connected"));
    }

    #[tokio::test]
    async fn test_single_attempt_connect_fails_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = attempt_connect(1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("le-connection-abort-by-local") }
        })
        .await;
        assert_eq!(result, Err("le-connection-abort-by-local"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_pauses_between_tries_but_not_after_the_last() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result = attempt_connect(CONNECT_ATTEMPTS, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("page timeout") }
        })
        .await;
        assert_eq!(result, Err("page timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), CONNECT_ATTEMPTS);
        assert_eq!(started.elapsed(), CONNECT_RETRY_DELAY * (CONNECT_ATTEMPTS - 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_recovers_on_a_later_try() {
        let calls = AtomicU32::new(0);
        let result = attempt_connect(CONNECT_ATTEMPTS, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < CONNECT_ATTEMPTS {
                    Err("page timeout")
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), CONNECT_ATTEMPTS);
    }
}
