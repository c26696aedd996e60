//! Device-agnostic transport contract for the AppMAIS GATT profile.

use async_trait::async_trait;
use bluer::Uuid;

use crate::error::{Error, Result};

/// A characteristic pinned to the service that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicAddress {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Payload-level access to a connected hive monitor.
///
/// Implementations hand back decoded payload bytes and accept plain text for
/// writes; whatever encoding the radio link applies is theirs to hide. All
/// methods take `&mut self`: the firmware keeps per-characteristic read
/// cursors, so interleaved operations on one device would corrupt each other.
#[async_trait]
pub trait GattTransport: Send {
    /// Read one value from a characteristic.
    async fn read_bytes(&mut self, addr: CharacteristicAddress) -> Result<Vec<u8>>;

    /// Write a text value to a characteristic.
    async fn write(&mut self, addr: CharacteristicAddress, value: &str) -> Result<()>;

    /// Read one value and interpret it as UTF-8 text.
    async fn read(&mut self, addr: CharacteristicAddress) -> Result<String> {
        let raw = self.read_bytes(addr).await?;
        String::from_utf8(raw).map_err(|_| Error::ReadFailed {
            characteristic: addr.characteristic,
            reason: "payload is not valid UTF-8".to_string(),
        })
    }
}
