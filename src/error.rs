use bluer::Uuid;
use thiserror::Error;

/// Error taxonomy for the AppMAIS wire protocol.
///
/// Transport failures carry the characteristic they were talking to and the
/// underlying reason as text, so the same variants work for the bluer-backed
/// transport and for scripted test transports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("read of characteristic {characteristic} failed: {reason}")]
    ReadFailed { characteristic: Uuid, reason: String },

    #[error("write to characteristic {characteristic} failed: {reason}")]
    WriteFailed { characteristic: Uuid, reason: String },

    #[error("file transfer on characteristic {characteristic} aborted: {reason}")]
    TransferFailed { characteristic: Uuid, reason: String },

    #[error("characteristic {characteristic} not present on the device")]
    CharacteristicMissing { characteristic: Uuid },

    #[error("no numeric value in {text:?}")]
    DecodeFailed { text: String },

    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConnectFailed {
            address: "B8:27:EB:01:02:03".to_string(),
            reason: "le-connection-abort-by-local".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to B8:27:EB:01:02:03: le-connection-abort-by-local"
        );

        let uuid = Uuid::from_u128(0x00000211_710e_4a5b_8d75_3e5b444bc3cf);
        let err = Error::ReadFailed {
            characteristic: uuid,
            reason: "not connected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            format!("read of characteristic {uuid} failed: not connected")
        );

        let err = Error::DecodeFailed {
            text: "interval = ?".to_string(),
        };
        assert_eq!(err.to_string(), "no numeric value in \"interval = ?\"");

        let err = Error::InvalidAddress("not-a-mac".to_string());
        assert_eq!(err.to_string(), "invalid device address \"not-a-mac\"");
    }
}
