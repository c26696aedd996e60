//! Offset-reset and chunked reassembly over single-value characteristic reads.
//!
//! The firmware serves files through a cursor it advances on every read. A
//! pull is therefore a strict sequence: rewind the cursor, then read chunks
//! until the end-of-stream convention of that characteristic fires. There is
//! no checksum or chunk index on the wire, so read order is the only ordering
//! guarantee and chunks are appended exactly as received.

use bluer::Uuid;
use log::debug;

use crate::ble::transport::{CharacteristicAddress, GattTransport};
use crate::error::{Error, Result};

pub const MAX_CHUNK_SIZE: usize = 512; // Largest payload one characteristic read can carry
pub const RESET_COMMAND: &str = "reset"; // Literal the cursor-control characteristics expect
pub const EOF_SENTINEL: &str = "EOF"; // Literal that ends a line-oriented stream

/// End-of-stream convention of one data characteristic.
///
/// Which convention applies is a property of the endpoint, so every pull
/// names it explicitly instead of inferring it from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Chunks keep coming while each one fills `max_chunk` bytes; the first
    /// shorter (or empty) chunk is the last.
    SizeSentinel { max_chunk: usize },
    /// Whole-value payloads keep coming until one equals `terminator`.
    ValueSentinel { terminator: &'static str },
}

/// One pullable endpoint: data characteristic, its cursor reset, and framing.
#[derive(Debug, Clone, Copy)]
pub struct FileSource {
    pub data: CharacteristicAddress,
    pub reset: CharacteristicAddress,
    pub framing: Framing,
}

/// Rewind the device-side read cursor behind `reset`.
///
/// Must complete before the first chunk read of a fresh pull; the pull
/// functions below sequence this themselves.
pub async fn reset_offset<T: GattTransport>(
    transport: &mut T,
    reset: CharacteristicAddress,
) -> Result<()> {
    transport.write(reset, RESET_COMMAND).await
}

/// Pull one complete file from a size-sentinel source.
///
/// Chunks are appended strictly in read order. The transfer is all-or-nothing:
/// any transport error aborts it and no partial payload is returned.
pub async fn pull_bytes<T: GattTransport>(transport: &mut T, source: FileSource) -> Result<Vec<u8>> {
    let max_chunk = match source.framing {
        Framing::SizeSentinel { max_chunk } => max_chunk,
        Framing::ValueSentinel { .. } => {
            return Err(Error::TransferFailed {
                characteristic: source.data.characteristic,
                reason: "value-sentinel source carries lines, not bytes".to_string(),
            })
        }
    };

    reset_offset(transport, source.reset)
        .await
        .map_err(|e| transfer_error(source.data.characteristic, &e))?;

    let mut payload = Vec::new();
    let mut chunks = 0usize;
    loop {
        let chunk = transport
            .read_bytes(source.data)
            .await
            .map_err(|e| transfer_error(source.data.characteristic, &e))?;
        let received = chunk.len();
        payload.extend_from_slice(&chunk);
        chunks += 1;
        debug!(
            "Chunk {} ({} bytes) from {}, {} bytes so far",
            chunks,
            received,
            source.data.characteristic,
            payload.len()
        );
        if received < max_chunk {
            break;
        }
    }
    Ok(payload)
}

/// Pull a size-sentinel source and decode the payload as UTF-8 text.
pub async fn pull_text<T: GattTransport>(transport: &mut T, source: FileSource) -> Result<String> {
    let payload = pull_bytes(transport, source).await?;
    String::from_utf8(payload).map_err(|_| Error::TransferFailed {
        characteristic: source.data.characteristic,
        reason: "payload is not valid UTF-8".to_string(),
    })
}

/// Pull whole-value lines from a value-sentinel source.
///
/// The terminator is consumed but never appended to the result. An empty
/// payload also ends the stream, so a device that stops serving lines cannot
/// hang the loop.
pub async fn pull_lines<T: GattTransport>(
    transport: &mut T,
    source: FileSource,
) -> Result<Vec<String>> {
    let terminator = match source.framing {
        Framing::ValueSentinel { terminator } => terminator,
        Framing::SizeSentinel { .. } => {
            return Err(Error::TransferFailed {
                characteristic: source.data.characteristic,
                reason: "size-sentinel source carries bytes, not lines".to_string(),
            })
        }
    };

    reset_offset(transport, source.reset)
        .await
        .map_err(|e| transfer_error(source.data.characteristic, &e))?;

    let mut lines = Vec::new();
    loop {
        let line = transport
            .read(source.data)
            .await
            .map_err(|e| transfer_error(source.data.characteristic, &e))?;
        if line == terminator || line.is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines)
}

fn transfer_error(characteristic: Uuid, cause: &Error) -> Error {
    Error::TransferFailed {
        characteristic,
        reason: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::mock::{MockTransport, Op};
    use crate::uuids;

    fn sized_source(max_chunk: usize) -> FileSource {
        FileSource {
            data: uuids::addr(uuids::CPU_FILE),
            reset: uuids::addr(uuids::FILE_CURSOR_RESET),
            framing: Framing::SizeSentinel { max_chunk },
        }
    }

    fn line_source() -> FileSource {
        FileSource {
            data: uuids::addr(uuids::VIDEO_SIZE_LINE),
            reset: uuids::addr(uuids::VIDEO_SIZE_CURSOR_RESET),
            framing: Framing::ValueSentinel {
                terminator: EOF_SENTINEL,
            },
        }
    }

    #[tokio::test]
    async fn test_size_sentinel_reassembles_chunks_in_read_order() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CPU_FILE, "abcd");
        transport.push_read(uuids::CPU_FILE, "efgh");
        transport.push_read(uuids::CPU_FILE, "xy");

        let payload = pull_bytes(&mut transport, sized_source(4)).await.unwrap();
        assert_eq!(payload, b"abcdefghxy");
        assert_eq!(transport.reads_of(uuids::CPU_FILE), 3);
    }

    #[tokio::test]
    async fn test_reset_completes_before_the_first_chunk_read() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CPU_FILE, "x");

        pull_bytes(&mut transport, sized_source(4)).await.unwrap();
        assert_eq!(
            transport.journal[0],
            Op::Write(uuids::FILE_CURSOR_RESET, RESET_COMMAND.to_string())
        );
        assert!(matches!(transport.journal[1], Op::Read(c) if c == uuids::CPU_FILE));
    }

    #[tokio::test]
    async fn test_empty_chunk_ends_an_exact_multiple_payload() {
        let mut transport = MockTransport::new();
        // Payload length is a multiple of the chunk size, so the device
        // signals the end with an empty read
        transport.push_chunked(uuids::CPU_FILE, b"abcdefgh", 4);

        let payload = pull_bytes(&mut transport, sized_source(4)).await.unwrap();
        assert_eq!(payload, b"abcdefgh");
        assert_eq!(transport.reads_of(uuids::CPU_FILE), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_read_aborts_without_partial_payload() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CPU_FILE, "abcd");
        transport.push_read_failure(uuids::CPU_FILE, "disconnected");

        let err = pull_bytes(&mut transport, sized_source(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransferFailed { .. }));
    }

    #[tokio::test]
    async fn test_pull_text_decodes_the_reassembled_payload() {
        let mut transport = MockTransport::new();
        transport.push_chunked(uuids::CPU_FILE, b"\"14-00-00\",31.2,ok", 8);

        let text = pull_text(&mut transport, sized_source(8)).await.unwrap();
        assert_eq!(text, "\"14-00-00\",31.2,ok");
    }

    #[tokio::test]
    async fn test_value_sentinel_stops_at_terminator_without_keeping_it() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::VIDEO_SIZE_LINE, "a");
        transport.push_read(uuids::VIDEO_SIZE_LINE, "b");
        transport.push_read(uuids::VIDEO_SIZE_LINE, "EOF");

        let lines = pull_lines(&mut transport, line_source()).await.unwrap();
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(transport.reads_of(uuids::VIDEO_SIZE_LINE), 3);
    }

    #[tokio::test]
    async fn test_value_sentinel_treats_empty_payload_as_end() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::VIDEO_SIZE_LINE, "a");
        transport.push_read(uuids::VIDEO_SIZE_LINE, "");
        transport.push_read(uuids::VIDEO_SIZE_LINE, "b");
        transport.push_read(uuids::VIDEO_SIZE_LINE, "EOF");

        let lines = pull_lines(&mut transport, line_source()).await.unwrap();
        // A blank payload ends the pull early; lines behind it stay unread
        assert_eq!(lines, vec!["a".to_string()]);
        assert_eq!(transport.reads_of(uuids::VIDEO_SIZE_LINE), 2);
    }

    #[tokio::test]
    async fn test_framing_mismatch_is_rejected() {
        let mut transport = MockTransport::new();
        assert!(pull_bytes(&mut transport, line_source()).await.is_err());
        assert!(pull_lines(&mut transport, sized_source(4)).await.is_err());
        // Nothing was written or read for either refused pull
        assert!(transport.journal.is_empty());
    }
}
