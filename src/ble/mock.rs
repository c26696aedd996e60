//! Scripted transport for exercising protocol logic without a radio.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bluer::Uuid;

use crate::ble::transport::{CharacteristicAddress, GattTransport};
use crate::error::{Error, Result};

/// One recorded transport call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read(Uuid),
    Write(Uuid, String),
}

enum Scripted {
    Value(Vec<u8>),
    Failure(String),
}

/// GattTransport whose reads are served from per-characteristic queues and whose
/// every call lands in a journal, so tests can assert both values and order.
#[derive(Default)]
pub struct MockTransport {
    reads: HashMap<Uuid, VecDeque<Scripted>>,
    write_failures: HashMap<Uuid, VecDeque<String>>,
    pub journal: Vec<Op>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text payload for a future read of `characteristic`.
    pub fn push_read(&mut self, characteristic: Uuid, value: &str) {
        self.push_read_bytes(characteristic, value.as_bytes().to_vec());
    }

    pub fn push_read_bytes(&mut self, characteristic: Uuid, value: Vec<u8>) {
        self.reads
            .entry(characteristic)
            .or_default()
            .push_back(Scripted::Value(value));
    }

    /// Script `payload` as the chunk sequence a size-sentinel pull would see.
    ///
    /// Splits the payload into `max_chunk`-sized reads and, when it divides
    /// evenly, appends the empty read the device uses to mark the end.
    pub fn push_chunked(&mut self, characteristic: Uuid, payload: &[u8], max_chunk: usize) {
        for chunk in payload.chunks(max_chunk) {
            self.push_read_bytes(characteristic, chunk.to_vec());
        }
        if payload.len() % max_chunk == 0 {
            self.push_read_bytes(characteristic, Vec::new());
        }
    }

    /// Queue a read failure with the given reason text.
    pub fn push_read_failure(&mut self, characteristic: Uuid, reason: &str) {
        self.reads
            .entry(characteristic)
            .or_default()
            .push_back(Scripted::Failure(reason.to_string()));
    }

    /// Queue a write failure with the given reason text.
    pub fn push_write_failure(&mut self, characteristic: Uuid, reason: &str) {
        self.write_failures
            .entry(characteristic)
            .or_default()
            .push_back(reason.to_string());
    }

    /// Every value written to `characteristic`, in order.
    pub fn writes_to(&self, characteristic: Uuid) -> Vec<String> {
        self.journal
            .iter()
            .filter_map(|op| match op {
                Op::Write(c, value) if *c == characteristic => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many times `characteristic` has been read.
    pub fn reads_of(&self, characteristic: Uuid) -> usize {
        self.journal
            .iter()
            .filter(|op| matches!(op, Op::Read(c) if *c == characteristic))
            .count()
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    async fn read_bytes(&mut self, addr: CharacteristicAddress) -> Result<Vec<u8>> {
        self.journal.push(Op::Read(addr.characteristic));
        match self
            .reads
            .get_mut(&addr.characteristic)
            .and_then(|queue| queue.pop_front())
        {
            Some(Scripted::Value(bytes)) => Ok(bytes),
            Some(Scripted::Failure(reason)) => Err(Error::ReadFailed {
                characteristic: addr.characteristic,
                reason,
            }),
            None => Err(Error::ReadFailed {
                characteristic: addr.characteristic,
                reason: "no scripted response".to_string(),
            }),
        }
    }

    async fn write(&mut self, addr: CharacteristicAddress, value: &str) -> Result<()> {
        self.journal
            .push(Op::Write(addr.characteristic, value.to_string()));
        match self
            .write_failures
            .get_mut(&addr.characteristic)
            .and_then(|queue| queue.pop_front())
        {
            Some(reason) => Err(Error::WriteFailed {
                characteristic: addr.characteristic,
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuids;

    #[tokio::test]
    async fn test_reads_are_served_in_fifo_order() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CPU_LINE, "first");
        transport.push_read(uuids::CPU_LINE, "second");

        let addr = uuids::addr(uuids::CPU_LINE);
        assert_eq!(transport.read(addr).await.unwrap(), "first");
        assert_eq!(transport.read(addr).await.unwrap(), "second");
        assert!(transport.read(addr).await.is_err());
        assert_eq!(transport.reads_of(uuids::CPU_LINE), 3);
    }

    #[tokio::test]
    async fn test_journal_preserves_call_order_across_characteristics() {
        let mut transport = MockTransport::new();
        transport.push_read(uuids::CPU_FILE, "payload");

        transport
            .write(uuids::addr(uuids::FILE_CURSOR_RESET), "reset")
            .await
            .unwrap();
        transport.read(uuids::addr(uuids::CPU_FILE)).await.unwrap();

        assert_eq!(
            transport.journal,
            vec![
                Op::Write(uuids::FILE_CURSOR_RESET, "reset".to_string()),
                Op::Read(uuids::CPU_FILE),
            ]
        );
        assert_eq!(
            transport.writes_to(uuids::FILE_CURSOR_RESET),
            vec!["reset".to_string()]
        );
    }
}
