//! In-memory transport that replays scripted station replies
//!
//! Each `send` pops the next scripted reply and makes it available for
//! reading. Bytes can also be injected at any time to simulate data the
//! station pushes on its own.
//!
//! Enabled by the `mock` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tracing::trace;

use crate::{Transport, error::*};

#[derive(Debug, Clone)]
enum Reply {
    Bytes(Vec<u8>),
    Silence,
}

#[derive(Debug, Default)]
struct Script {
    connected: bool,
    baud_rate: u32,
    input: VecDeque<u8>,
    replies: VecDeque<Reply>,
    sent: Vec<Vec<u8>>,
    connects: Vec<u32>,
    baud_changes: Vec<u32>,
    refuse_open: bool,
}

/// Shared view of a [`ScriptedTransport`], usable after the transport
/// has been moved into a station
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the reply to the next command
    pub fn push_reply(&self, bytes: impl Into<Vec<u8>>) {
        self.lock().replies.push_back(Reply::Bytes(bytes.into()));
    }

    /// The next command gets no reply
    pub fn push_silence(&self) {
        self.lock().replies.push_back(Reply::Silence);
    }

    /// Make bytes readable right away
    pub fn inject(&self, bytes: impl AsRef<[u8]>) {
        self.lock().input.extend(bytes.as_ref());
    }

    /// Everything sent so far, one entry per `send`
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Baud rates passed to `connect`
    pub fn connects(&self) -> Vec<u32> {
        self.lock().connects.clone()
    }

    /// Baud rates passed to `set_baud_rate`
    pub fn baud_changes(&self) -> Vec<u32> {
        self.lock().baud_changes.clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.lock().replies.len()
    }

    pub fn pending_input(&self) -> usize {
        self.lock().input.len()
    }

    /// Fail every `connect`, like a missing device node
    pub fn refuse_open(&self) {
        self.lock().refuse_open = true;
    }
}

/// Scripted transport for tests and demos without hardware
#[derive(Debug)]
pub struct ScriptedTransport {
    name: String,
    handle: ScriptHandle,
}

impl ScriptedTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: ScriptHandle::default(),
        }
    }

    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self, baud_rate: u32) -> Result<()> {
        let mut script = self.handle.lock();
        if script.refuse_open {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such port: {}", self.name),
            )));
        }
        if script.connected {
            return Err(Error::AlreadyConnected);
        }
        script.connected = true;
        script.baud_rate = baud_rate;
        script.connects.push(baud_rate);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.handle.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.lock().connected
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let mut script = self.handle.lock();
        if !script.connected {
            return Err(Error::NotConnected);
        }
        script.baud_rate = baud_rate;
        script.baud_changes.push(baud_rate);
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.handle.lock().baud_rate
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut script = self.handle.lock();
        if !script.connected {
            return Err(Error::NotConnected);
        }

        trace!("Mock sending {} bytes: {:02X?}", data.len(), data);
        script.sent.push(data.to_vec());

        if let Some(Reply::Bytes(reply)) = script.replies.pop_front() {
            script.input.extend(reply);
        }
        Ok(())
    }

    /// Never waits: a missing reply looks like an expired timeout
    async fn receive(&mut self, len: usize, _timeout: Duration) -> Result<BytesMut> {
        let mut script = self.handle.lock();
        if !script.connected {
            return Err(Error::NotConnected);
        }

        let take = len.min(script.input.len());
        let bytes: Vec<u8> = script.input.drain(..take).collect();
        Ok(BytesMut::from(&bytes[..]))
    }

    fn bytes_available(&self) -> Result<usize> {
        Ok(self.handle.lock().input.len())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.handle.lock().input.clear();
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        Ok(())
    }

    fn port_name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_follows_send() {
        let mut transport = ScriptedTransport::new("mock");
        let handle = transport.handle();
        handle.push_silence();
        handle.push_reply(vec![1, 2, 3]);

        transport.connect(38400).await.unwrap();

        transport.send(&[0xAA]).await.unwrap();
        assert_eq!(transport.bytes_available().unwrap(), 0);

        transport.send(&[0xBB]).await.unwrap();
        assert_eq!(transport.bytes_available().unwrap(), 3);

        let first = transport.receive(2, Duration::ZERO).await.unwrap();
        assert_eq!(&first[..], &[1, 2]);
        let rest = transport.receive(5, Duration::ZERO).await.unwrap();
        assert_eq!(&rest[..], &[3]);

        assert_eq!(handle.sent(), vec![vec![0xAA], vec![0xBB]]);
    }

    #[tokio::test]
    async fn test_inject_and_flush() {
        let mut transport = ScriptedTransport::new("mock");
        let handle = transport.handle();
        transport.connect(4800).await.unwrap();

        handle.inject([0xE7, 0x00]);
        assert_eq!(transport.bytes_available().unwrap(), 2);

        transport.flush_input().unwrap();
        assert_eq!(handle.pending_input(), 0);
    }

    #[tokio::test]
    async fn test_refuse_open() {
        let mut transport = ScriptedTransport::new("COM9");
        transport.handle().refuse_open();

        assert!(transport.connect(38400).await.is_err());
        assert!(matches!(transport.send(&[0]).await, Err(Error::NotConnected)));
    }
}
