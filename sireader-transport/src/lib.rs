//! Transport layer for SportIdent stations
//!
//! Provides byte-level serial communication with stations.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod serial;

pub use error::{Error, Result};
pub use serial::{SerialTransport, available_ports};

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send {
    /// Open the link at a baud rate
    async fn connect(&mut self, baud_rate: u32) -> Result<()>;

    /// Close the link
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Change the baud rate of an open link
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    fn baud_rate(&self) -> u32;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive up to `len` bytes
    ///
    /// Returns fewer bytes (possibly none) if `timeout` expires first.
    async fn receive(&mut self, len: usize, timeout: Duration) -> Result<BytesMut>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&self) -> Result<usize>;

    /// Discard pending input
    fn flush_input(&mut self) -> Result<()>;

    /// Discard pending output
    fn flush_output(&mut self) -> Result<()>;

    /// Get port name
    fn port_name(&self) -> String;
}
