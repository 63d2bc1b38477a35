//! Serial port transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{Instant, timeout};
use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
use tracing::{debug, trace, warn};

use crate::{Transport, error::*};

/// Serial transport for SportIdent stations (8N1, no flow control)
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create new serial transport for a device path such as
    /// `/dev/ttyUSB0` or `COM3`
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 0,
            stream: None,
        }
    }

    fn stream(&self) -> Result<&SerialStream> {
        self.stream.as_ref().ok_or(Error::NotConnected)
    }
}

/// Names of the serial devices present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    Ok(tokio_serial::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self, baud_rate: u32) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud...", self.port, baud_rate);

        let builder = tokio_serial::new(&self.port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None);

        let stream = SerialStream::open(&builder).map_err(|source| Error::Open {
            port: self.port.clone(),
            source,
        })?;

        // Drop whatever the station sent before we were listening
        stream.clear(ClearBuffer::All)?;

        self.stream = Some(stream);
        self.baud_rate = baud_rate;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("Closed {}", self.port);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.set_baud_rate(baud_rate)?;
        debug!("{} switched to {} baud", self.port, baud_rate);
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), data);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self, len: usize, wait: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let deadline = Instant::now() + wait;
        let mut buf = BytesMut::with_capacity(len);

        while buf.len() < len {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let want = len - buf.len();
            let mut limited = (&mut buf).limit(want);

            match timeout(remaining, stream.read_buf(&mut limited)).await {
                Ok(Ok(0)) => return Err(Error::ConnectionClosed),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(Error::Io(e)),
                Err(_) => break,
            }
        }

        if !buf.is_empty() {
            trace!("Received {} bytes: {:02X?}", buf.len(), &buf[..]);
        }

        Ok(buf)
    }

    fn bytes_available(&self) -> Result<usize> {
        Ok(self.stream()?.bytes_to_read()? as usize)
    }

    fn flush_input(&mut self) -> Result<()> {
        self.stream()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.stream()?.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn port_name(&self) -> String {
        self.port.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while still connected");
        }
    }
}
