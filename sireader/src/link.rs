//! Frame exchange over a transport

use std::time::Duration;

use tracing::{trace, warn};

use sireader_core::{
    Frame, Request,
    constants::{NAK, STX, WAKEUP},
};
use sireader_transport::Transport;

use crate::error::{Error, Result};

/// Sends requests and reads reply frames, one at a time
pub(crate) struct Link {
    transport: Box<dyn Transport>,
    timeout: Duration,
    wakeup: bool,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, timeout: Duration, wakeup: bool) -> Self {
        Self {
            transport,
            timeout,
            wakeup,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_wakeup(&mut self, wakeup: bool) {
        self.wakeup = wakeup;
    }

    /// Bytes waiting to be read
    pub fn pending(&self) -> Result<usize> {
        Ok(self.transport.bytes_available()?)
    }

    /// Send a request; the previous exchange must be fully consumed
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let pending = self.pending()?;
        if pending != 0 {
            return Err(Error::Protocol(format!(
                "Input buffer must be empty before sending command, {} bytes pending",
                pending
            )));
        }

        trace!("Sending: {:?}", request);

        let data = request.encode(self.wakeup)?;
        self.transport.send(&data).await?;
        Ok(())
    }

    /// Send bytes outside of any frame
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!("Sending raw: {:02X?}", data);
        self.transport.send(data).await?;
        Ok(())
    }

    /// Read one frame
    ///
    /// `first_byte` bounds the wait for the start of the frame, the rest
    /// is read with the link timeout.
    pub async fn read_frame(&mut self, first_byte: Duration) -> Result<Frame> {
        let mut start = self.read_byte(first_byte).await?;
        if start == Some(WAKEUP) {
            start = self.read_byte(first_byte).await?;
        }

        match start {
            None => return Err(Error::Timeout),
            Some(STX) => {}
            Some(NAK) => return Err(Error::Protocol("Invalid command or parameter".into())),
            Some(other) => {
                warn!("Invalid start byte 0x{:02X}, flushing input", other);
                self.transport.flush_input()?;
                return Err(sireader_core::Error::InvalidStartByte(other).into());
            }
        }

        match self.read_body().await {
            Ok(frame) => {
                trace!("Received: {:?}", frame);
                Ok(frame)
            }
            Err(Error::Core(e)) => {
                warn!("Dropping corrupt frame ({}), flushing input", e);
                self.transport.flush_input()?;
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Everything after STX
    async fn read_body(&mut self) -> Result<Frame> {
        let mut buf = self.transport.receive(Frame::HEADER_SIZE, self.timeout).await?;
        if buf.len() < Frame::HEADER_SIZE {
            return Err(sireader_core::Error::FrameTooShort {
                expected: Frame::HEADER_SIZE,
                actual: buf.len(),
            }
            .into());
        }

        let remaining = Frame::remaining_len(buf[1])?;
        let tail = self.transport.receive(remaining, self.timeout).await?;
        buf.extend_from_slice(&tail);

        Ok(Frame::decode(buf.freeze())?)
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        let buf = self.transport.receive(1, timeout).await?;
        Ok(buf.first().copied())
    }

    /// Send a request and read the reply
    pub async fn exchange(&mut self, request: &Request) -> Result<Frame> {
        self.send(request).await?;
        self.read_frame(self.timeout).await
    }
}
