//! SportIdent protocol frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    command::Command,
    constants::{ETX, STX, WAKEUP},
    crc,
    error::{Error, Result},
};

/// Outgoing command
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬─────┬─────────┬────────┬────────────┬───────┬─────┐
/// │ WAKEUP │ STX │ Command │ Length │ Parameters │ CRC16 │ ETX │
/// │  (FF)  │ 02  │ 1 byte  │ 1 byte │  N bytes   │ BE u16│ 03  │
/// └────────┴─────┴─────────┴────────┴────────────┴───────┴─────┘
/// ```
///
/// The CRC covers command, length and parameters. The wake-up byte is
/// optional.
///
/// # Examples
///
/// ```
/// use sireader_core::{Command, Request};
///
/// let request = Request::with_parameters(Command::SetMs, vec![0x4D]);
/// let encoded = request.encode(false).unwrap();
/// assert_eq!(&encoded[..], &[0x02, 0xF0, 0x01, 0x4D, 0x6D, 0x0A, 0x03]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub parameters: Bytes,
}

impl Request {
    /// Maximum parameter length
    pub const MAX_PARAMETERS: usize = u8::MAX as usize;

    /// Create a request without parameters
    pub fn new(command: Command) -> Self {
        Self {
            command,
            parameters: Bytes::new(),
        }
    }

    pub fn with_parameters(command: Command, parameters: impl Into<Bytes>) -> Self {
        Self {
            command,
            parameters: parameters.into(),
        }
    }

    /// Encode request to bytes, optionally preceded by a wake-up byte
    pub fn encode(&self, wakeup: bool) -> Result<BytesMut> {
        if self.parameters.len() > Self::MAX_PARAMETERS {
            return Err(Error::PayloadTooLarge {
                size: self.parameters.len(),
                max: Self::MAX_PARAMETERS,
            });
        }

        let mut body = BytesMut::with_capacity(2 + self.parameters.len());
        body.put_u8(self.command.into());
        body.put_u8(self.parameters.len() as u8);
        body.put_slice(&self.parameters);

        let mut buf = BytesMut::with_capacity(body.len() + 5);
        if wakeup {
            buf.put_u8(WAKEUP);
        }
        buf.put_u8(STX);
        buf.put_slice(&body);
        buf.put_u16(crc::calculate(&body));
        buf.put_u8(ETX);

        Ok(buf)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("parameters", &hex::encode_upper(&self.parameters))
            .finish()
    }
}

/// Reply frame received from a station
///
/// # Frame Structure
///
/// ```text
/// ┌─────┬─────────┬────────┬──────────────┬─────────┬───────┬─────┐
/// │ STX │ Command │ Length │ Station code │  Data   │ CRC16 │ ETX │
/// │ 02  │ 1 byte  │ 1 byte │    BE u16    │ Len - 2 │ BE u16│ 03  │
/// └─────┴─────────┴────────┴──────────────┴─────────┴───────┴─────┘
/// ```
///
/// The length field counts station code and data. The CRC covers
/// everything from command to the end of data.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,

    /// Code of the station that sent the frame
    pub station_code: u16,

    pub data: Bytes,
}

impl Frame {
    /// Command and length bytes following STX
    pub const HEADER_SIZE: usize = 2;

    /// Create a frame (mostly useful to emulate a station)
    pub fn new(command: Command, station_code: u16, data: impl Into<Bytes>) -> Self {
        Self {
            command,
            station_code,
            data: data.into(),
        }
    }

    /// Number of bytes that follow command and length for a given length
    /// field: station code, data, CRC and ETX
    pub fn remaining_len(length: u8) -> Result<usize> {
        if length < 2 {
            return Err(Error::InvalidLength(length));
        }
        Ok(usize::from(length) + 3)
    }

    /// Decode a frame from the bytes following STX
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is shorter than the length field announces
    /// - ETX is missing
    /// - CRC verification fails
    /// - Command code is unknown
    ///
    /// # Examples
    ///
    /// ```
    /// use sireader_core::{Command, Frame};
    ///
    /// let original = Frame::new(Command::Beep, 31, vec![0x01]);
    /// let encoded = original.encode();
    /// let decoded = Frame::decode(encoded.slice(1..)).unwrap();
    ///
    /// assert_eq!(original, decoded);
    /// ```
    pub fn decode(buf: impl Into<Bytes>) -> Result<Self> {
        let mut buf: Bytes = buf.into();

        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::FrameTooShort {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let length = buf[1];
        let expected = Self::HEADER_SIZE + Self::remaining_len(length)?;
        if buf.len() < expected {
            return Err(Error::FrameTooShort {
                expected,
                actual: buf.len(),
            });
        }

        let etx = buf[expected - 1];
        if etx != ETX {
            return Err(Error::MissingEtx(etx));
        }

        let covered = buf.slice(..expected - 3);
        let received = u16::from_be_bytes([buf[expected - 3], buf[expected - 2]]);
        let calculated = crc::calculate(&covered);
        if calculated != received {
            return Err(Error::ChecksumMismatch {
                expected: calculated,
                received,
            });
        }

        let command = Command::try_from(buf.get_u8())?;
        let _length = buf.get_u8();
        let station_code = buf.get_u16();
        let data = buf.slice(..usize::from(length) - 2);

        Ok(Self {
            command,
            station_code,
            data,
        })
    }

    /// Encode frame to bytes, as a station would send it
    ///
    /// # Panics
    ///
    /// Panics if the data does not fit the 1-byte length field.
    pub fn encode(&self) -> Bytes {
        assert!(self.data.len() <= usize::from(u8::MAX) - 2, "frame data too large");

        let mut body = BytesMut::with_capacity(4 + self.data.len());
        body.put_u8(self.command.into());
        body.put_u8((self.data.len() + 2) as u8);
        body.put_u16(self.station_code);
        body.put_slice(&self.data);

        let mut buf = BytesMut::with_capacity(body.len() + 4);
        buf.put_u8(STX);
        buf.put_slice(&body);
        buf.put_u16(crc::calculate(&body));
        buf.put_u8(ETX);

        buf.freeze()
    }

    /// Get total frame size including framing bytes
    pub fn size(&self) -> usize {
        1 + Self::HEADER_SIZE + 2 + self.data.len() + 3
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("command", &self.command)
            .field("station_code", &self.station_code)
            .field("data", &hex::encode_upper(&self.data))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](station={}, len={})",
            self.command,
            self.station_code,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_request_encode_with_wakeup() {
        let request = Request::with_parameters(Command::GetSysVal, vec![0x00, 0x80]);
        let encoded = request.encode(true).unwrap();

        assert_eq!(
            &encoded[..],
            &[0xFF, 0x02, 0x83, 0x02, 0x00, 0x80, 0xBF, 0x17, 0x03]
        );
    }

    #[test]
    fn test_request_without_parameters() {
        let encoded = Request::new(Command::GetTime).encode(false).unwrap();
        assert_eq!(encoded.len(), 6);
        assert_eq!(encoded[2], 0);
    }

    #[test]
    fn test_request_too_large() {
        let request = Request::with_parameters(Command::SetSysVal, vec![0u8; 300]);
        assert!(matches!(
            request.encode(false),
            Err(Error::PayloadTooLarge { size: 300, .. })
        ));
    }

    #[test]
    fn test_frame_encode_decode() {
        let original = Frame::new(Command::GetTime, 0x001F, vec![24, 5, 4, 0x0D, 0x12, 0x34, 0x80]);

        let encoded = original.encode();
        assert_eq!(encoded.len(), original.size());

        let decoded = Frame::decode(encoded.slice(1..)).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_frame_checksum_verification() {
        let frame = Frame::new(Command::SetMs, 31, vec![0x4D]);
        let mut encoded = BytesMut::from(&frame.encode()[..]);

        // Corrupt the data byte
        encoded[5] ^= 0xFF;

        let result = Frame::decode(encoded.freeze().slice(1..));
        if let Err(Error::ChecksumMismatch { expected, received }) = result {
            assert_ne!(expected, received);
        } else {
            panic!("Expected ChecksumMismatch error");
        }
    }

    #[test]
    fn test_frame_missing_etx() {
        let frame = Frame::new(Command::SetMs, 31, vec![0x4D]);
        let mut encoded = BytesMut::from(&frame.encode()[..]);
        let last = encoded.len() - 1;
        encoded[last] = 0x00;

        let result = Frame::decode(encoded.freeze().slice(1..));
        assert!(matches!(result, Err(Error::MissingEtx(0x00))));
    }

    #[test]
    fn test_frame_too_short() {
        let result = Frame::decode(vec![0xF0, 0x03, 0x00]);
        assert!(matches!(result, Err(Error::FrameTooShort { expected: 8, actual: 3 })));
    }

    #[test]
    fn test_frame_invalid_length_field() {
        assert!(matches!(Frame::remaining_len(1), Err(Error::InvalidLength(1))));
        assert_eq!(Frame::remaining_len(2).unwrap(), 5);
    }

    #[test]
    fn test_frame_unknown_command() {
        // Valid CRC but a radio command we do not handle
        let mut body = vec![0xA7, 0x02, 0x00, 0x01];
        let crc = crc::calculate(&body);
        body.extend_from_slice(&crc.to_be_bytes());
        body.push(ETX);

        assert!(matches!(Frame::decode(body), Err(Error::UnknownCommand(0xA7))));
    }

    proptest! {
        #[test]
        fn prop_frame_roundtrip(
            station in any::<u16>(),
            data in proptest::collection::vec(any::<u8>(), 0..120),
        ) {
            let frame = Frame::new(Command::GetBackup, station, data);
            let decoded = Frame::decode(frame.encode().slice(1..)).unwrap();
            prop_assert_eq!(decoded, frame);
        }
    }
}
