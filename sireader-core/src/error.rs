//! Error types for sireader-core
/// Result type alias for sireader-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// CRC verification failed
    #[error("CRC mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// First byte of a reply was neither STX, WAKEUP nor NAK
    #[error("Invalid start byte 0x{0:02X}")]
    InvalidStartByte(u8),

    /// Frame did not end with ETX
    #[error("No ETX byte received (got 0x{0:02X})")]
    MissingEtx(u8),

    /// Length field too small to hold the station code
    #[error("Invalid frame length field: {0}")]
    InvalidLength(u8),

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Session not initialized
    #[error("Session not initialized - connect to station first")]
    SessionNotInitialized,

    /// Parameters too large for the 1-byte length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// First card number byte is not zero
    #[error("Unknown card series 0x{0:02X}")]
    UnknownCardSeries(u8),

    /// Card number outside every supported card family
    #[error("Unknown card type for card number {0}")]
    UnknownCardType(u32),

    /// Card payload shorter than its layout requires
    #[error("{model} card data too short: need offset {offset}, got {actual} bytes")]
    CardDataTooShort {
        model: &'static str,
        offset: usize,
        actual: usize,
    },

    /// System configuration block shorter than expected
    #[error("System configuration too short: expected {expected} bytes, got {actual} bytes")]
    SysvalTooShort {
        expected: usize,
        actual: usize,
    },

    /// Date fields that cannot be normalized
    #[error("Invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate {
        year: i32,
        month: u32,
        day: u32,
    },

    /// Record of a bulk transfer is truncated
    #[error("Record too short: expected {expected} bytes, got {actual} bytes")]
    RecordTooShort {
        expected: usize,
        actual: usize,
    },
}

impl Error {
    /// Check if error is caused by a corrupted frame (bad markers, length or CRC)
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort { .. }
                | Self::ChecksumMismatch { .. }
                | Self::InvalidStartByte(_)
                | Self::MissingEtx(_)
                | Self::InvalidLength(_)
        )
    }

    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        self.is_frame_error() || matches!(self, Self::UnknownCommand(_))
    }

    /// Check if error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::SessionNotInitialized | Self::InvalidSessionState(_)
        )
    }
}
