//! High-level error types

use sireader_types::OperatingMode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] sireader_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] sireader_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] sireader_types::Error),

    /// No reply within the read timeout
    #[error("No data available")]
    Timeout,

    /// The station refused a command or sent something out of place
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Station is in unsupported mode: {}", .0.name())]
    UnsupportedMode(OperatingMode),

    #[error("Operation requires {0} mode, switch mode first")]
    UnsupportedProtocol(&'static str),

    /// A card was inserted or removed while reading
    #[error("SI-card changed during command")]
    CardChanged,

    #[error("No card in the station")]
    NoCard,

    #[error("Station not connected")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout | Self::Protocol(_) | Self::CardChanged => true,
            Self::Core(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Check if error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::Core(e) => e.requires_reconnect(),
            Self::Transport(e) => matches!(
                e,
                sireader_transport::Error::NotConnected
                    | sireader_transport::Error::ConnectionClosed
                    | sireader_transport::Error::Io(_)
            ),
            _ => false,
        }
    }
}
