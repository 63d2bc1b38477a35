//! Session management for the SportIdent protocol
//!
//! A session represents a connection to a station and tracks:
//! - Port name and baud rate
//! - Direct or remote addressing
//! - The last system configuration read from the station
//! - The station code seen in the most recent reply

use crate::{
    error::{Error, Result},
    sysval::{ProtocolConfig, SystemConfig},
};

/// Which station commands are addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// The station attached to the serial port ("master")
    Direct,

    /// The station coupled to the attached one ("slave")
    Remote,
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Port open, handshake in progress
    Connecting,

    /// Handshake done, ready for commands
    Connected(Addressing),
}

/// Session state of one station connection
///
/// The cached configuration goes stale after any command that changes
/// it and must be refreshed before it is trusted again.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    port: Option<String>,
    baud_rate: u32,
    station_code: u16,
    config: Option<SystemConfig>,
    stale: bool,
}

impl Session {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            port: None,
            baud_rate: 0,
            station_code: 0,
            config: None,
            stale: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected(_))
    }

    /// Current addressing, if connected
    pub fn addressing(&self) -> Option<Addressing> {
        match self.state {
            SessionState::Connected(addressing) => Some(addressing),
            _ => None,
        }
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Start connecting on a port
    pub fn begin_connect(&mut self, port: impl Into<String>, baud_rate: u32) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot connect from state: {:?}",
                self.state
            )));
        }

        self.port = Some(port.into());
        self.baud_rate = baud_rate;
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Record a baud rate change of the link
    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    /// Complete the handshake; the station answered a direct addressing
    /// command
    pub fn establish(&mut self) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(Error::InvalidSessionState(format!(
                "Cannot establish from state: {:?}",
                self.state
            )));
        }

        self.state = SessionState::Connected(Addressing::Direct);
        Ok(())
    }

    /// Switch between direct and remote addressing
    ///
    /// The configuration cached for the previous station no longer
    /// applies.
    pub fn set_addressing(&mut self, addressing: Addressing) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::SessionNotInitialized);
        }

        if self.addressing() != Some(addressing) {
            self.stale = true;
        }
        self.state = SessionState::Connected(addressing);
        Ok(())
    }

    /// Close session
    pub fn close(&mut self) {
        self.state = SessionState::Disconnected;
        self.config = None;
        self.station_code = 0;
        self.stale = false;
    }

    /// Station code of the most recent reply
    pub fn station_code(&self) -> u16 {
        self.station_code
    }

    pub fn observe_station_code(&mut self, code: u16) {
        self.station_code = code;
    }

    /// Store a freshly read configuration block
    pub fn update_config(&mut self, config: SystemConfig) {
        self.config = Some(config);
        self.stale = false;
    }

    /// Mark the cached configuration as outdated
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Cached configuration block
    pub fn config(&self) -> Result<&SystemConfig> {
        self.config.as_ref().ok_or(Error::SessionNotInitialized)
    }

    pub fn protocol_config(&self) -> Result<ProtocolConfig> {
        self.config().map(SystemConfig::protocol)
    }

    pub fn serial_number(&self) -> Result<u32> {
        self.config().map(SystemConfig::serial_number)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
