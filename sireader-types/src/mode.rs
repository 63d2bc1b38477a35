//! Station operating modes and station codes

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Operating mode of a station (system value `0x71`)
///
/// Codes not known to this library are kept as [`OperatingMode::Unknown`]
/// so that a station in an exotic mode can still be inspected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// SI Air+ special register set
    SiacSpecial,
    Control,
    Start,
    Finish,
    Readout,
    /// Clear without start number (not used anymore)
    ClearOld,
    /// Clear with start number (standard)
    Clear,
    Check,
    /// BS7-P printer station
    Printout,
    /// BS7-S sprinter with external trigger
    StartTrigger,
    /// BS7-S sprinter with external trigger
    FinishTrigger,
    BeaconControl,
    BeaconStart,
    BeaconFinish,
    BeaconReadout,
    Unknown(u8),
}

impl OperatingMode {
    /// Modes accepted by `set_operating_mode`
    pub const SETTABLE: [OperatingMode; 6] = [
        Self::Control,
        Self::Start,
        Self::Finish,
        Self::Readout,
        Self::Clear,
        Self::Check,
    ];

    /// Decode the raw mode byte
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::SiacSpecial,
            0x02 => Self::Control,
            0x03 => Self::Start,
            0x04 => Self::Finish,
            0x05 => Self::Readout,
            0x06 => Self::ClearOld,
            0x07 => Self::Clear,
            0x0A => Self::Check,
            0x0B => Self::Printout,
            0x0C => Self::StartTrigger,
            0x0D => Self::FinishTrigger,
            0x12 => Self::BeaconControl,
            0x13 => Self::BeaconStart,
            0x14 => Self::BeaconFinish,
            0x15 => Self::BeaconReadout,
            other => Self::Unknown(other),
        }
    }

    /// Raw mode byte
    pub fn code(self) -> u8 {
        match self {
            Self::SiacSpecial => 0x01,
            Self::Control => 0x02,
            Self::Start => 0x03,
            Self::Finish => 0x04,
            Self::Readout => 0x05,
            Self::ClearOld => 0x06,
            Self::Clear => 0x07,
            Self::Check => 0x0A,
            Self::Printout => 0x0B,
            Self::StartTrigger => 0x0C,
            Self::FinishTrigger => 0x0D,
            Self::BeaconControl => 0x12,
            Self::BeaconStart => 0x13,
            Self::BeaconFinish => 0x14,
            Self::BeaconReadout => 0x15,
            Self::Unknown(code) => code,
        }
    }

    /// Human readable name, matching the names used by SI Config+
    pub fn name(self) -> &'static str {
        match self {
            Self::SiacSpecial => "SIAC special",
            Self::Control => "Control",
            Self::Start => "Start",
            Self::Finish => "Finish",
            Self::Readout => "Readout",
            Self::ClearOld => "Clear old",
            Self::Clear => "Clear",
            Self::Check => "Check",
            Self::Printout => "Printout",
            Self::StartTrigger => "Start trig",
            Self::FinishTrigger => "Finish trig",
            Self::BeaconControl => "BC control",
            Self::BeaconStart => "BC start",
            Self::BeaconFinish => "BC finish",
            Self::BeaconReadout => "BC readout",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Whether a station can be switched into this mode
    pub fn is_settable(self) -> bool {
        Self::SETTABLE.contains(&self)
    }

    /// Whether the backup memory of a station in this mode can be read
    pub fn supports_backup_read(self) -> bool {
        matches!(
            self,
            Self::Control
                | Self::Start
                | Self::Finish
                | Self::ClearOld
                | Self::Clear
                | Self::Check
        )
    }
}

impl From<u8> for OperatingMode {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<OperatingMode> for u8 {
    fn from(mode: OperatingMode) -> u8 {
        mode.code()
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "0x{:02x}", code),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        (0x01..=0x15u8)
            .map(Self::from_code)
            .filter(|mode| !matches!(mode, Self::Unknown(_)))
            .find(|mode| mode.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Parse(format!("unknown operating mode '{}'", wanted)))
    }
}

/// A station code in the range 1-1023
///
/// Codes above 255 need the two extra bits stored in the feedback byte,
/// which SI5 cards cannot record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationCode(u16);

impl StationCode {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 1023;

    pub fn new(code: u16) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&code) {
            return Err(Error::Validation(format!(
                "invalid control code {}, supported range is {}-{}",
                code,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(code))
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// Low byte as written to system value `0x72`
    pub fn low_byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Feedback byte carrying the two high bits, remaining bits set
    pub fn high_byte(self) -> u8 {
        ((self.0 >> 2) as u8) | 0b0011_1111
    }
}

impl TryFrom<u16> for StationCode {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        Self::new(code)
    }
}

impl fmt::Display for StationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_code_roundtrip_for_known_modes() {
        for code in [0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x0A] {
            assert_eq!(OperatingMode::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_unknown_mode_keeps_code() {
        let mode = OperatingMode::from_code(0x42);
        assert_eq!(mode, OperatingMode::Unknown(0x42));
        assert_eq!(mode.to_string(), "0x42");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("control".parse::<OperatingMode>().unwrap(), OperatingMode::Control);
        assert_eq!("BC readout".parse::<OperatingMode>().unwrap(), OperatingMode::BeaconReadout);
        assert!("sleeping".parse::<OperatingMode>().is_err());
    }

    #[test]
    fn test_backup_modes() {
        assert!(OperatingMode::ClearOld.supports_backup_read());
        assert!(!OperatingMode::Readout.supports_backup_read());
        assert!(!OperatingMode::ClearOld.is_settable());
        assert!(OperatingMode::Readout.is_settable());
    }

    #[test]
    fn test_station_code_range() {
        assert!(StationCode::new(0).is_err());
        assert!(StationCode::new(1024).is_err());
        assert_eq!(StationCode::new(1023).unwrap().get(), 1023);
    }

    #[test]
    fn test_station_code_bytes() {
        let code = StationCode::new(0x2A5).unwrap();
        assert_eq!(code.low_byte(), 0xA5);
        // 0x2A5 >> 2 = 0xA9, with the low six bits forced on
        assert_eq!(code.high_byte(), 0xBF);
        assert_eq!(StationCode::new(31).unwrap().high_byte(), 0x3F);
    }
}
