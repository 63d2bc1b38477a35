//! SportIdent protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// Extended protocol commands plus the legacy codes a station may still
/// answer with. Write commands for cards and radio (SRR) commands are
/// not supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Legacy protocol
    LegacyGetSi5 = 0x31,
    LegacySi5Detected = 0x46,
    LegacyTransmitRecord = 0x53,
    LegacyTransmitTime = 0x54,
    LegacyGetSi6 = 0x61,
    LegacySi6Detected = 0x66,
    LegacySetMs = 0x70,
    LegacyGetMs = 0x71,
    LegacySetSysVal = 0x72,
    LegacyGetSysVal = 0x73,
    LegacyGetBackup = 0x74,
    LegacyEraseBackup = 0x75,
    LegacySetTime = 0x76,
    LegacyGetTime = 0x77,
    LegacyOff = 0x78,
    LegacyReset = 0x79,
    LegacyGetBackup2 = 0x7A,
    LegacySetBaud = 0x7E,
    /// Reply to `LegacyGetBackup`
    LegacyBackupData = 0xC4,
    /// Reply to `LegacyGetBackup2`
    LegacyBackupData2 = 0xCA,

    // Extended protocol: backup & configuration
    GetBackup = 0x81,
    SetSysVal = 0x82,
    GetSysVal = 0x83,

    // Cards
    GetSi5 = 0xB1,
    TransmitRecord = 0xD3,
    ClearCard = 0xE0,
    GetSi6 = 0xE1,
    Si5Detected = 0xE5,
    Si6Detected = 0xE6,
    CardRemoved = 0xE7,
    Si9Detected = 0xE8,
    GetSi9 = 0xEF,

    // Station control
    SetMs = 0xF0,
    GetMs = 0xF1,
    EraseBackup = 0xF5,
    SetTime = 0xF6,
    GetTime = 0xF7,
    PowerOff = 0xF8,
    Beep = 0xF9,
    SetBaud = 0xFE,
}

impl Command {
    /// Check if this command belongs to the legacy protocol
    pub fn is_legacy(self) -> bool {
        (self as u8) < 0x80 || matches!(self, Self::LegacyBackupData | Self::LegacyBackupData2)
    }

    /// Check if this code announces a card being inserted
    pub fn is_card_detect(self) -> bool {
        matches!(self, Self::Si5Detected | Self::Si6Detected | Self::Si9Detected)
    }

    /// Check if the station sends this without being asked
    pub fn is_unsolicited(self) -> bool {
        self.is_card_detect()
            || matches!(
                self,
                Self::CardRemoved
                    | Self::TransmitRecord
                    | Self::LegacySi5Detected
                    | Self::LegacySi6Detected
                    | Self::LegacyTransmitRecord
                    | Self::LegacyTransmitTime
            )
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::LegacyGetSi5 => "BC_GET_SI5",
            Self::LegacySi5Detected => "BC_SI5_DET",
            Self::LegacyTransmitRecord => "BC_TRANS_REC",
            Self::LegacyTransmitTime => "BC_TRANS_TIME",
            Self::LegacyGetSi6 => "BC_GET_SI6",
            Self::LegacySi6Detected => "BC_SI6_DET",
            Self::LegacySetMs => "BC_SET_MS",
            Self::LegacyGetMs => "BC_GET_MS",
            Self::LegacySetSysVal => "BC_SET_SYS_VAL",
            Self::LegacyGetSysVal => "BC_GET_SYS_VAL",
            Self::LegacyGetBackup => "BC_GET_BACKUP",
            Self::LegacyEraseBackup => "BC_ERASE_BACKUP",
            Self::LegacySetTime => "BC_SET_TIME",
            Self::LegacyGetTime => "BC_GET_TIME",
            Self::LegacyOff => "BC_OFF",
            Self::LegacyReset => "BC_RESET",
            Self::LegacyGetBackup2 => "BC_GET_BACKUP2",
            Self::LegacySetBaud => "BC_SET_BAUD",
            Self::LegacyBackupData => "BC_BACKUP_DATA",
            Self::LegacyBackupData2 => "BC_BACKUP_DATA2",
            Self::GetBackup => "C_GET_BACKUP",
            Self::SetSysVal => "C_SET_SYS_VAL",
            Self::GetSysVal => "C_GET_SYS_VAL",
            Self::GetSi5 => "C_GET_SI5",
            Self::TransmitRecord => "C_TRANS_REC",
            Self::ClearCard => "C_CLEAR_CARD",
            Self::GetSi6 => "C_GET_SI6",
            Self::Si5Detected => "C_SI5_DET",
            Self::Si6Detected => "C_SI6_DET",
            Self::CardRemoved => "C_SI_REM",
            Self::Si9Detected => "C_SI9_DET",
            Self::GetSi9 => "C_GET_SI9",
            Self::SetMs => "C_SET_MS",
            Self::GetMs => "C_GET_MS",
            Self::EraseBackup => "C_ERASE_BACKUP",
            Self::SetTime => "C_SET_TIME",
            Self::GetTime => "C_GET_TIME",
            Self::PowerOff => "C_OFF",
            Self::Beep => "C_BEEP",
            Self::SetBaud => "C_SET_BAUD",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x31 => Ok(Self::LegacyGetSi5),
            0x46 => Ok(Self::LegacySi5Detected),
            0x53 => Ok(Self::LegacyTransmitRecord),
            0x54 => Ok(Self::LegacyTransmitTime),
            0x61 => Ok(Self::LegacyGetSi6),
            0x66 => Ok(Self::LegacySi6Detected),
            0x70 => Ok(Self::LegacySetMs),
            0x71 => Ok(Self::LegacyGetMs),
            0x72 => Ok(Self::LegacySetSysVal),
            0x73 => Ok(Self::LegacyGetSysVal),
            0x74 => Ok(Self::LegacyGetBackup),
            0x75 => Ok(Self::LegacyEraseBackup),
            0x76 => Ok(Self::LegacySetTime),
            0x77 => Ok(Self::LegacyGetTime),
            0x78 => Ok(Self::LegacyOff),
            0x79 => Ok(Self::LegacyReset),
            0x7A => Ok(Self::LegacyGetBackup2),
            0x7E => Ok(Self::LegacySetBaud),
            0xC4 => Ok(Self::LegacyBackupData),
            0xCA => Ok(Self::LegacyBackupData2),
            0x81 => Ok(Self::GetBackup),
            0x82 => Ok(Self::SetSysVal),
            0x83 => Ok(Self::GetSysVal),
            0xB1 => Ok(Self::GetSi5),
            0xD3 => Ok(Self::TransmitRecord),
            0xE0 => Ok(Self::ClearCard),
            0xE1 => Ok(Self::GetSi6),
            0xE5 => Ok(Self::Si5Detected),
            0xE6 => Ok(Self::Si6Detected),
            0xE7 => Ok(Self::CardRemoved),
            0xE8 => Ok(Self::Si9Detected),
            0xEF => Ok(Self::GetSi9),
            0xF0 => Ok(Self::SetMs),
            0xF1 => Ok(Self::GetMs),
            0xF5 => Ok(Self::EraseBackup),
            0xF6 => Ok(Self::SetTime),
            0xF7 => Ok(Self::GetTime),
            0xF8 => Ok(Self::PowerOff),
            0xF9 => Ok(Self::Beep),
            0xFE => Ok(Self::SetBaud),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
