//! System configuration block (SYS_VAL)
//!
//! A full read (`83 00 80`) returns the 128-byte block preceded by one
//! byte that the offsets in [`crate::constants::sysval`] do not count.

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use chrono::NaiveDate;
use sireader_types::{OperatingMode, StationInfo};

use crate::{
    constants::{si6_blocks, sysval as offset},
    error::{Error, Result},
};

bitflags! {
    /// Protocol byte (`0x74`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProtocolFlags: u8 {
        const EXTENDED = 0b0000_0001;
        const AUTOSEND = 0b0000_0010;
        const HANDSHAKE = 0b0000_0100;
        const PASSWORD_ACCESS = 0b0001_0000;
        /// Read card right after punching
        const PUNCH_READ = 0b1000_0000;
    }
}

bitflags! {
    /// Feedback bits of byte `0x73`
    ///
    /// The two top bits of that byte hold the high part of the station
    /// code and must be preserved when writing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeedbackFlags: u8 {
        const OPTICAL = 0b0000_0001;
        const AUDIBLE = 0b0000_0100;
    }
}

impl FeedbackFlags {
    /// Replace the feedback bits of a raw `0x73` byte
    pub fn apply(raw: u8, audible: bool, optical: bool) -> u8 {
        let mut flags = Self::empty();
        flags.set(Self::AUDIBLE, audible);
        flags.set(Self::OPTICAL, optical);
        (raw & !Self::all().bits()) | flags.bits()
    }
}

/// Cached protocol configuration of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub flags: ProtocolFlags,
    pub mode: OperatingMode,
}

impl ProtocolConfig {
    pub fn new(protocol_byte: u8, mode: OperatingMode) -> Self {
        Self {
            flags: ProtocolFlags::from_bits_truncate(protocol_byte),
            mode,
        }
    }

    pub fn extended(&self) -> bool {
        self.flags.contains(ProtocolFlags::EXTENDED)
    }

    pub fn autosend(&self) -> bool {
        self.flags.contains(ProtocolFlags::AUTOSEND)
    }

    pub fn handshake(&self) -> bool {
        self.flags.contains(ProtocolFlags::HANDSHAKE)
    }

    pub fn password_access(&self) -> bool {
        self.flags.contains(ProtocolFlags::PASSWORD_ACCESS)
    }

    pub fn punch_read(&self) -> bool {
        self.flags.contains(ProtocolFlags::PUNCH_READ)
    }

    pub fn with_extended(mut self, extended: bool) -> Self {
        self.flags.set(ProtocolFlags::EXTENDED, extended);
        self
    }

    /// Autosend and handshake are mutually exclusive
    pub fn with_autosend(mut self, autosend: bool) -> Self {
        self.flags.set(ProtocolFlags::AUTOSEND, autosend);
        self.flags.set(ProtocolFlags::HANDSHAKE, !autosend);
        self
    }

    /// Raw protocol byte as written back to the station
    pub fn to_byte(&self) -> u8 {
        self.flags.bits()
    }
}

/// SI6 block configuration (`0x33`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Si6Blocks {
    /// 64 punches
    Standard,
    /// 192 punches
    All,
    Other(u8),
}

impl Si6Blocks {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 | si6_blocks::STANDARD => Self::Standard,
            0x08 | si6_blocks::ALL => Self::All,
            other => Self::Other(other),
        }
    }

    /// `Some(true)` if 192-punch cards are supported, `None` on an
    /// unexpected value
    pub fn supports_192(self) -> Option<bool> {
        match self {
            Self::Standard => Some(false),
            Self::All => Some(true),
            Self::Other(_) => None,
        }
    }

    /// Value to write for a requested setting
    pub fn setting(enable: bool) -> u8 {
        if enable {
            si6_blocks::ALL
        } else {
            si6_blocks::STANDARD
        }
    }
}

/// Known station model ids
pub fn model_name(model_id: u16) -> Option<&'static str> {
    let name = match model_id {
        0x6F21 => "SIMSRR1-AP",
        0x8003 => "BSF3",
        0x8004 => "BSF4",
        0x8084 => "BSM4-RS232",
        0x8086 => "BSM6-RS232/USB",
        0x8115 => "BSF5",
        0x8117 | 0x8197 => "BSF7",
        0x8118 | 0x8198 => "BSF8",
        0x8146 => "BSF6",
        0x8187 => "BS7-SI-Master",
        0x8188 => "BS8-SI-Master",
        0x9197 => "BSM7-RS232/USB",
        0x9198 => "BSM8-USB/SRR",
        0x9199 => "unknown",
        0x9597 => "BS7-S",
        0x9D9A => "BS11-BL",
        0xB197 => "BS7-P",
        0xB198 => "BS8-P",
        0xB897 => "BS7-GSM",
        0xCD9B => "BS11-BS",
        _ => return None,
    };
    Some(name)
}

/// Snapshot of a station's system configuration
#[derive(Clone, PartialEq, Eq)]
pub struct SystemConfig {
    data: Bytes,
}

impl SystemConfig {
    /// Bytes of a full read including the leading byte
    pub const REPLY_LEN: usize = offset::LEN as usize + 1;

    /// Wrap the data of a full `GetSysVal` reply
    pub fn from_reply(data: Bytes) -> Result<Self> {
        if data.len() < Self::REPLY_LEN {
            return Err(Error::SysvalTooShort {
                expected: Self::REPLY_LEN,
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    fn field(&self, at: u8, len: usize) -> &[u8] {
        let start = usize::from(at) + 1;
        &self.data[start..start + len]
    }

    fn byte(&self, at: u8) -> u8 {
        self.field(at, 1)[0]
    }

    fn date(&self, at: u8) -> Option<NaiveDate> {
        let raw = self.field(at, 3);
        NaiveDate::from_ymd_opt(2000 + i32::from(raw[0]), u32::from(raw[1]), u32::from(raw[2]))
    }

    /// The 128 configuration bytes, without the leading byte
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[1..Self::REPLY_LEN]
    }

    pub fn serial_number(&self) -> u32 {
        BigEndian::read_u32(self.field(offset::SERIAL_NO, 4))
    }

    pub fn firmware_version(&self) -> String {
        String::from_utf8_lossy(self.field(offset::FIRMWARE, 3)).into_owned()
    }

    pub fn model_id(&self) -> u16 {
        BigEndian::read_u16(self.field(offset::MODEL_ID, 2))
    }

    /// Model name, or the hex model id when unknown
    pub fn model(&self) -> String {
        let id = self.model_id();
        model_name(id)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("0x{:04x}", id))
    }

    pub fn build_date(&self) -> Option<NaiveDate> {
        self.date(offset::BUILD_DATE)
    }

    pub fn battery_date(&self) -> Option<NaiveDate> {
        self.date(offset::BAT_DATE)
    }

    /// Backup memory size in KB
    pub fn memory_size(&self) -> u8 {
        self.byte(offset::MEM_SIZE)
    }

    /// Volts
    pub fn battery_voltage(&self) -> f64 {
        f64::from(BigEndian::read_u16(self.field(offset::BAT_VOLT, 2))) * 5.0 / 65536.0
    }

    /// mAh
    pub fn battery_capacity(&self) -> f64 {
        f64::from(BigEndian::read_u16(self.field(offset::BAT_CAP, 2))) * 16.0 / 225.0
    }

    /// Percent
    pub fn used_battery(&self) -> f64 {
        f64::from(BigEndian::read_u24(self.field(offset::USED_BAT_CAP, 3))) * 2.778e-5
    }

    pub fn mode(&self) -> OperatingMode {
        OperatingMode::from_code(self.byte(offset::MODE))
    }

    /// Low byte plus the two high bits stored in the feedback byte
    pub fn station_code(&self) -> u16 {
        let low = u16::from(self.byte(offset::STATION_CODE));
        let high = u16::from(self.feedback_byte() & 0xC0) << 2;
        low + high
    }

    pub fn feedback_byte(&self) -> u8 {
        self.byte(offset::FEEDBACK)
    }

    pub fn feedback(&self) -> FeedbackFlags {
        FeedbackFlags::from_bits_truncate(self.feedback_byte())
    }

    pub fn si6_blocks(&self) -> Si6Blocks {
        Si6Blocks::from_byte(self.byte(offset::SI6_CB))
    }

    pub fn protocol_byte(&self) -> u8 {
        self.byte(offset::PROTO)
    }

    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig::new(self.protocol_byte(), self.mode())
    }

    /// Minutes
    pub fn active_time(&self) -> u16 {
        BigEndian::read_u16(self.field(offset::ACTIVE_TIME, 2))
    }

    /// Address one past the last backup record
    pub fn backup_end_pointer(&self) -> u32 {
        let hi = self.field(offset::BACKUP_PTR_HI, 2);
        let lo = self.field(offset::BACKUP_PTR_LO, 2);
        BigEndian::read_u32(&[hi[0], hi[1], lo[0], lo[1]])
    }

    pub fn memory_overflow(&self) -> bool {
        self.byte(offset::MEM_OVERFLOW) != 0
    }

    pub fn station_info(&self) -> StationInfo {
        StationInfo {
            serial_number: self.serial_number(),
            firmware_version: self.firmware_version(),
            model: self.model(),
            station_code: self.station_code(),
            mode: self.mode(),
            build_date: self.build_date(),
            battery_date: self.battery_date(),
            battery_voltage: self.battery_voltage(),
            battery_used: self.used_battery(),
            memory_size: self.memory_size(),
            active_time: self.active_time(),
        }
    }
}

impl std::fmt::Debug for SystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemConfig")
            .field("serial_number", &self.serial_number())
            .field("station_code", &self.station_code())
            .field("mode", &self.mode())
            .field("protocol", &format_args!("0x{:02X}", self.protocol_byte()))
            .finish()
    }
}
