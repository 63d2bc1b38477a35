//! Protocol constants

use std::time::Duration;

/// Start of transmission
pub const STX: u8 = 0x02;

/// End of transmission
pub const ETX: u8 = 0x03;

/// Positive acknowledge; makes a readout station beep until the card is removed
pub const ACK: u8 = 0x06;

/// Negative acknowledge (invalid command or parameter)
pub const NAK: u8 = 0x15;

/// Sent before a frame to wake the station up
pub const WAKEUP: u8 = 0xFF;

/// Preferred baud rate
pub const HIGH_BAUD_RATE: u32 = 38400;

/// Fallback baud rate
pub const LOW_BAUD_RATE: u32 = 4800;

/// Default per-read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Added to the wall clock when decoding card times without a reference,
/// for hosts whose clock runs behind the station
pub const REFERENCE_MARGIN_HOURS: i64 = 2;

/// Time field value meaning "not recorded"
pub const TIME_RESET: [u8; 2] = [0xEE, 0xEE];

/// Parameters of the master/slave command
pub mod addressing {
    /// "M"aster: talk to the station attached to the serial port
    pub const DIRECT: u8 = 0x4D;

    /// "S"lave: talk to the station coupled to the attached one
    pub const REMOTE: u8 = 0x53;
}

/// Parameters of the set baud rate command
pub mod baud {
    pub const B4800: u8 = 0x00;
    pub const B38400: u8 = 0x01;
}

/// SI6 card block selector; also used to read SI10/11 cards in one go
pub const SI6_ALL_BLOCKS: u8 = 0x08;

/// Offsets in the system configuration block (SYS_VAL)
///
/// The reply to a full read starts with one extra byte that is not
/// counted by these offsets.
pub mod sysval {
    /// Length of a full read
    pub const LEN: u8 = 0x80;

    /// 4 bytes, only meaningful after BSx7
    pub const SERIAL_NO: u8 = 0x00;
    /// 3 bytes ASCII, e.g. "656"
    pub const FIRMWARE: u8 = 0x05;
    /// 3 bytes YYMMDD
    pub const BUILD_DATE: u8 = 0x08;
    /// 2 bytes
    pub const MODEL_ID: u8 = 0x0B;
    /// 1 byte, KB
    pub const MEM_SIZE: u8 = 0x0D;
    /// 3 bytes YYMMDD
    pub const BAT_DATE: u8 = 0x15;
    /// 2 bytes, multiples of 16/225 mAh
    pub const BAT_CAP: u8 = 0x19;
    /// 2 bytes, high half of the backup memory pointer
    pub const BACKUP_PTR_HI: u8 = 0x1C;
    /// 2 bytes, low half of the backup memory pointer
    pub const BACKUP_PTR_LO: u8 = 0x21;
    /// 1 byte, which SI6 blocks to read
    pub const SI6_CB: u8 = 0x33;
    /// 3 bytes, multiply by 2.778e-5 for percent
    pub const USED_BAT_CAP: u8 = 0x35;
    /// 1 byte, non-zero on overflow
    pub const MEM_OVERFLOW: u8 = 0x3D;
    /// 2 bytes, multiply by 5/65536 for volts
    pub const BAT_VOLT: u8 = 0x50;
    pub const MODE: u8 = 0x71;
    /// 1 byte, low bits of the station code
    pub const STATION_CODE: u8 = 0x72;
    /// 1 byte, feedback flags and high bits of the station code
    pub const FEEDBACK: u8 = 0x73;
    /// 1 byte, protocol flags
    pub const PROTO: u8 = 0x74;
    /// 2 bytes, minutes
    pub const ACTIVE_TIME: u8 = 0x7E;
}

/// SI6 block configuration values
pub mod si6_blocks {
    pub const STANDARD: u8 = 0xC1;
    pub const ALL: u8 = 0xFF;
}

/// Maximum active time in minutes (< 96 h)
pub const MAX_ACTIVE_TIME: u16 = 5759;

/// Backup memory layout
pub mod backup {
    /// Address of the first record
    pub const START: u32 = 0x100;

    /// Largest chunk a single read may request
    pub const MAX_CHUNK: u8 = 0x80;

    /// Bytes of address echo preceding the payload of a read reply
    pub const ADDRESS_ECHO: usize = 3;

    /// Record length, extended protocol
    pub const EXTENDED_RECORD_LEN: usize = 8;

    /// Record length, legacy protocol
    pub const LEGACY_RECORD_LEN: usize = 6;

    /// Seconds high bytes at or above this value carry an error code
    pub const ERROR_MARK: u8 = 0xF0;
}

/// Layout of the autosend transmit record (`D3`), after the station code
pub mod transmit {
    /// 4 bytes card number
    pub const CARD_NUMBER: usize = 0;
    /// 1 byte day
    pub const DAY: usize = 4;
    /// 2 bytes seconds
    pub const TIME: usize = 5;
    /// 1 byte sub-second
    pub const SUBSECOND: usize = 7;
    /// 3 bytes backup memory address of this punch
    pub const OFFSET: usize = 8;
    /// Minimum data length
    pub const LEN: usize = 11;
}
