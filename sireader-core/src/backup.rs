//! Backup memory records and autosend transmit records

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use sireader_types::BackupRecord;
use tracing::warn;

use crate::{
    card::decode_card_number,
    constants::{backup, transmit},
    error::{Error, Result},
    sysval::ProtocolConfig,
    time::{day_byte_is_pm, day_byte_weekday, decode_time},
};

const HALF_DAY: i64 = 12 * 3600;
const DAY: i64 = 24 * 3600;

/// Clock skew tolerated when dating legacy records
const SKEW_TOLERANCE: i64 = 3600;

/// Record layout of the backup memory
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordFormat {
    /// 8 bytes: card number, full date, seconds, sub-second
    Extended,
    /// 6 bytes: card number, day byte, seconds
    Legacy,
}

impl RecordFormat {
    pub fn from_protocol(config: &ProtocolConfig) -> Self {
        if config.extended() {
            Self::Extended
        } else {
            Self::Legacy
        }
    }

    pub fn record_len(self) -> usize {
        match self {
            Self::Extended => backup::EXTENDED_RECORD_LEN,
            Self::Legacy => backup::LEGACY_RECORD_LEN,
        }
    }
}

/// One backup read request: `[address:3][count:1]`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub address: u32,
    pub count: u8,
}

impl Chunk {
    pub fn parameters(&self) -> [u8; 4] {
        let [_, a, b, c] = self.address.to_be_bytes();
        [a, b, c, self.count]
    }
}

/// Split `[start, end)` into reads of at most [`backup::MAX_CHUNK`] bytes
pub fn chunks(start: u32, end: u32) -> impl Iterator<Item = Chunk> {
    let step = u32::from(backup::MAX_CHUNK);
    (start..end).step_by(step as usize).map(move |address| Chunk {
        address,
        count: (end - address).min(step) as u8,
    })
}

/// Strip the address echo from the data of a backup read reply
pub fn chunk_payload(data: &[u8]) -> Result<&[u8]> {
    data.get(backup::ADDRESS_ECHO..).ok_or(Error::RecordTooShort {
        expected: backup::ADDRESS_ECHO,
        actual: data.len(),
    })
}

fn check_len(record: &[u8], expected: usize) -> Result<()> {
    if record.len() < expected {
        return Err(Error::RecordTooShort {
            expected,
            actual: record.len(),
        });
    }
    Ok(())
}

fn error_code(seconds_high: u8) -> Option<String> {
    (seconds_high >= backup::ERROR_MARK).then(|| format!("Err{:X}", seconds_high & 0x0F))
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some())
        .unwrap_or(28)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

/// Decode an 8-byte extended record
///
/// Implausible dates are normalized and tagged `ErrDate`.
pub fn decode_extended(record: &[u8]) -> Result<BackupRecord> {
    check_len(record, backup::EXTENDED_RECORD_LEN)?;

    let card_number = decode_card_number([0, record[0], record[1], record[2]])?;
    let mut year = 2000 + i32::from(record[3] >> 2);
    let mut month = u32::from(((record[3] & 0x03) << 2) | (record[4] >> 6));
    let day = u32::from((record[4] & 0x3F) >> 1);
    let pm = record[4] & 0x01 != 0;

    let mut error = String::new();
    let seconds = match error_code(record[5]) {
        Some(code) => {
            error.push_str(&code);
            None
        }
        None => Some(i64::from(u16::from_be_bytes([record[5], record[6]]))),
    };

    if month == 0 {
        month = 12;
        year -= 1;
        error.push_str("ErrDate");
    } else if month > 12 {
        month -= 12;
        year += 1;
        error.push_str("ErrDate");
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| {
            error.push_str("ErrDate");
            let clamped = day.clamp(1, last_day_of_month(year, month));
            NaiveDate::from_ymd_opt(year, month, clamped)
        })
        .ok_or(Error::InvalidDate { year, month, day })?;

    if !error.is_empty() {
        warn!(card = card_number, error = %error, "Backup record flagged");
    }

    let time = seconds.map(|seconds| {
        let half = if pm { HALF_DAY } else { 0 };
        let micros = i64::from(record[7]) * 1_000_000 / 256;
        midnight(date) + TimeDelta::seconds(seconds + half) + TimeDelta::microseconds(micros)
    });

    Ok(BackupRecord {
        time,
        date,
        card_number,
        error,
    })
}

/// Decode a 6-byte legacy record
///
/// Legacy records only know the weekday. The punch is assumed to lie in
/// the week before `now`.
pub fn decode_legacy(record: &[u8], now: NaiveDateTime) -> Result<BackupRecord> {
    check_len(record, backup::LEGACY_RECORD_LEN)?;

    let card_number = decode_card_number([0, record[5], record[0], record[1]])?;
    let weekday = i64::from(day_byte_weekday(record[4]));
    let half = if day_byte_is_pm(record[4]) { HALF_DAY } else { 0 };

    let (error, seconds) = match error_code(record[2]) {
        Some(code) => (code, half),
        None => (
            String::new(),
            i64::from(u16::from_be_bytes([record[2], record[3]])) + half,
        ),
    };

    let now_weekday = i64::from(now.weekday().num_days_from_monday());
    let since_midnight = i64::from(now.num_seconds_from_midnight());
    let back = if weekday * DAY + seconds < now_weekday * DAY + since_midnight + SKEW_TOLERANCE {
        now_weekday - weekday
    } else {
        now_weekday - weekday + 7
    };

    let date = now.date() - TimeDelta::days(back);
    let time = error
        .is_empty()
        .then(|| midnight(date) + TimeDelta::seconds(seconds));

    Ok(BackupRecord {
        time,
        date,
        card_number,
        error,
    })
}

/// Decode a whole memory dump in physical order
pub fn decode_records(
    memory: &[u8],
    format: RecordFormat,
    now: NaiveDateTime,
) -> Result<Vec<BackupRecord>> {
    let len = format.record_len();
    let records = memory.chunks_exact(len);
    if !records.remainder().is_empty() {
        warn!(
            trailing = records.remainder().len(),
            "Ignoring incomplete backup record"
        );
    }

    records
        .map(|record| match format {
            RecordFormat::Extended => decode_extended(record),
            RecordFormat::Legacy => decode_legacy(record, now),
        })
        .collect()
}

/// Punch pushed by a station in autosend mode (`TransmitRecord`)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransmitRecord {
    pub card_number: u32,
    pub day: u8,
    pub time: [u8; 2],
    pub subsecond: u8,
    /// Backup memory address of this punch
    pub offset: u32,
}

impl TransmitRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, transmit::LEN)?;

        let card = &data[transmit::CARD_NUMBER..transmit::CARD_NUMBER + 4];
        let offset = &data[transmit::OFFSET..transmit::OFFSET + 3];

        Ok(Self {
            card_number: decode_card_number([card[0], card[1], card[2], card[3]])?,
            day: data[transmit::DAY],
            time: [data[transmit::TIME], data[transmit::TIME + 1]],
            subsecond: data[transmit::SUBSECOND],
            offset: u32::from_be_bytes([0, offset[0], offset[1], offset[2]]),
        })
    }

    /// Punch time dated from the day byte, within the week before
    /// `reference`
    pub fn punch_time(&self, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        decode_time(self.time, Some(self.day), reference)
    }
}
