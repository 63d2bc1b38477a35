//! Time field decoding
//!
//! Cards and stations store times as 2-byte seconds within a half day.
//! Newer formats add a "day byte":
//!
//! ```text
//! bit 0      PM
//! bits 1..3  weekday, 0 = Sunday .. 6 = Saturday
//! bits 4..5  week counter (unused)
//! bits 6..7  station code bits 8..9
//! ```
//!
//! The absolute date is reconstructed as the most recent matching time
//! before a reference.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Weekday};

use crate::{
    constants::TIME_RESET,
    error::{Error, Result},
};

const HALF_DAY: i64 = 12 * 3600;

/// Weekday encoded in a day byte, Monday = 0
pub fn day_byte_weekday(day: u8) -> u32 {
    let stored = u32::from((day & 0b0000_1110) >> 1);
    (stored + 6) % 7
}

pub fn day_byte_is_pm(day: u8) -> bool {
    day & 0b0000_0001 != 0
}

/// Build a day byte from a weekday and half day
pub fn encode_day_byte(weekday: Weekday, pm: bool) -> u8 {
    ((weekday.num_days_from_sunday() as u8) << 1) | u8::from(pm)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

/// Decode a 2-byte time field
///
/// Returns `None` for an unset field.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use sireader_core::decode_time;
///
/// let reference = NaiveDate::from_ymd_opt(2024, 5, 4)
///     .unwrap()
///     .and_hms_opt(1, 30, 0)
///     .unwrap();
/// let time = decode_time([0x0E, 0x10], None, reference).unwrap();
/// assert_eq!(time.to_string(), "2024-05-04 01:00:00");
/// ```
pub fn decode_time(raw: [u8; 2], day: Option<u8>, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    if raw == TIME_RESET {
        return None;
    }

    let mut punch = TimeDelta::seconds(i64::from(u16::from_be_bytes(raw)));

    let Some(day) = day else {
        return Some(nearest_half_day(punch, reference));
    };

    if day_byte_is_pm(day) {
        punch += TimeDelta::seconds(HALF_DAY);
    }

    let weekday = day_byte_weekday(day);
    let ref_weekday = reference.weekday().num_days_from_monday();
    let ref_time = TimeDelta::seconds(i64::from(reference.num_seconds_from_midnight()));

    let back = if ref_weekday == weekday && punch > ref_time {
        7
    } else {
        (ref_weekday + 7 - weekday) % 7
    };

    let date = reference.date() - TimeDelta::days(i64::from(back));
    Some(midnight(date) + punch)
}

/// Without a day byte the half day is guessed: the result is the latest
/// candidate not after the reference
fn nearest_half_day(punch: TimeDelta, reference: NaiveDateTime) -> NaiveDateTime {
    let ref_day = midnight(reference.date());
    let since_midnight = reference - ref_day;
    let noon = TimeDelta::seconds(HALF_DAY);

    if since_midnight < noon {
        if punch < since_midnight {
            ref_day + punch
        } else {
            ref_day - noon + punch
        }
    } else if punch < since_midnight - noon {
        ref_day + noon + punch
    } else {
        ref_day + punch
    }
}

/// Full station code from a code byte and the day byte that came with it
pub fn decode_station_code(code: u8, day: Option<u8>) -> u16 {
    match day {
        Some(day) => (u16::from(day & 0xC0) << 2) + u16::from(code),
        None => u16::from(code),
    }
}

/// Decode the reply to a clock read: `[yy, mm, dd, day byte, secs:2, frac]`
///
/// Returns `None` if the station reports an impossible time.
pub fn decode_clock(data: &[u8]) -> Result<Option<NaiveDateTime>> {
    const LEN: usize = 7;
    if data.len() < LEN {
        return Err(Error::RecordTooShort {
            expected: LEN,
            actual: data.len(),
        });
    }

    let pm = u32::from(day_byte_is_pm(data[3]));
    let seconds = u32::from(u16::from_be_bytes([data[4], data[5]]));
    let hour = pm * 12 + seconds / 3600;
    let minute = seconds % 3600 / 60;
    let second = seconds % 60;
    let micros = (u32::from(data[6]) * 1_000_000 + 128) / 256;

    Ok(NaiveDate::from_ymd_opt(2000 + i32::from(data[0]), u32::from(data[1]), u32::from(data[2]))
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micros)))
}

/// Encode a clock setting
pub fn encode_clock(time: NaiveDateTime) -> [u8; 7] {
    let pm = time.hour() >= 12;
    let seconds = (time.hour() % 12) * 3600 + time.minute() * 60 + time.second();
    let micros = (time.nanosecond() / 1000).min(999_999);
    let frac = ((micros * 256 + 500_000) / 1_000_000).min(255);
    let [hi, lo] = (seconds as u16).to_be_bytes();

    [
        (time.year() % 100) as u8,
        time.month() as u8,
        time.day() as u8,
        encode_day_byte(time.weekday(), pm),
        hi,
        lo,
        frac as u8,
    ]
}
