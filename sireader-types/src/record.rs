//! Decoded card, backup and punch records

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// One punch stored on an SI card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Punch {
    /// Code of the station that was punched (1-1023)
    pub code: u16,
    pub time: NaiveDateTime,
}

impl Punch {
    pub fn new(code: u16, time: NaiveDateTime) -> Self {
        Self { code, time }
    }
}

/// Contents of an SI card
///
/// Punches are kept in the order they are stored on the card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardRecord {
    pub card_number: u32,
    pub start: Option<NaiveDateTime>,
    pub start_code: Option<u16>,
    pub finish: Option<NaiveDateTime>,
    pub finish_code: Option<u16>,
    pub check: Option<NaiveDateTime>,
    pub check_code: Option<u16>,
    /// Not stored by SI5, SI8, SI9, pCard and SI10/11 cards
    pub clear: Option<NaiveDateTime>,
    pub clear_code: Option<u16>,
    pub punches: Vec<Punch>,
}

impl CardRecord {
    pub fn new(card_number: u32) -> Self {
        Self {
            card_number,
            ..Self::default()
        }
    }
}

impl fmt::Display for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Card[{}](punches={}",
            self.card_number,
            self.punches.len()
        )?;
        if let Some(start) = self.start {
            write!(f, ", start={}", start)?;
        }
        if let Some(finish) = self.finish {
            write!(f, ", finish={}", finish)?;
        }
        write!(f, ")")
    }
}

/// One entry of a station's backup memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Punch time, `None` if the station stored an error code instead
    pub time: Option<NaiveDateTime>,
    /// Calendar day the record belongs to, also known for error records
    pub date: NaiveDate,
    pub card_number: u32,
    /// Empty if the record is fine, otherwise e.g. `"Err3"` or `"ErrDate"`
    pub error: String,
}

impl BackupRecord {
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// A punch pushed by a station in autosend mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunchEvent {
    pub card_number: u32,
    /// `None` if the station did not record a time
    pub time: Option<NaiveDateTime>,
}

impl PunchEvent {
    pub fn new(card_number: u32, time: Option<NaiveDateTime>) -> Self {
        Self { card_number, time }
    }
}
