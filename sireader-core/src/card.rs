//! SI-card models and their memory layouts

use std::fmt;

use crate::{
    command::Command,
    constants::SI6_ALL_BLOCKS,
    error::{Error, Result},
    frame::Frame,
};

/// Supported card families
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CardModel {
    Si5,
    Si6,
    Si8,
    Si9,
    PCard,
    /// SI10 and SI11 share one layout
    Si10,
}

/// Offsets of one recorded time (start, finish, check, clear)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeField {
    /// 2 bytes of seconds
    pub time: usize,
    pub day: Option<usize>,
    /// Station code byte
    pub code: Option<usize>,
}

/// Byte offsets of a card payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLayout {
    /// Card number bytes, most significant first
    pub card_number: [usize; 3],
    pub start: TimeField,
    pub finish: TimeField,
    pub check: TimeField,
    pub clear: Option<TimeField>,
    /// Punch counter byte
    pub punch_count: usize,
    pub first_punch: usize,
    /// Bytes per punch slot
    pub punch_len: usize,
    pub max_punches: usize,
    /// Offsets within a punch slot
    pub punch_day: Option<usize>,
    pub punch_code: usize,
    pub punch_time: usize,
    /// Blocks read with `GetSi9`
    pub blocks: Option<u8>,
}

const fn field(day: usize, code: usize, time: usize) -> TimeField {
    TimeField {
        time,
        day: Some(day),
        code: Some(code),
    }
}

const fn si9_family(first_punch: usize, max_punches: usize, blocks: u8) -> CardLayout {
    CardLayout {
        card_number: [25, 26, 27],
        start: field(12, 13, 14),
        finish: field(16, 17, 18),
        check: field(8, 9, 10),
        clear: None,
        punch_count: 22,
        first_punch,
        punch_len: 4,
        max_punches,
        punch_day: Some(0),
        punch_code: 1,
        punch_time: 2,
        blocks: Some(blocks),
    }
}

static SI5: CardLayout = CardLayout {
    card_number: [6, 4, 5],
    start: TimeField {
        time: 19,
        day: None,
        code: None,
    },
    finish: TimeField {
        time: 21,
        day: None,
        code: None,
    },
    check: TimeField {
        time: 25,
        day: None,
        code: None,
    },
    clear: None,
    punch_count: 23,
    first_punch: 32,
    punch_len: 3,
    // Punches 31-36 carry no time
    max_punches: 30,
    punch_day: None,
    punch_code: 0,
    punch_time: 1,
    blocks: None,
};

static SI6: CardLayout = CardLayout {
    card_number: [11, 12, 13],
    start: field(24, 25, 26),
    finish: field(20, 21, 22),
    check: field(28, 29, 30),
    clear: Some(field(32, 33, 34)),
    punch_count: 18,
    first_punch: 128,
    punch_len: 4,
    max_punches: 64,
    punch_day: Some(0),
    punch_code: 1,
    punch_time: 2,
    blocks: None,
};

static SI8: CardLayout = si9_family(136, 30, 2);
static SI9: CardLayout = si9_family(56, 50, 2);
static PCARD: CardLayout = si9_family(176, 20, 2);
// Blocks 1-3 are skipped on readout, hence 128 and not 512
static SI10: CardLayout = si9_family(128, 64, 8);

/// One read command and the number of reply frames it produces
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub command: Command,
    pub block: Option<u8>,
    pub frames: usize,
}

/// Commands needed to read a whole card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub requests: Vec<ReadRequest>,
    /// Every reply frame starts with its block number
    pub strip_block_number: bool,
}

impl ReadPlan {
    pub fn frame_count(&self) -> usize {
        self.requests.iter().map(|r| r.frames).sum()
    }
}

impl CardModel {
    pub fn layout(self) -> &'static CardLayout {
        match self {
            Self::Si5 => &SI5,
            Self::Si6 => &SI6,
            Self::Si8 => &SI8,
            Self::Si9 => &SI9,
            Self::PCard => &PCARD,
            Self::Si10 => &SI10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Si5 => "SI5",
            Self::Si6 => "SI6",
            Self::Si8 => "SI8",
            Self::Si9 => "SI9",
            Self::PCard => "pCard",
            Self::Si10 => "SI10",
        }
    }

    /// Classify a card announced by `Si9Detected`
    pub fn from_card_number(number: u32) -> Result<Self> {
        match number {
            1_000_000..=1_999_999 => Ok(Self::Si9),
            2_000_000..=2_999_999 => Ok(Self::Si8),
            4_000_000..=4_999_999 => Ok(Self::PCard),
            7_000_000..=9_999_999 => Ok(Self::Si10),
            _ => Err(Error::UnknownCardType(number)),
        }
    }

    pub fn read_plan(self) -> ReadPlan {
        let single = |command, block, frames| ReadRequest {
            command,
            block,
            frames,
        };

        match self {
            Self::Si5 => ReadPlan {
                requests: vec![single(Command::GetSi5, None, 1)],
                strip_block_number: false,
            },
            Self::Si6 => ReadPlan {
                requests: vec![single(Command::GetSi6, Some(SI6_ALL_BLOCKS), 3)],
                strip_block_number: true,
            },
            Self::Si8 | Self::Si9 | Self::PCard => ReadPlan {
                requests: (0..self.layout().blocks.unwrap_or(0))
                    .map(|block| single(Command::GetSi9, Some(block), 1))
                    .collect(),
                strip_block_number: true,
            },
            // Block by block is slow and unreliable on SI10
            Self::Si10 => ReadPlan {
                requests: vec![single(Command::GetSi9, Some(SI6_ALL_BLOCKS), 5)],
                strip_block_number: true,
            },
        }
    }
}

impl fmt::Display for CardModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode a 4-byte card number, most significant byte first
///
/// SI5 cards store a series byte and a 16-bit number; the printed number
/// is `series * 100000 + number` for series 2 and up. Newer cards store
/// the number as is.
///
/// # Examples
///
/// ```
/// use sireader_core::decode_card_number;
///
/// assert_eq!(decode_card_number([0x00, 0x03, 0x04, 0xD2]).unwrap(), 301234);
/// assert_eq!(decode_card_number([0x00, 0x07, 0xA1, 0x20]).unwrap(), 500000);
/// ```
pub fn decode_card_number(raw: [u8; 4]) -> Result<u32> {
    if raw[0] != 0 {
        return Err(Error::UnknownCardSeries(raw[0]));
    }

    let number = u32::from_be_bytes(raw);
    if number >= 500_000 {
        return Ok(number);
    }

    let series = u32::from(raw[1]);
    let low = u32::from(u16::from_be_bytes([raw[2], raw[3]]));
    if series < 2 {
        Ok(low)
    } else {
        Ok(series * 100_000 + low)
    }
}

fn be_uint(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u32::from(b))
}

/// Card insert or removal announced by a readout station
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardEvent {
    Inserted { model: CardModel, number: u32 },
    Removed,
}

impl CardEvent {
    /// Interpret a frame; `None` if it is not a card event
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>> {
        let data = &frame.data[..];
        let need = |len: usize| {
            if data.len() < len {
                Err(Error::RecordTooShort {
                    expected: len,
                    actual: data.len(),
                })
            } else {
                Ok(())
            }
        };

        let event = match frame.command {
            Command::CardRemoved => Self::Removed,
            Command::Si5Detected => {
                need(4)?;
                let raw = [data[0], data[1], data[2], data[3]];
                Self::Inserted {
                    model: CardModel::Si5,
                    number: decode_card_number(raw)?,
                }
            }
            Command::Si6Detected => {
                need(4)?;
                Self::Inserted {
                    model: CardModel::Si6,
                    number: be_uint(&data[..4]),
                }
            }
            Command::Si9Detected => {
                need(4)?;
                // First byte is the card series, not part of the number
                let number = be_uint(&data[1..4]);
                Self::Inserted {
                    model: CardModel::from_card_number(number)?,
                    number,
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_card_number_si5_low_series() {
        assert_eq!(decode_card_number([0, 1, 0, 5]).unwrap(), 5);
        assert_eq!(decode_card_number([0, 0, 0xFD, 0xE8]).unwrap(), 65000);
    }

    #[test]
    fn test_card_number_si5_series() {
        assert_eq!(decode_card_number([0, 3, 0x04, 0xD2]).unwrap(), 301234);
    }

    #[test]
    fn test_card_number_newer_cards() {
        // 500000 = 0x07A120
        assert_eq!(decode_card_number([0, 0x07, 0xA1, 0x20]).unwrap(), 500000);
        assert_eq!(decode_card_number([0, 0x0F, 0x42, 0x40]).unwrap(), 1_000_000);
    }

    #[test]
    fn test_card_number_unknown_series() {
        assert!(matches!(
            decode_card_number([0x0F, 0, 0, 1]),
            Err(Error::UnknownCardSeries(0x0F))
        ));
    }

    #[test]
    fn test_family_classification() {
        assert_eq!(CardModel::from_card_number(1_000_000).unwrap(), CardModel::Si9);
        assert_eq!(CardModel::from_card_number(1_999_999).unwrap(), CardModel::Si9);
        assert_eq!(CardModel::from_card_number(2_000_000).unwrap(), CardModel::Si8);
        assert_eq!(CardModel::from_card_number(4_500_000).unwrap(), CardModel::PCard);
        assert_eq!(CardModel::from_card_number(9_999_999).unwrap(), CardModel::Si10);

        for number in [999_999, 3_000_000, 6_000_000, 10_000_000] {
            assert!(matches!(
                CardModel::from_card_number(number),
                Err(Error::UnknownCardType(n)) if n == number
            ));
        }
    }

    #[test]
    fn test_read_plans() {
        let si5 = CardModel::Si5.read_plan();
        assert_eq!(si5.frame_count(), 1);
        assert!(!si5.strip_block_number);

        let si6 = CardModel::Si6.read_plan();
        assert_eq!(si6.requests[0].block, Some(0x08));
        assert_eq!(si6.frame_count(), 3);

        let si9 = CardModel::Si9.read_plan();
        let blocks: Vec<_> = si9.requests.iter().map(|r| r.block).collect();
        assert_eq!(blocks, vec![Some(0), Some(1)]);

        let si10 = CardModel::Si10.read_plan();
        assert_eq!(si10.requests.len(), 1);
        assert_eq!(si10.frame_count(), 5);
    }

    #[test]
    fn test_layouts_fit_read_plans() {
        for model in [
            CardModel::Si6,
            CardModel::Si8,
            CardModel::Si9,
            CardModel::PCard,
            CardModel::Si10,
        ] {
            let layout = model.layout();
            let end = layout.first_punch + layout.max_punches * layout.punch_len;
            let available = model.read_plan().frame_count() * 128;
            assert!(end <= available, "{} punches overrun the read data", model);
        }
    }

    #[test]
    fn test_si8_punch_limit() {
        // Two blocks end right after the 30th punch
        let layout = CardModel::Si8.layout();
        assert_eq!(layout.max_punches, 30);
        assert_eq!(layout.first_punch + 30 * layout.punch_len, 256);
        assert_eq!(CardModel::Si9.layout().max_punches, 50);
    }

    #[test]
    fn test_card_events() {
        let si5 = Frame::new(Command::Si5Detected, 1, vec![0, 3, 0x04, 0xD2]);
        assert_eq!(
            CardEvent::from_frame(&si5).unwrap(),
            Some(CardEvent::Inserted {
                model: CardModel::Si5,
                number: 301234
            })
        );

        let si6 = Frame::new(Command::Si6Detected, 1, vec![0, 0x0B, 0x71, 0xB0]);
        assert_eq!(
            CardEvent::from_frame(&si6).unwrap(),
            Some(CardEvent::Inserted {
                model: CardModel::Si6,
                number: 750_000
            })
        );

        // 0x1E8480 = 2000000
        let si8 = Frame::new(Command::Si9Detected, 1, vec![0x02, 0x1E, 0x84, 0x80]);
        assert_eq!(
            CardEvent::from_frame(&si8).unwrap(),
            Some(CardEvent::Inserted {
                model: CardModel::Si8,
                number: 2_000_000
            })
        );

        let removed = Frame::new(Command::CardRemoved, 1, vec![0, 0, 0, 5]);
        assert_eq!(CardEvent::from_frame(&removed).unwrap(), Some(CardEvent::Removed));

        let other = Frame::new(Command::Beep, 1, vec![1]);
        assert_eq!(CardEvent::from_frame(&other).unwrap(), None);
    }

    #[test]
    fn test_card_event_unknown_type() {
        // 6000000, tCard
        let frame = Frame::new(Command::Si9Detected, 1, vec![0x06, 0x5B, 0x8D, 0x80]);
        assert!(matches!(
            CardEvent::from_frame(&frame),
            Err(Error::UnknownCardType(6_000_000))
        ));
    }
}
