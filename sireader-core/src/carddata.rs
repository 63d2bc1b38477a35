//! Card payload decoding

use chrono::NaiveDateTime;
use sireader_types::{CardRecord, Punch};
use tracing::trace;

use crate::{
    card::{CardModel, TimeField, decode_card_number},
    error::{Error, Result},
    time::{decode_station_code, decode_time},
};

/// Bounds-checked view of a card payload
struct Payload<'a> {
    data: &'a [u8],
    model: CardModel,
}

impl Payload<'_> {
    fn byte(&self, at: usize) -> Result<u8> {
        self.data.get(at).copied().ok_or(Error::CardDataTooShort {
            model: self.model.name(),
            offset: at,
            actual: self.data.len(),
        })
    }

    fn pair(&self, at: usize) -> Result<[u8; 2]> {
        Ok([self.byte(at)?, self.byte(at + 1)?])
    }

    fn field(
        &self,
        field: &TimeField,
        reference: NaiveDateTime,
    ) -> Result<(Option<NaiveDateTime>, Option<u16>)> {
        let day = field.day.map(|at| self.byte(at)).transpose()?;
        let code = field.code.map(|at| self.byte(at)).transpose()?;
        let time = decode_time(self.pair(field.time)?, day, reference);
        Ok((time, code.map(|code| decode_station_code(code, day))))
    }
}

/// Decode a complete card payload
///
/// `data` is the concatenated read data with block numbers removed.
/// Times are resolved as the latest match before `reference`.
pub fn decode_card_data(
    data: &[u8],
    model: CardModel,
    reference: NaiveDateTime,
) -> Result<CardRecord> {
    let layout = model.layout();
    let payload = Payload { data, model };

    let [a, b, c] = layout.card_number;
    let number = decode_card_number([0, payload.byte(a)?, payload.byte(b)?, payload.byte(c)?])?;
    let mut card = CardRecord::new(number);

    (card.start, card.start_code) = payload.field(&layout.start, reference)?;
    (card.finish, card.finish_code) = payload.field(&layout.finish, reference)?;
    (card.check, card.check_code) = payload.field(&layout.check, reference)?;
    if let Some(clear) = &layout.clear {
        (card.clear, card.clear_code) = payload.field(clear, reference)?;
    }

    let mut count = usize::from(payload.byte(layout.punch_count)?);
    if model == CardModel::Si5 {
        // SI5 stores the index of the next free slot
        count = count.saturating_sub(1);
    }
    let count = count.min(layout.max_punches);

    let mut slot = layout.first_punch;
    for _ in 0..count {
        // First byte of each SI5 block belongs to punches 31-36
        if model == CardModel::Si5 && slot % 16 == 0 {
            slot += 1;
        }

        let day = layout.punch_day.map(|at| payload.byte(slot + at)).transpose()?;
        let code = decode_station_code(payload.byte(slot + layout.punch_code)?, day);
        if let Some(time) = decode_time(payload.pair(slot + layout.punch_time)?, day, reference) {
            card.punches.push(Punch::new(code, time));
        }

        slot += layout.punch_len;
    }

    trace!(
        model = model.name(),
        card = card.card_number,
        punches = card.punches.len(),
        "Decoded card data"
    );

    Ok(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::TIME_RESET, time::encode_day_byte};
    use chrono::{NaiveDate, Weekday};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reference() -> NaiveDateTime {
        at(4, 12, 0, 0)
    }

    fn put(data: &mut [u8], at: usize, bytes: &[u8]) {
        data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn secs(h: u16, m: u16) -> [u8; 2] {
        (h * 3600 + m * 60).to_be_bytes()
    }

    fn si5_card() -> Vec<u8> {
        let mut data = vec![0u8; 128];
        put(&mut data, 4, &[0x04, 0xD2]);
        put(&mut data, 6, &[3]);
        put(&mut data, 19, &secs(10, 0));
        put(&mut data, 21, &secs(11, 0));
        put(&mut data, 25, &TIME_RESET);
        data
    }

    #[test]
    fn test_si5_card() {
        let mut data = si5_card();
        // Next free slot is 3: two punches
        data[23] = 3;
        put(&mut data, 33, &[31, 0x8C, 0xA0]);
        put(&mut data, 36, &[32, 0x92, 0x7C]);

        let card = decode_card_data(&data, CardModel::Si5, reference()).unwrap();

        assert_eq!(card.card_number, 301234);
        assert_eq!(card.start, Some(at(4, 10, 0, 0)));
        assert_eq!(card.start_code, None);
        assert_eq!(card.finish, Some(at(4, 11, 0, 0)));
        assert_eq!(card.check, None);
        assert_eq!(card.clear, None);
        assert_eq!(
            card.punches,
            vec![Punch::new(31, at(4, 10, 0, 0)), Punch::new(32, at(4, 10, 25, 0))]
        );
    }

    #[test]
    fn test_si5_skips_block_byte() {
        let mut data = si5_card();
        data[23] = 7;
        for (i, slot) in [33, 36, 39, 42, 45, 49].into_iter().enumerate() {
            put(&mut data, slot, &[40 + i as u8, 0x8C, 0xA0]);
        }
        // Would be read as the sixth punch without the skip
        data[48] = 99;

        let card = decode_card_data(&data, CardModel::Si5, reference()).unwrap();
        let codes: Vec<u16> = card.punches.iter().map(|p| p.code).collect();
        assert_eq!(codes, vec![40, 41, 42, 43, 44, 45]);
    }

    #[test]
    fn test_si6_card() {
        let mut data = vec![0u8; 384];
        put(&mut data, 11, &[0x0B, 0x71, 0xB0]);
        data[18] = 2;

        let thursday_am = encode_day_byte(Weekday::Thu, false);
        let saturday_am = encode_day_byte(Weekday::Sat, false);
        put(&mut data, 24, &[thursday_am, 1]);
        put(&mut data, 26, &secs(9, 0));
        put(&mut data, 20, &[saturday_am, 2]);
        put(&mut data, 22, &secs(10, 30));
        put(&mut data, 30, &TIME_RESET);
        put(&mut data, 34, &TIME_RESET);

        // Second punch is on a station with code 0x100 + 5
        put(&mut data, 128, &[thursday_am, 70]);
        put(&mut data, 130, &secs(9, 15));
        put(&mut data, 132, &[thursday_am | 0x40, 5]);
        put(&mut data, 134, &secs(9, 45));

        let card = decode_card_data(&data, CardModel::Si6, reference()).unwrap();

        assert_eq!(card.card_number, 750_000);
        assert_eq!(card.start, Some(at(2, 9, 0, 0)));
        assert_eq!(card.start_code, Some(1));
        assert_eq!(card.finish, Some(at(4, 10, 30, 0)));
        assert_eq!(card.finish_code, Some(2));
        assert_eq!(card.check, None);
        assert_eq!(card.clear, None);
        assert_eq!(
            card.punches,
            vec![Punch::new(70, at(2, 9, 15, 0)), Punch::new(261, at(2, 9, 45, 0))]
        );
    }

    #[test]
    fn test_unset_punches_are_skipped() {
        let mut data = vec![0u8; 256];
        put(&mut data, 25, &[0x0F, 0x42, 0x40]);
        data[22] = 3;
        put(&mut data, 56, &[0, 31, 0x00, 0x10]);
        put(&mut data, 60, &[0, 32, 0xEE, 0xEE]);
        put(&mut data, 64, &[0, 33, 0x00, 0x20]);

        let card = decode_card_data(&data, CardModel::Si9, reference()).unwrap();
        let codes: Vec<u16> = card.punches.iter().map(|p| p.code).collect();
        assert_eq!(codes, vec![31, 33]);
    }

    #[test]
    fn test_short_payload_is_an_error() {
        let mut data = vec![0u8; 200];
        data[18] = 30;

        let result = decode_card_data(&data, CardModel::Si6, reference());
        assert!(matches!(
            result,
            Err(Error::CardDataTooShort { model: "SI6", actual: 200, .. })
        ));
    }

    #[test]
    fn test_punch_count_is_clamped() {
        let mut data = vec![0u8; 256];
        data[22] = 0xFF;

        let card = decode_card_data(&data, CardModel::PCard, reference()).unwrap();
        assert_eq!(card.punches.len(), 20);
    }

    fn payload_len(model: CardModel) -> usize {
        match model {
            CardModel::Si5 => 128,
            other => other.read_plan().frame_count() * 128,
        }
    }

    proptest! {
        #[test]
        fn prop_punches_never_exceed_model_maximum(
            model in prop::sample::select(vec![
                CardModel::Si5,
                CardModel::Si6,
                CardModel::Si8,
                CardModel::Si9,
                CardModel::PCard,
                CardModel::Si10,
            ]),
            seed in proptest::collection::vec(any::<u8>(), 640),
        ) {
            let data = &seed[..payload_len(model)];
            let card = decode_card_data(data, model, reference()).unwrap();
            prop_assert!(card.punches.len() <= model.layout().max_punches);
        }
    }
}
