//! Card readout with a station in Readout mode

use std::time::Duration;

use bytes::BytesMut;
use chrono::NaiveDateTime;
use tracing::{debug, info};

use sireader_core::{Request, constants::ACK, decode_card_data};
use sireader_types::{CardRecord, OperatingMode};

use crate::{
    error::{Error, Result},
    intercept::{CardDetector, InsertedCard},
    station::Station,
};

/// Result of an operation that a card change can cut short
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Complete(T),
    /// A card was inserted or removed meanwhile; poll and start over
    CardChanged,
}

impl<T> PollOutcome<T> {
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::CardChanged => None,
        }
    }
}

/// Reads whole SI-cards as they are inserted
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use sireader::{CardReader, PollOutcome, Station};
///
/// #[tokio::main]
/// async fn main() -> sireader::Result<()> {
///     let mut station = Station::new("/dev/ttyUSB0");
///     station.connect().await?;
///
///     let mut reader = CardReader::new(station);
///     loop {
///         if reader.poll_card().await? && reader.card().is_some() {
///             if let PollOutcome::Complete(card) = reader.read_card(None).await? {
///                 println!("{}", card);
///                 reader.ack_card().await?;
///             }
///         }
///         tokio::time::sleep(Duration::from_millis(200)).await;
///     }
/// }
/// ```
pub struct CardReader {
    station: Station<CardDetector>,
}

impl CardReader {
    pub fn new(station: Station) -> Self {
        Self {
            station: station.with_interceptor(CardDetector::new()),
        }
    }

    pub fn station(&self) -> &Station<CardDetector> {
        &self.station
    }

    pub fn station_mut(&mut self) -> &mut Station<CardDetector> {
        &mut self.station
    }

    /// Card currently in the station
    pub fn card(&self) -> Option<InsertedCard> {
        self.station.interceptor().card()
    }

    fn ensure_readout(&self) -> Result<()> {
        self.station.ensure_connected()?;

        let config = self.station.protocol_config()?;
        if !config.extended() {
            return Err(Error::UnsupportedProtocol("extended protocol"));
        }
        if config.mode != OperatingMode::Readout {
            return Err(Error::UnsupportedMode(config.mode));
        }
        Ok(())
    }

    /// Process pending insert and removal frames without waiting
    ///
    /// Returns true if the card in the station changed.
    pub async fn poll_card(&mut self) -> Result<bool> {
        self.ensure_readout()?;

        if self.station.pending()? == 0 {
            return Ok(false);
        }

        let before = self.card();
        while self.station.pending()? > 0 {
            match self.station.read_frame(Duration::ZERO).await {
                Ok(frame) => debug!("Ignoring {}", frame),
                Err(Error::CardChanged) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(self.card() != before)
    }

    /// Read the card found by [`CardReader::poll_card`]
    ///
    /// Card times are dated relative to `reference`, by default two
    /// hours ahead of the station clock.
    pub async fn read_card(
        &mut self,
        reference: Option<NaiveDateTime>,
    ) -> Result<PollOutcome<CardRecord>> {
        self.ensure_readout()?;

        let card = self.card().ok_or(Error::NoCard)?;
        let plan = card.model.read_plan();
        debug!(
            "Reading {} card {} ({} frames)",
            card.model,
            card.number,
            plan.frame_count()
        );

        let timeout = self.station.timeout();
        let mut data = BytesMut::new();
        for step in &plan.requests {
            let request = match step.block {
                Some(block) => Request::with_parameters(step.command, vec![block]),
                None => Request::new(step.command),
            };

            for index in 0..step.frames {
                let frame = if index == 0 {
                    self.station.exchange(&request).await
                } else {
                    self.station.read_frame(timeout).await
                };

                let frame = match frame {
                    Ok(frame) => frame,
                    Err(Error::CardChanged) => {
                        info!("Card changed while reading card {}", card.number);
                        return Ok(PollOutcome::CardChanged);
                    }
                    Err(e) => return Err(e),
                };

                if frame.command != step.command {
                    return Err(Error::Protocol(format!(
                        "Expected {} reply, got {}",
                        step.command, frame.command
                    )));
                }

                let payload = if plan.strip_block_number {
                    frame.data.get(1..).unwrap_or_default()
                } else {
                    &frame.data[..]
                };
                data.extend_from_slice(payload);
            }
        }

        let reference = reference.unwrap_or_else(|| self.station.reference_time());
        let record = decode_card_data(&data, card.model, reference)?;
        info!("Read {}", record);
        Ok(PollOutcome::Complete(record))
    }

    /// Confirm a successful readout; the station beeps until the card is
    /// removed
    pub async fn ack_card(&mut self) -> Result<()> {
        self.station.ensure_connected()?;
        self.station.send_raw(&[ACK]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Sysval, at, connected, reply};
    use pretty_assertions::assert_eq;
    use sireader_core::{CardModel, Command, ProtocolFlags, constants::TIME_RESET};
    use sireader_transport::mock::ScriptHandle;

    fn readout() -> Sysval {
        Sysval::new(OperatingMode::Readout, ProtocolFlags::EXTENDED | ProtocolFlags::HANDSHAKE)
    }

    async fn reader(sysval: &Sysval) -> (CardReader, ScriptHandle) {
        let (station, handle) = connected(sysval).await;
        (CardReader::new(station), handle)
    }

    fn si5_inserted() -> Vec<u8> {
        reply(Command::Si5Detected, vec![0x00, 0x03, 0x04, 0xD2])
    }

    fn si5_data() -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[4..7].copy_from_slice(&[0x04, 0xD2, 0x03]);
        data[19..21].copy_from_slice(&36000u16.to_be_bytes());
        data[21..23].copy_from_slice(&TIME_RESET);
        data[25..27].copy_from_slice(&TIME_RESET);
        data[23] = 2;
        // Byte 32 starts a block and holds no punch
        data[33..36].copy_from_slice(&[31, 0x8C, 0xA0]);
        data
    }

    #[tokio::test]
    async fn test_poll_without_frames() {
        let (mut reader, _handle) = reader(&readout()).await;
        assert!(!reader.poll_card().await.unwrap());
        assert_eq!(reader.card(), None);
    }

    #[tokio::test]
    async fn test_insert_and_read_si5() {
        let (mut reader, handle) = reader(&readout()).await;
        handle.inject(si5_inserted());

        assert!(reader.poll_card().await.unwrap());
        assert_eq!(
            reader.card(),
            Some(InsertedCard {
                model: CardModel::Si5,
                number: 301234
            })
        );

        handle.push_reply(reply(Command::GetSi5, si5_data()));
        let card = reader
            .read_card(Some(at(4, 12, 0, 0)))
            .await
            .unwrap()
            .complete()
            .unwrap();

        assert_eq!(card.card_number, 301234);
        assert_eq!(card.start, Some(at(4, 10, 0, 0)));
        assert_eq!(card.finish, None);
        assert_eq!(card.punches.len(), 1);
        assert_eq!(card.punches[0].code, 31);

        reader.ack_card().await.unwrap();
        assert_eq!(handle.sent().last().unwrap(), &vec![ACK]);
    }

    #[tokio::test]
    async fn test_insert_then_remove_is_no_change() {
        let (mut reader, handle) = reader(&readout()).await;
        handle.inject(si5_inserted());
        handle.inject(reply(Command::CardRemoved, vec![0x00, 0x03, 0x04, 0xD2]));

        assert!(!reader.poll_card().await.unwrap());
        assert_eq!(reader.card(), None);
    }

    #[tokio::test]
    async fn test_removal_during_si6_read() {
        let (mut reader, handle) = reader(&readout()).await;
        handle.inject(reply(Command::Si6Detected, vec![0x00, 0x0B, 0x71, 0xB0]));
        assert!(reader.poll_card().await.unwrap());

        let mut first = vec![0x00];
        first.extend(vec![0u8; 128]);
        let mut replies = reply(Command::GetSi6, first);
        replies.extend(reply(Command::CardRemoved, vec![0x00, 0x0B, 0x71, 0xB0]));
        handle.push_reply(replies);

        let outcome = reader.read_card(None).await.unwrap();
        assert_eq!(outcome, PollOutcome::CardChanged);
        assert_eq!(reader.card(), None);

        let sent = handle.sent();
        assert_eq!(&sent.last().unwrap()[1..5], &[0x02, 0xE1, 0x01, 0x08]);
    }

    #[tokio::test]
    async fn test_read_si9_strips_block_numbers() {
        let (mut reader, handle) = reader(&readout()).await;
        // 1000000 = 0x0F4240
        handle.inject(reply(Command::Si9Detected, vec![0x01, 0x0F, 0x42, 0x40]));
        assert!(reader.poll_card().await.unwrap());

        let mut block0 = vec![0x00; 129];
        block0[1 + 25..1 + 28].copy_from_slice(&[0x0F, 0x42, 0x40]);
        block0[1 + 22] = 1;
        block0[1 + 56..1 + 60].copy_from_slice(&[0x00, 40, 0x8C, 0xA0]);
        let mut block1 = vec![0x00; 129];
        block1[0] = 0x01;

        handle.push_reply(reply(Command::GetSi9, block0));
        handle.push_reply(reply(Command::GetSi9, block1));

        let card = reader
            .read_card(Some(at(4, 12, 0, 0)))
            .await
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(card.card_number, 1_000_000);
        assert_eq!(card.punches.len(), 1);
        assert_eq!(card.punches[0].code, 40);
        assert_eq!(handle.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_read_without_card() {
        let (mut reader, _handle) = reader(&readout()).await;
        assert!(matches!(reader.read_card(None).await, Err(Error::NoCard)));
    }

    #[tokio::test]
    async fn test_requires_readout_mode() {
        let control = Sysval::new(OperatingMode::Control, ProtocolFlags::EXTENDED);
        let (mut control_reader, _handle) = reader(&control).await;
        assert!(matches!(
            control_reader.poll_card().await,
            Err(Error::UnsupportedMode(OperatingMode::Control))
        ));

        let legacy = Sysval::new(OperatingMode::Readout, ProtocolFlags::HANDSHAKE);
        let (mut legacy_reader, _handle) = reader(&legacy).await;
        assert!(matches!(
            legacy_reader.poll_card().await,
            Err(Error::UnsupportedProtocol(_))
        ));
    }
}
