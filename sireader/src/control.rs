//! Live punches from a control station in autosend mode

use std::time::Duration;

use tracing::{debug, info};

use sireader_core::{
    Command, Request, TransmitRecord,
    backup::{Chunk, chunk_payload, decode_extended},
    constants::backup::EXTENDED_RECORD_LEN,
};
use sireader_types::PunchEvent;

use crate::{
    error::{Error, Result},
    station::Station,
};

const RECORD_LEN: u32 = EXTENDED_RECORD_LEN as u32;

/// Collects punches a station sends on its own
///
/// Every punch carries its backup memory address, so punches lost on the
/// line are read back from the backup memory.
pub struct PunchReader {
    station: Station,
    next_offset: Option<u32>,
}

impl PunchReader {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            next_offset: None,
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn station_mut(&mut self) -> &mut Station {
        &mut self.station
    }

    /// Backup address the next punch is expected at
    pub fn next_offset(&self) -> Option<u32> {
        self.next_offset
    }

    /// Collect punches until none arrives within `timeout`
    ///
    /// Returns an empty list if no new punches are available. Punches
    /// are returned in backup memory order, lost ones read back in place.
    /// After an error the cursor stays at the first punch not returned,
    /// so the next poll reads it back.
    pub async fn poll_punch(&mut self, timeout: Duration) -> Result<Vec<PunchEvent>> {
        self.station.ensure_connected()?;

        let config = self.station.protocol_config()?;
        if !config.extended() {
            return Err(Error::UnsupportedProtocol("extended protocol"));
        }
        if !config.autosend() {
            return Err(Error::UnsupportedProtocol("autosend"));
        }

        // Backup reads need an empty input buffer, so drain first
        let mut records = Vec::new();
        let drained = self.drain(timeout, &mut records).await;

        let resume = self.next_offset.or_else(|| records.first().map(|r| r.offset));
        if let Err(e) = drained {
            self.next_offset = resume;
            return Err(e);
        }

        match self.deliver(&records).await {
            Ok((punches, next)) => {
                self.next_offset = next;
                Ok(punches)
            }
            Err(e) => {
                self.next_offset = resume;
                Err(e)
            }
        }
    }

    /// Read autosend frames until the line goes quiet
    async fn drain(&mut self, timeout: Duration, records: &mut Vec<TransmitRecord>) -> Result<()> {
        loop {
            let frame = match self.station.read_frame(timeout).await {
                Ok(frame) => frame,
                Err(Error::Timeout) => return Ok(()),
                Err(e) => return Err(e),
            };

            if frame.command != Command::TransmitRecord {
                return Err(Error::Protocol(format!(
                    "Unexpected command {} received",
                    frame.command
                )));
            }
            records.push(TransmitRecord::decode(&frame.data)?);
        }
    }

    /// Backfill gaps before each record; returns the punches and the new
    /// cursor
    async fn deliver(
        &mut self,
        records: &[TransmitRecord],
    ) -> Result<(Vec<PunchEvent>, Option<u32>)> {
        let reference = self.station.reference_time();
        let mut cursor = self.next_offset;
        let mut punches = Vec::with_capacity(records.len());

        for record in records {
            if let Some(mut next) = cursor {
                while next < record.offset {
                    punches.push(self.read_punch(next).await?);
                    next += RECORD_LEN;
                }
            }
            cursor = Some(record.offset + RECORD_LEN);

            let punch = PunchEvent::new(record.card_number, record.punch_time(reference));
            debug!("Punch of card {} at {:?}", punch.card_number, punch.time);
            punches.push(punch);
        }

        Ok((punches, cursor))
    }

    /// Read one record back from the backup memory
    async fn read_punch(&mut self, offset: u32) -> Result<PunchEvent> {
        info!("Recovering lost punch at 0x{:06X}", offset);

        let chunk = Chunk {
            address: offset,
            count: EXTENDED_RECORD_LEN as u8,
        };
        let request = Request::with_parameters(Command::GetBackup, chunk.parameters().to_vec());
        let frame = self.station.exchange(&request).await?;
        if frame.command != Command::GetBackup {
            return Err(Error::Protocol(format!(
                "Expected {} reply, got {}",
                Command::GetBackup,
                frame.command
            )));
        }
        let record = decode_extended(chunk_payload(&frame.data)?)?;

        Ok(PunchEvent::new(record.card_number, record.time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Sysval, at, connected, reply};
    use pretty_assertions::assert_eq;
    use sireader_core::ProtocolFlags;
    use sireader_transport::mock::ScriptHandle;
    use sireader_types::OperatingMode;

    fn autosend() -> Sysval {
        Sysval::new(OperatingMode::Control, ProtocolFlags::EXTENDED | ProtocolFlags::AUTOSEND)
    }

    async fn reader() -> (PunchReader, ScriptHandle) {
        let (station, handle) = connected(&autosend()).await;
        (PunchReader::new(station), handle)
    }

    /// Autosend frame for card 1000000 at `seconds` past midnight/noon
    fn transmit(seconds: u16, offset: u32) -> Vec<u8> {
        let [hi, lo] = seconds.to_be_bytes();
        let [_, a, b, c] = offset.to_be_bytes();
        reply(
            Command::TransmitRecord,
            vec![0x00, 0x0F, 0x42, 0x40, 0x0C, hi, lo, 0x00, a, b, c],
        )
    }

    /// Backup record of card 1000000 on 4 May 2024 at `seconds` past midnight
    fn backup(offset: u32, seconds: u16) -> Vec<u8> {
        let [_, a, b, c] = offset.to_be_bytes();
        let [hi, lo] = seconds.to_be_bytes();
        reply(
            Command::GetBackup,
            vec![a, b, c, 0x0F, 0x42, 0x40, 24 << 2 | 1, 0x48, hi, lo, 0x00],
        )
    }

    fn times(punches: &[PunchEvent]) -> Vec<Option<chrono::NaiveDateTime>> {
        punches.iter().map(|p| p.time).collect()
    }

    #[tokio::test]
    async fn test_poll_nothing() {
        let (mut reader, _handle) = reader().await;
        assert!(reader.poll_punch(Duration::ZERO).await.unwrap().is_empty());
        assert_eq!(reader.next_offset(), None);
    }

    #[tokio::test]
    async fn test_consecutive_punches() {
        let (mut reader, handle) = reader().await;
        handle.inject(transmit(36000, 0x100));
        handle.inject(transmit(36060, 0x108));

        let punches = reader.poll_punch(Duration::ZERO).await.unwrap();

        assert_eq!(
            punches,
            vec![
                PunchEvent::new(1_000_000, Some(at(4, 10, 0, 0))),
                PunchEvent::new(1_000_000, Some(at(4, 10, 1, 0))),
            ]
        );
        assert_eq!(reader.next_offset(), Some(0x110));
        assert_eq!(handle.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_lost_punch_is_read_back() {
        let (mut reader, handle) = reader().await;
        handle.inject(transmit(36000, 0x100));
        reader.poll_punch(Duration::ZERO).await.unwrap();

        // The punch at 0x108 never arrived
        handle.inject(transmit(36120, 0x110));
        let mut backup = vec![0x00, 0x01, 0x08];
        backup.extend([0x0F, 0x42, 0x40, 24 << 2 | 1, 0x48, 0x8C, 0xDC, 0x80]);
        handle.push_reply(reply(Command::GetBackup, backup));

        let punches = reader.poll_punch(Duration::ZERO).await.unwrap();

        assert_eq!(punches.len(), 2);
        assert_eq!(punches[0].card_number, 1_000_000);
        assert_eq!(
            punches[0].time,
            Some(at(4, 10, 1, 0) + chrono::TimeDelta::milliseconds(500))
        );
        assert_eq!(punches[1].time, Some(at(4, 10, 2, 0)));

        let sent = handle.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(&sent[2][1..8], &[0x02, 0x81, 0x04, 0x00, 0x01, 0x08, 0x08]);
        assert_eq!(reader.next_offset(), Some(0x118));
    }

    #[tokio::test]
    async fn test_gap_with_frames_queued() {
        let (mut reader, handle) = reader().await;
        handle.inject(transmit(36000, 0x100));
        reader.poll_punch(Duration::ZERO).await.unwrap();

        // 0x108 is lost while two more punches wait on the line
        handle.inject(transmit(36120, 0x110));
        handle.inject(transmit(36180, 0x118));
        handle.push_reply(backup(0x108, 36060));

        let punches = reader.poll_punch(Duration::ZERO).await.unwrap();

        assert_eq!(
            times(&punches),
            vec![
                Some(at(4, 10, 1, 0)),
                Some(at(4, 10, 2, 0)),
                Some(at(4, 10, 3, 0)),
            ]
        );
        assert_eq!(reader.next_offset(), Some(0x120));
        assert_eq!(handle.pending_replies(), 0);
        assert_eq!(handle.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_frame_error_keeps_undelivered_punches() {
        let (mut reader, handle) = reader().await;
        handle.inject(transmit(36000, 0x100));
        let mut corrupt = transmit(36060, 0x108);
        let crc = corrupt.len() - 3;
        corrupt[crc] ^= 0xFF;
        handle.inject(corrupt);

        let result = reader.poll_punch(Duration::ZERO).await;
        assert!(matches!(result, Err(Error::Core(e)) if e.is_frame_error()));
        assert_eq!(reader.next_offset(), Some(0x100));
        assert_eq!(handle.pending_input(), 0);

        // Both punches of the failed poll come back from the backup memory
        handle.inject(transmit(36120, 0x110));
        handle.push_reply(backup(0x100, 36000));
        handle.push_reply(backup(0x108, 36060));

        let punches = reader.poll_punch(Duration::ZERO).await.unwrap();

        assert_eq!(
            times(&punches),
            vec![
                Some(at(4, 10, 0, 0)),
                Some(at(4, 10, 1, 0)),
                Some(at(4, 10, 2, 0)),
            ]
        );
        assert_eq!(reader.next_offset(), Some(0x118));
        assert_eq!(handle.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_read_back_is_retried() {
        let (mut reader, handle) = reader().await;
        handle.inject(transmit(36000, 0x100));
        reader.poll_punch(Duration::ZERO).await.unwrap();

        handle.inject(transmit(36120, 0x110));
        handle.push_silence();
        assert!(matches!(
            reader.poll_punch(Duration::ZERO).await,
            Err(Error::Timeout)
        ));
        assert_eq!(reader.next_offset(), Some(0x108));

        handle.inject(transmit(36180, 0x118));
        handle.push_reply(backup(0x108, 36060));
        handle.push_reply(backup(0x110, 36120));

        let punches = reader.poll_punch(Duration::ZERO).await.unwrap();

        assert_eq!(
            times(&punches),
            vec![
                Some(at(4, 10, 1, 0)),
                Some(at(4, 10, 2, 0)),
                Some(at(4, 10, 3, 0)),
            ]
        );
        assert_eq!(reader.next_offset(), Some(0x120));
    }

    #[tokio::test]
    async fn test_unexpected_frame() {
        let (mut reader, handle) = reader().await;
        handle.inject(reply(Command::Si5Detected, vec![0x00, 0x03, 0x04, 0xD2]));

        assert!(matches!(
            reader.poll_punch(Duration::ZERO).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_requires_autosend() {
        let handshake = Sysval::new(
            OperatingMode::Control,
            ProtocolFlags::EXTENDED | ProtocolFlags::HANDSHAKE,
        );
        let (station, _handle) = connected(&handshake).await;
        let mut reader = PunchReader::new(station);

        assert!(matches!(
            reader.poll_punch(Duration::ZERO).await,
            Err(Error::UnsupportedProtocol("autosend"))
        ));
    }
}
