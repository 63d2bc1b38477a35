//! Scripted station fixtures

use chrono::{NaiveDate, NaiveDateTime};

use sireader_core::{
    Command, Frame,
    constants::sysval as offset,
    sysval::{ProtocolFlags, SystemConfig},
};
use sireader_transport::mock::{ScriptHandle, ScriptedTransport};
use sireader_types::OperatingMode;

use crate::{clock::MockClock, station::Station};

pub(crate) const CODE: u16 = 31;

pub(crate) fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// Saturday noon
pub(crate) fn now() -> NaiveDateTime {
    at(4, 12, 0, 0)
}

pub(crate) fn clock() -> MockClock {
    let mut clock = MockClock::new();
    clock.expect_now().return_const(now());
    clock
}

/// Encoded reply frame from station [`CODE`]
pub(crate) fn reply(command: Command, data: impl Into<Vec<u8>>) -> Vec<u8> {
    Frame::new(command, CODE, data.into()).encode().to_vec()
}

/// Configuration block as returned by a full read
#[derive(Debug, Clone)]
pub(crate) struct Sysval {
    pub mode: OperatingMode,
    pub protocol: ProtocolFlags,
    pub feedback: u8,
    pub backup_end: u32,
}

impl Sysval {
    pub fn new(mode: OperatingMode, protocol: ProtocolFlags) -> Self {
        Self {
            mode,
            protocol,
            feedback: 0x05,
            backup_end: 0x100,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; SystemConfig::REPLY_LEN];
        let mut put = |at: u8, bytes: &[u8]| {
            let start = usize::from(at) + 1;
            data[start..start + bytes.len()].copy_from_slice(bytes);
        };

        put(offset::SERIAL_NO, &80123u32.to_be_bytes());
        put(offset::FIRMWARE, b"656");
        put(offset::MODEL_ID, &[0x91, 0x98]);
        put(offset::MODE, &[self.mode.code()]);
        put(offset::STATION_CODE, &[CODE as u8]);
        put(offset::FEEDBACK, &[self.feedback]);
        put(offset::PROTO, &[self.protocol.bits()]);
        let [a, b, c, d] = self.backup_end.to_be_bytes();
        put(offset::BACKUP_PTR_HI, &[a, b]);
        put(offset::BACKUP_PTR_LO, &[c, d]);
        data
    }

    pub fn reply(&self) -> Vec<u8> {
        reply(Command::GetSysVal, self.bytes())
    }
}

/// Queue the replies of a successful connect
pub(crate) fn script_connect(handle: &ScriptHandle, sysval: &Sysval) {
    handle.push_reply(reply(Command::SetMs, vec![0x4D]));
    handle.push_reply(sysval.reply());
}

/// Connected station backed by a scripted transport
pub(crate) async fn connected(sysval: &Sysval) -> (Station, ScriptHandle) {
    let transport = ScriptedTransport::new("mock");
    let handle = transport.handle();
    script_connect(&handle, sysval);

    let mut station = Station::with_transport(Box::new(transport)).with_clock(clock());
    station.connect().await.unwrap();
    assert_eq!(handle.pending_replies(), 0);

    (station, handle)
}
