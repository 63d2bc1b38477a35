//! Type definitions for sireader
//!
//! Value objects returned by the protocol layer. None of them hold a
//! reference back to the station they were read from.

pub mod error;
pub mod mode;
pub mod record;
pub mod station_info;

pub use error::{Error, Result};
pub use mode::{OperatingMode, StationCode};
pub use record::{BackupRecord, CardRecord, Punch, PunchEvent};
pub use station_info::StationInfo;
