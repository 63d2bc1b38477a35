//! # sireader
//!
//! Client for SportIdent BSM7/8 timing stations over a serial line.
//!
//! ## Features
//!
//! - Station configuration, clock and backup memory access
//! - SI-card readout (SI5, SI6, SI8, SI9, pCard, SI10/11)
//! - Live punches in autosend mode, with lost punches read back
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use sireader::Station;
//!
//! #[tokio::main]
//! async fn main() -> sireader::Result<()> {
//!     // Connect to station
//!     let mut station = Station::new("/dev/ttyUSB0");
//!     station.connect().await?;
//!
//!     // Get station info
//!     let info = station.station_info()?;
//!     println!("{}", info);
//!
//!     // Read backup memory
//!     for record in station.read_backup().await? {
//!         println!("{} {:?} {}", record.card_number, record.time, record.error);
//!     }
//!
//!     station.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod control;
pub mod error;
pub mod intercept;
mod link;
pub mod readout;
pub mod scan;
pub mod station;

#[cfg(test)]
mod testing;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use control::PunchReader;
pub use error::{Error, Result};
pub use intercept::{CardDetector, Disposition, FrameInterceptor, InsertedCard, PassThrough};
pub use readout::{CardReader, PollOutcome};
pub use scan::{scan_available, scan_stations, scan_with};
pub use station::Station;

// Re-export types
pub use sireader_core::{CardModel, Command, Frame, ProtocolConfig, Session, SystemConfig};
pub use sireader_transport::{SerialTransport, Transport, available_ports};
pub use sireader_types::{BackupRecord, CardRecord, OperatingMode, Punch, PunchEvent, StationInfo};

/// Column header of the backup CSV export used by SI Config+
pub const BACKUP_CSV_HEADER: &str = "No;Read on;SIID;Control time;Battery voltage;Serial number;Code number;DayOfWeek;Punch DateTime;Operating mode;SIAC number;SIAC Count;SIAC radio mode;SIAC is battery low;SIAC is card full;SIAC beacon mode;SIAC is gate mode;";
