//! # sireader-core
//!
//! Core protocol implementation for SportIdent stations.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC16 calculation
//! - Command definitions and protocol constants
//! - System configuration (SYS_VAL) accessors
//! - SI-card layouts and card data decoding
//! - Backup memory record decoding
//! - Timestamp reconstruction for truncated time fields
//!
//! Nothing in here performs I/O.

pub mod backup;
pub mod card;
pub mod carddata;
pub mod command;
pub mod constants;
pub mod crc;
pub mod error;
pub mod frame;
pub mod session;
pub mod sysval;
pub mod time;

pub use backup::{RecordFormat, TransmitRecord};
pub use card::{CardEvent, CardLayout, CardModel, ReadPlan, ReadRequest, decode_card_number};
pub use carddata::decode_card_data;
pub use command::Command;
pub use error::{Error, Result};
pub use frame::{Frame, Request};
pub use session::{Addressing, Session, SessionState};
pub use sysval::{FeedbackFlags, ProtocolConfig, ProtocolFlags, Si6Blocks, SystemConfig};
pub use time::{decode_station_code, decode_time};
