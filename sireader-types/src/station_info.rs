//! Station information structures

use std::fmt;

use chrono::NaiveDate;

use crate::mode::OperatingMode;

/// Station information
#[derive(Debug, Clone, PartialEq)]
pub struct StationInfo {
    /// Station serial number
    pub serial_number: u32,

    /// Firmware version (three ASCII digits, e.g. "656")
    pub firmware_version: String,

    /// Hardware model name (e.g. "BSM8-USB/SRR")
    pub model: String,

    /// Station code (1-1023)
    pub station_code: u16,

    pub mode: OperatingMode,

    pub build_date: Option<NaiveDate>,

    pub battery_date: Option<NaiveDate>,

    /// Battery voltage in volts
    pub battery_voltage: f64,

    /// Used battery capacity in percent
    pub battery_used: f64,

    /// Backup memory size in KB
    pub memory_size: u8,

    /// Active time in minutes
    pub active_time: u16,
}

impl fmt::Display for StationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Station[SN: {}, Model: {}, FW: {}, Code: {}, Mode: {}]",
            self.serial_number, self.model, self.firmware_version, self.station_code, self.mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_info_display() {
        let info = StationInfo {
            serial_number: 80123,
            firmware_version: "656".into(),
            model: "BSM8-USB/SRR".into(),
            station_code: 31,
            mode: OperatingMode::Control,
            build_date: None,
            battery_date: None,
            battery_voltage: 3.4,
            battery_used: 12.5,
            memory_size: 128,
            active_time: 240,
        };

        assert_eq!(
            info.to_string(),
            "Station[SN: 80123, Model: BSM8-USB/SRR, FW: 656, Code: 31, Mode: Control]"
        );
    }
}
