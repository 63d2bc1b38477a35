//! Search serial ports for stations

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use sireader_transport::available_ports;

use crate::{error::Result, station::Station};

/// Try each port in parallel; returns `(port, station code)` for every
/// port where a station answered
pub async fn scan_stations<P>(ports: P) -> Vec<(String, u16)>
where
    P: IntoIterator,
    P::Item: Into<String>,
{
    scan_with(ports, Station::new).await
}

/// Scan every serial port of this machine
pub async fn scan_available() -> Result<Vec<(String, u16)>> {
    Ok(scan_stations(available_ports()?).await)
}

/// Scan with stations built by `make`, one task per port
pub async fn scan_with<P, F>(ports: P, mut make: F) -> Vec<(String, u16)>
where
    P: IntoIterator,
    P::Item: Into<String>,
    F: FnMut(String) -> Station,
{
    let mut tasks = JoinSet::new();

    for port in ports {
        let port: String = port.into();
        let mut station = make(port.clone());

        tasks.spawn(async move {
            if let Err(e) = station.connect().await {
                debug!("No station on {}: {}", port, e);
                return None;
            }

            let code = station.station_code();
            if let Err(e) = station.disconnect().await {
                warn!("Failed to close {}: {}", port, e);
            }
            Some((port, code))
        });
    }

    let mut found = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(hit)) => found.push(hit),
            Ok(None) => {}
            Err(e) => warn!("Scan task failed: {}", e),
        }
    }

    info!("Found {} station(s)", found.len());
    found
}
