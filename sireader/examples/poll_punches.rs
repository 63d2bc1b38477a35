//! Live punch example
//!
//! The station must be in Control mode with extended protocol and
//! autosend.

use std::time::Duration;

use sireader::{PunchReader, Station};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> sireader::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = std::env::var("SI_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let mut station = Station::new(port);
    station.connect().await?;
    println!("Listening on station {}", station.station_code());

    let mut reader = PunchReader::new(station);
    loop {
        for punch in reader.poll_punch(Duration::from_secs(1)).await? {
            match punch.time {
                Some(time) => println!("{:>8}  {}", punch.card_number, time),
                None => println!("{:>8}  (no time)", punch.card_number),
            }
        }
    }
}
