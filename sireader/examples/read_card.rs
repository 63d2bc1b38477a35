//! Card readout example
//!
//! The station must be in Readout mode with extended protocol.

use std::time::Duration;

use sireader::{CardReader, PollOutcome, Station};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> sireader::Result<()> {
    // RUST_LOG=sireader=debug for protocol details
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = std::env::var("SI_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let mut station = Station::new(port);
    station.connect().await?;
    println!("Connected to {}", station.station_info()?);

    let mut reader = CardReader::new(station);
    println!("Insert a card...");

    loop {
        if !reader.poll_card().await? || reader.card().is_none() {
            sleep(Duration::from_millis(100)).await;
            continue;
        }

        match reader.read_card(None).await {
            Ok(PollOutcome::Complete(card)) => {
                println!("{}", card);
                for punch in &card.punches {
                    println!("  {:>4}  {}", punch.code, punch.time);
                }
                reader.ack_card().await?;
            }
            Ok(PollOutcome::CardChanged) => println!("Card removed during readout"),
            Err(e) if e.is_recoverable() => println!("Readout failed, reinsert card: {}", e),
            Err(e) => return Err(e),
        }
    }
}
