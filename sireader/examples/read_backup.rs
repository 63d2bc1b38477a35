//! Backup memory example
//!
//! Reads the backup memory of the station coupled to the attached one,
//! or of the attached station itself with `SI_DIRECT=1`.

use sireader::{BACKUP_CSV_HEADER, Station, scan_available};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> sireader::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = match std::env::var("SI_PORT") {
        Ok(port) => port,
        Err(_) => match scan_available().await?.into_iter().next() {
            Some((port, code)) => {
                println!("Found station {} on {}", code, port);
                port
            }
            None => {
                println!("No station found");
                return Ok(());
            }
        },
    };

    let mut station = Station::new(port);
    station.connect().await?;

    if std::env::var("SI_DIRECT").is_err() {
        station.set_remote().await?;
    }

    let records = station.read_backup().await?;
    let info = station.station_info()?;
    println!("{} records in station {}", records.len(), info);

    println!("{}", BACKUP_CSV_HEADER);
    for (no, record) in records.iter().enumerate() {
        let time = record
            .time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| record.error.clone());
        println!(
            "{};;{};{};{:.2};{};{};{};{};{};;;;;;;;",
            no + 1,
            record.card_number,
            time,
            info.battery_voltage,
            info.serial_number,
            info.station_code,
            record.date.format("%a"),
            time,
            info.mode.name(),
        );
    }

    station.disconnect().await?;
    Ok(())
}
