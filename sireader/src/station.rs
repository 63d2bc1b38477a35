//! High-level station interface

use std::time::Duration;

use bytes::BytesMut;
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info, trace, warn};

use sireader_core::{
    Command, Frame, ProtocolConfig, Request, Session, Si6Blocks, SystemConfig,
    backup::{RecordFormat, chunk_payload, chunks, decode_records},
    constants::{
        DEFAULT_READ_TIMEOUT, HIGH_BAUD_RATE, LOW_BAUD_RATE, MAX_ACTIVE_TIME,
        REFERENCE_MARGIN_HOURS, addressing, backup, baud, sysval as offset,
    },
    session::Addressing,
    sysval::FeedbackFlags,
    time::{decode_clock, encode_clock},
};
use sireader_transport::{SerialTransport, Transport};
use sireader_types::{BackupRecord, OperatingMode, StationCode, StationInfo};

use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    intercept::{Disposition, FrameInterceptor, PassThrough},
    link::Link,
};

/// SportIdent BSM7/8 station
///
/// One command is in flight at a time. Every configuration write is
/// followed by a fresh read of the configuration block.
///
/// # Examples
///
/// ```no_run
/// use sireader::Station;
///
/// #[tokio::main]
/// async fn main() -> sireader::Result<()> {
///     let mut station = Station::new("/dev/ttyUSB0");
///
///     station.connect().await?;
///     println!("Station: {}", station.station_info()?);
///
///     station.beep(2).await?;
///     station.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Station<I = PassThrough> {
    link: Link,
    session: Session,
    interceptor: I,
    clock: Box<dyn Clock>,
    timeout: Duration,
    low_speed: bool,
}

impl Station<PassThrough> {
    /// Create a station on a serial port
    pub fn new(port: impl Into<String>) -> Self {
        Self::with_transport(Box::new(SerialTransport::new(port)))
    }

    /// Create a station on any transport
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            link: Link::new(transport, DEFAULT_READ_TIMEOUT, true),
            session: Session::new(),
            interceptor: PassThrough,
            clock: Box::new(SystemClock),
            timeout: DEFAULT_READ_TIMEOUT,
            low_speed: false,
        }
    }
}

impl<I: FrameInterceptor> Station<I> {
    /// Set read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.link.set_timeout(timeout);
        self
    }

    /// Send a wake-up byte before each command (default: true)
    pub fn with_wakeup(mut self, wakeup: bool) -> Self {
        self.link.set_wakeup(wakeup);
        self
    }

    /// Connect at 4800 baud only
    pub fn with_low_speed(mut self, low_speed: bool) -> Self {
        self.low_speed = low_speed;
        self
    }

    /// Clock used to date card and backup times
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub(crate) fn with_interceptor<J: FrameInterceptor>(self, interceptor: J) -> Station<J> {
        Station {
            link: self.link,
            session: self.session,
            interceptor,
            clock: self.clock,
            timeout: self.timeout,
            low_speed: self.low_speed,
        }
    }

    pub(crate) fn interceptor(&self) -> &I {
        &self.interceptor
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_connected() && self.link.transport().is_connected()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn port_name(&self) -> String {
        self.link.transport().port_name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open the port and take control of the attached station
    ///
    /// Tries 38400 baud first and falls back to 4800 once. The
    /// configuration block is read on success.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The port cannot be opened
    /// - No station answers at either speed
    /// - The configuration block cannot be read
    pub async fn connect(&mut self) -> Result<()> {
        let port = self.port_name();
        let baud_rate = if self.low_speed {
            LOW_BAUD_RATE
        } else {
            HIGH_BAUD_RATE
        };

        info!("Connecting to {} at {} baud...", port, baud_rate);
        self.session.begin_connect(port.as_str(), baud_rate)?;

        if let Err(e) = self.open(baud_rate).await {
            self.session.close();
            if self.link.transport().is_connected() {
                if let Err(close) = self.link.transport_mut().disconnect().await {
                    warn!("Failed to close {}: {}", port, close);
                }
            }
            return Err(e);
        }

        info!(
            "Connected to station {} on {} ({} baud)",
            self.session.station_code(),
            port,
            self.session.baud_rate()
        );
        Ok(())
    }

    async fn open(&mut self, baud_rate: u32) -> Result<()> {
        let transport = self.link.transport_mut();
        transport.connect(baud_rate).await?;
        transport.flush_input()?;
        transport.flush_output()?;

        let direct = Request::with_parameters(Command::SetMs, vec![addressing::DIRECT]);
        if let Err(e) = self.exchange(&direct).await {
            if baud_rate == LOW_BAUD_RATE {
                return Err(e);
            }

            info!("No answer at {} baud ({}), trying {}", baud_rate, e, LOW_BAUD_RATE);
            let transport = self.link.transport_mut();
            transport.set_baud_rate(LOW_BAUD_RATE)?;
            transport.flush_input()?;
            self.session.set_baud_rate(LOW_BAUD_RATE);

            self.exchange(&direct).await?;
        }

        self.session.establish()?;
        self.refresh_config().await?;
        Ok(())
    }

    /// Close the port
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.link.transport().is_connected() {
            self.session.close();
            return Ok(());
        }

        info!("Disconnecting from {}...", self.port_name());

        self.link.transport_mut().disconnect().await?;
        self.session.close();

        info!("Disconnected");
        Ok(())
    }

    /// Close the port and connect again
    pub async fn reconnect(&mut self) -> Result<()> {
        self.disconnect().await?;
        self.connect().await
    }

    /// Drop everything buffered in both directions
    pub fn flush(&mut self) -> Result<()> {
        let transport = self.link.transport_mut();
        transport.flush_input()?;
        transport.flush_output()?;
        Ok(())
    }

    /// Address the station attached to the port
    pub async fn set_direct(&mut self) -> Result<()> {
        self.set_addressing(Addressing::Direct).await
    }

    /// Address the station coupled to the attached one
    pub async fn set_remote(&mut self) -> Result<()> {
        self.set_addressing(Addressing::Remote).await
    }

    async fn set_addressing(&mut self, target: Addressing) -> Result<()> {
        self.ensure_connected()?;

        let parameter = match target {
            Addressing::Direct => addressing::DIRECT,
            Addressing::Remote => addressing::REMOTE,
        };
        self.exchange(&Request::with_parameters(Command::SetMs, vec![parameter]))
            .await?;
        self.session.set_addressing(target)?;

        debug!("Addressing {:?} station", target);
        Ok(())
    }

    /// Read the whole configuration block
    pub async fn refresh_config(&mut self) -> Result<&SystemConfig> {
        debug!("Reading system configuration...");

        let request = Request::with_parameters(Command::GetSysVal, vec![0x00, offset::LEN]);
        let frame = self.exchange(&request).await?;
        let config = SystemConfig::from_reply(frame.data)?;

        debug!("System configuration: {:?}", config);
        self.session.update_config(config);
        Ok(self.session.config()?)
    }

    /// Configuration block as last read
    pub fn system_config(&self) -> Result<&SystemConfig> {
        Ok(self.session.config()?)
    }

    pub fn protocol_config(&self) -> Result<ProtocolConfig> {
        Ok(self.session.protocol_config()?)
    }

    pub fn station_info(&self) -> Result<StationInfo> {
        Ok(self.system_config()?.station_info())
    }

    pub fn serial_number(&self) -> Result<u32> {
        Ok(self.session.serial_number()?)
    }

    /// Code of the station that sent the latest reply
    pub fn station_code(&self) -> u16 {
        self.session.station_code()
    }

    /// Cached configuration, read again if a change made it stale
    async fn current_config(&mut self) -> Result<SystemConfig> {
        if self.session.is_stale() || self.session.config().is_err() {
            self.refresh_config().await?;
        }
        Ok(self.session.config()?.clone())
    }

    /// Switch between extended and legacy protocol
    pub async fn set_extended_protocol(&mut self, extended: bool) -> Result<()> {
        self.ensure_connected()?;
        let config = self.current_config().await?.protocol().with_extended(extended);
        self.write_sysval(offset::PROTO, &[config.to_byte()]).await
    }

    /// Switch autosend on or off; handshake gets the opposite setting
    pub async fn set_autosend(&mut self, autosend: bool) -> Result<()> {
        self.ensure_connected()?;
        let config = self.current_config().await?.protocol().with_autosend(autosend);
        self.write_sysval(offset::PROTO, &[config.to_byte()]).await
    }

    pub async fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<()> {
        if !mode.is_settable() {
            return Err(Error::InvalidArgument(format!(
                "Unsupported mode '{}'",
                mode.name()
            )));
        }
        self.write_sysval(offset::MODE, &[mode.code()]).await
    }

    /// Set the station code (1-1023)
    pub async fn set_station_code(&mut self, code: u16) -> Result<()> {
        let code = StationCode::new(code)?;
        self.write_sysval(offset::STATION_CODE, &[code.low_byte(), code.high_byte()])
            .await
    }

    pub async fn set_feedback(&mut self, audible: bool, optical: bool) -> Result<()> {
        self.ensure_connected()?;
        let raw = self.current_config().await?.feedback_byte();
        let feedback = FeedbackFlags::apply(raw, audible, optical);
        self.write_sysval(offset::FEEDBACK, &[feedback]).await
    }

    /// Set the time in minutes the station stays on without a punch
    pub async fn set_active_time(&mut self, minutes: u16) -> Result<()> {
        if minutes > MAX_ACTIVE_TIME {
            return Err(Error::InvalidArgument(format!(
                "Active time {} exceeds {} minutes",
                minutes, MAX_ACTIVE_TIME
            )));
        }
        self.write_sysval(offset::ACTIVE_TIME, &minutes.to_be_bytes())
            .await
    }

    /// Read SI6 cards with 192 punches
    pub async fn set_si6_192_support(&mut self, enable: bool) -> Result<()> {
        self.write_sysval(offset::SI6_CB, &[Si6Blocks::setting(enable)])
            .await
    }

    pub async fn set_baud_rate_4800(&mut self) -> Result<()> {
        self.set_station_baud(baud::B4800, LOW_BAUD_RATE).await
    }

    pub async fn set_baud_rate_38400(&mut self) -> Result<()> {
        self.set_station_baud(baud::B38400, HIGH_BAUD_RATE).await
    }

    async fn set_station_baud(&mut self, parameter: u8, baud_rate: u32) -> Result<()> {
        self.ensure_connected()?;
        debug!("Setting station baud rate to {}", baud_rate);

        let written = self
            .exchange(&Request::with_parameters(Command::SetBaud, vec![parameter]))
            .await
            .map(drop);

        // Only the attached station shares our serial line
        if written.is_ok() && self.session.addressing() == Some(Addressing::Direct) {
            self.link.transport_mut().set_baud_rate(baud_rate)?;
            self.session.set_baud_rate(baud_rate);
            info!("Link switched to {} baud", baud_rate);
        }

        self.session.invalidate();
        let refreshed = self.refresh_config().await.map(drop);
        written?;
        refreshed
    }

    async fn write_sysval(&mut self, at: u8, values: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        debug!("Writing system value 0x{:02X}: {:02X?}", at, values);

        let mut parameters = Vec::with_capacity(values.len() + 1);
        parameters.push(at);
        parameters.extend_from_slice(values);

        let written = self
            .exchange(&Request::with_parameters(Command::SetSysVal, parameters))
            .await
            .map(drop);

        self.session.invalidate();
        let refreshed = self.refresh_config().await.map(drop);
        written?;
        refreshed
    }

    /// Read the station clock; `None` if it holds an impossible date
    pub async fn get_time(&mut self) -> Result<Option<NaiveDateTime>> {
        self.ensure_connected()?;
        let frame = self.exchange(&Request::new(Command::GetTime)).await?;
        Ok(decode_clock(&frame.data)?)
    }

    pub async fn set_time(&mut self, time: NaiveDateTime) -> Result<()> {
        self.ensure_connected()?;
        debug!("Setting station time to {}", time);
        let request = Request::with_parameters(Command::SetTime, encode_clock(time).to_vec());
        self.exchange(&request).await?;
        Ok(())
    }

    /// Beep and blink, also without a card inserted
    pub async fn beep(&mut self, count: u8) -> Result<()> {
        self.ensure_connected()?;
        self.exchange(&Request::with_parameters(Command::Beep, vec![count]))
            .await?;
        Ok(())
    }

    pub async fn erase_backup(&mut self) -> Result<()> {
        self.ensure_connected()?;
        warn!("Erasing backup memory of station {}", self.station_code());
        self.exchange(&Request::new(Command::EraseBackup)).await?;
        self.session.invalidate();
        Ok(())
    }

    pub async fn power_off(&mut self) -> Result<()> {
        self.ensure_connected()?;
        warn!("Powering off station {}...", self.station_code());
        self.exchange(&Request::new(Command::PowerOff)).await?;
        Ok(())
    }

    /// Read the entire backup memory in physical order
    ///
    /// Works on stations in Control, Start, Finish, Clear and Check mode.
    /// Call [`Station::set_remote`] first to read a coupled station.
    pub async fn read_backup(&mut self) -> Result<Vec<BackupRecord>> {
        self.ensure_connected()?;

        let config = self.refresh_config().await?.clone();
        let mode = config.mode();
        if !mode.supports_backup_read() {
            return Err(Error::UnsupportedMode(mode));
        }

        let end = config.backup_end_pointer();
        let format = RecordFormat::from_protocol(&config.protocol());
        debug!(
            "Reading backup memory 0x{:06X}..0x{:06X} ({:?} records)",
            backup::START,
            end,
            format
        );

        let mut memory = BytesMut::new();
        for chunk in chunks(backup::START, end) {
            trace!("Reading {} bytes at 0x{:06X}", chunk.count, chunk.address);
            let request = Request::with_parameters(Command::GetBackup, chunk.parameters().to_vec());
            let frame = self.exchange(&request).await?;
            memory.extend_from_slice(chunk_payload(&frame.data)?);
        }

        let records = decode_records(&memory, format, self.clock.now())?;
        debug!("Read {} backup records", records.len());
        Ok(records)
    }

    /// Reference for dating truncated times
    pub(crate) fn reference_time(&self) -> NaiveDateTime {
        self.clock.now() + TimeDelta::hours(REFERENCE_MARGIN_HOURS)
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    pub(crate) fn pending(&self) -> Result<usize> {
        self.link.pending()
    }

    pub(crate) async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.link.send_raw(data).await
    }

    /// Read one frame and let the interceptor see it
    pub(crate) async fn read_frame(&mut self, first_byte: Duration) -> Result<Frame> {
        let frame = self.link.read_frame(first_byte).await?;
        self.session.observe_station_code(frame.station_code);

        match self.interceptor.inspect(&frame)? {
            Disposition::Pass => Ok(frame),
            Disposition::CardChanged => Err(Error::CardChanged),
        }
    }

    pub(crate) async fn exchange(&mut self, request: &Request) -> Result<Frame> {
        self.link.send(request).await?;
        self.read_frame(self.timeout).await
    }
}
