//! Binary protocol client for physical fingerprint/face terminals.
//!
//! The device speaks a little-endian framed request/response protocol over
//! TCP: an 8-byte header (`magic: u16`, `command: u16`, `payload_len: u32`)
//! followed by the payload. The device has no concept of "since": ReadAttlog
//! always returns its full retained buffer and the caller filters.

use std::io;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use db::models::machine_config::Model as MachineConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{DeviceError, DeviceErrorKind};
use crate::reconcile::RawAttendanceEvent;

pub const FRAME_MAGIC: u16 = 0x5AA5;

pub const CMD_CONNECT: u16 = 1000;
pub const CMD_EXIT: u16 = 1001;
pub const CMD_DEVICE_INFO: u16 = 11;
pub const CMD_READ_ATTLOG: u16 = 13;

pub const REPLY_ACK_OK: u16 = 2000;
pub const REPLY_ACK_ERROR: u16 = 2001;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONNECT_ATTEMPTS: u32 = 3;
/// Terminals retain at most a few hundred thousand punches; anything larger
/// than this is a corrupt frame, not a log.
const MAX_PAYLOAD_LEN: u32 = 8 * 1024 * 1024;

const ATTLOG_ENTRY_LEN: usize = 12;

/// Identity fields reported by a terminal during a connection probe.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub firmware_version: String,
    pub platform: String,
    pub device_name: String,
}

/// Client for one conversation at a time with a terminal.
///
/// Timeouts are fixed per the device contract; the retry base delay is
/// injectable so tests do not sit through real backoff.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    connect_timeout: Duration,
    read_timeout: Duration,
    retry_base_delay: Duration,
}

impl Default for DeviceClient {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl DeviceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Read-only probe: connects, asks the device for its identity, and
    /// disconnects. Not retried — a probe is supposed to tell the operator
    /// the truth about reachability right now.
    pub async fn test_connection(
        &self,
        machine: &MachineConfig,
    ) -> Result<DeviceInfo, DeviceError> {
        let mut stream = self.open(machine).await?;
        self.handshake(&mut stream).await?;
        let info = self.device_info(&mut stream).await?;
        self.goodbye(&mut stream).await;
        Ok(info)
    }

    /// Fetches the device's full retained attendance log.
    ///
    /// Terminals on a LAN can be transiently unreachable (power cycling,
    /// Wi-Fi hiccups), so the whole conversation is attempted up to three
    /// times with exponential backoff (1s, 2s) between attempts. The last
    /// underlying error propagates when every attempt fails.
    pub async fn fetch_attendance_logs(
        &self,
        machine: &MachineConfig,
    ) -> Result<Vec<RawAttendanceEvent>, DeviceError> {
        let mut last_err: Option<DeviceError> = None;

        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            if attempt > 1 {
                let backoff = self.retry_base_delay * 2u32.pow(attempt - 2);
                debug!(
                    machine = %machine.ip_address,
                    attempt,
                    ?backoff,
                    "retrying device fetch after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.fetch_once(machine).await {
                Ok(events) => return Ok(events),
                Err(err) => {
                    warn!(
                        machine = %machine.ip_address,
                        attempt,
                        kind = %err.kind,
                        "device fetch attempt failed: {}",
                        err.message
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            DeviceError::new(DeviceErrorKind::Unknown, "device fetch failed with no attempts")
        }))
    }

    async fn fetch_once(
        &self,
        machine: &MachineConfig,
    ) -> Result<Vec<RawAttendanceEvent>, DeviceError> {
        let mut stream = self.open(machine).await?;
        self.handshake(&mut stream).await?;
        let events = self.read_attlog(&mut stream).await?;
        self.goodbye(&mut stream).await;
        Ok(events)
    }

    async fn open(&self, machine: &MachineConfig) -> Result<TcpStream, DeviceError> {
        let addr = format!("{}:{}", machine.ip_address, machine.port);
        match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(DeviceError::from_io(&err, &format!("connect {addr}"))),
            Err(_) => Err(DeviceError::new(
                DeviceErrorKind::Timeout,
                format!("connect {addr}: timed out after {:?}", self.connect_timeout),
            )),
        }
    }

    async fn handshake(&self, stream: &mut TcpStream) -> Result<(), DeviceError> {
        self.exchange(stream, CMD_CONNECT, &[]).await?;
        Ok(())
    }

    async fn device_info(&self, stream: &mut TcpStream) -> Result<DeviceInfo, DeviceError> {
        let payload = self.exchange(stream, CMD_DEVICE_INFO, &[]).await?;
        parse_device_info(&payload)
    }

    async fn read_attlog(
        &self,
        stream: &mut TcpStream,
    ) -> Result<Vec<RawAttendanceEvent>, DeviceError> {
        let payload = self.exchange(stream, CMD_READ_ATTLOG, &[]).await?;
        parse_attlog(&payload)
    }

    /// Best-effort polite disconnect; the useful data is already in hand.
    async fn goodbye(&self, stream: &mut TcpStream) {
        let _ = self.send_frame(stream, CMD_EXIT, &[]).await;
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        command: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, DeviceError> {
        self.send_frame(stream, command, payload)
            .await
            .map_err(|err| DeviceError::from_io(&err, &format!("send command {command}")))?;

        let (reply, body) = self.read_frame(stream).await?;
        match reply {
            REPLY_ACK_OK => Ok(body),
            REPLY_ACK_ERROR => Err(DeviceError::protocol(format!(
                "device rejected command {command}"
            ))),
            other => Err(DeviceError::protocol(format!(
                "unexpected reply {other} to command {command}"
            ))),
        }
    }

    async fn send_frame(
        &self,
        stream: &mut TcpStream,
        command: u16,
        payload: &[u8],
    ) -> io::Result<()> {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
        frame.extend_from_slice(&command.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        stream.write_all(&frame).await
    }

    async fn read_frame(&self, stream: &mut TcpStream) -> Result<(u16, Vec<u8>), DeviceError> {
        let mut header = [0u8; 8];
        self.read_exact_timed(stream, &mut header).await?;

        let magic = u16::from_le_bytes([header[0], header[1]]);
        let command = u16::from_le_bytes([header[2], header[3]]);
        let payload_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if magic != FRAME_MAGIC {
            return Err(DeviceError::protocol(format!(
                "bad frame magic {magic:#06x}"
            )));
        }
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(DeviceError::protocol(format!(
                "frame payload of {payload_len} bytes exceeds limit"
            )));
        }

        let mut payload = vec![0u8; payload_len as usize];
        self.read_exact_timed(stream, &mut payload).await?;
        Ok((command, payload))
    }

    async fn read_exact_timed(
        &self,
        stream: &mut TcpStream,
        buf: &mut [u8],
    ) -> Result<(), DeviceError> {
        match timeout(self.read_timeout, stream.read_exact(buf)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(DeviceError::from_io(&err, "read from device")),
            Err(_) => Err(DeviceError::new(
                DeviceErrorKind::Timeout,
                format!("device went silent for {:?}", self.read_timeout),
            )),
        }
    }
}

/// DeviceInfo payload: four NUL-terminated strings in fixed order.
fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo, DeviceError> {
    let mut fields = payload
        .split(|&b| b == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned());

    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| DeviceError::protocol(format!("device info missing {name}")))
    };

    Ok(DeviceInfo {
        serial_number: next("serial number")?,
        firmware_version: next("firmware version")?,
        platform: next("platform")?,
        device_name: next("device name")?,
    })
}

/// Attlog payload: `count: u32` then `count` entries of
/// `machine_user_id: u32, unix_secs: i64`.
fn parse_attlog(payload: &[u8]) -> Result<Vec<RawAttendanceEvent>, DeviceError> {
    if payload.len() < 4 {
        return Err(DeviceError::protocol("attlog payload shorter than header"));
    }
    let count = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let body = &payload[4..];
    if body.len() != count * ATTLOG_ENTRY_LEN {
        return Err(DeviceError::protocol(format!(
            "attlog length mismatch: {} entries announced, {} bytes of body",
            count,
            body.len()
        )));
    }

    let mut events = Vec::with_capacity(count);
    for entry in body.chunks_exact(ATTLOG_ENTRY_LEN) {
        let user_id = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
        let secs = i64::from_le_bytes([
            entry[4], entry[5], entry[6], entry[7], entry[8], entry[9], entry[10], entry[11],
        ]);
        match Utc.timestamp_opt(secs, 0).single() {
            Some(timestamp) => events.push(RawAttendanceEvent {
                machine_user_id: i64::from(user_id),
                timestamp,
            }),
            None => {
                warn!(user_id, secs, "skipping attlog entry with invalid timestamp");
            }
        }
    }
    Ok(events)
}
