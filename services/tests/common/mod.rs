#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use services::device::{
    CMD_CONNECT, CMD_DEVICE_INFO, CMD_EXIT, CMD_READ_ATTLOG, FRAME_MAGIC, REPLY_ACK_ERROR,
    REPLY_ACK_OK,
};

pub struct FakeDevice {
    pub addr: SocketAddr,
    pub accepts: Arc<AtomicUsize>,
}

/// Spawns an in-test terminal speaking the device protocol. `logs` is the
/// full retained buffer as `(machine_user_id, unix_secs)` pairs;
/// `attlog_delay` stalls the attlog reply so tests can observe in-flight
/// state.
pub async fn spawn_fake_device(logs: Vec<(u32, i64)>, attlog_delay: Duration) -> FakeDevice {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));

    let accepts_counter = accepts.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            accepts_counter.fetch_add(1, Ordering::SeqCst);
            let logs = logs.clone();
            tokio::spawn(async move {
                let _ = serve_connection(&mut stream, &logs, attlog_delay).await;
            });
        }
    });

    FakeDevice { addr, accepts }
}

/// Accepts connections and immediately drops them, counting each accept.
/// From the client's side every conversation dies at the first read.
pub async fn spawn_slamming_device() -> FakeDevice {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));

    let accepts_counter = accepts.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            accepts_counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    FakeDevice { addr, accepts }
}

/// An address that nothing is listening on.
pub async fn closed_port_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn serve_connection(
    stream: &mut TcpStream,
    logs: &[(u32, i64)],
    attlog_delay: Duration,
) -> std::io::Result<()> {
    loop {
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await?;
        let command = u16::from_le_bytes([header[2], header[3]]);
        let payload_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let mut payload = vec![0u8; payload_len as usize];
        stream.read_exact(&mut payload).await?;

        match command {
            CMD_CONNECT => reply(stream, REPLY_ACK_OK, &[]).await?,
            CMD_DEVICE_INFO => {
                reply(stream, REPLY_ACK_OK, b"SN-0451\0fw-1.2.3\0TestPlat\0Fake Gate\0").await?
            }
            CMD_READ_ATTLOG => {
                tokio::time::sleep(attlog_delay).await;
                reply(stream, REPLY_ACK_OK, &attlog_payload(logs)).await?;
            }
            CMD_EXIT => return Ok(()),
            _ => reply(stream, REPLY_ACK_ERROR, &[]).await?,
        }
    }
}

fn attlog_payload(logs: &[(u32, i64)]) -> Vec<u8> {
    let mut payload = (logs.len() as u32).to_le_bytes().to_vec();
    for (user_id, secs) in logs {
        payload.extend_from_slice(&user_id.to_le_bytes());
        payload.extend_from_slice(&secs.to_le_bytes());
    }
    payload
}

async fn reply(stream: &mut TcpStream, command: u16, payload: &[u8]) -> std::io::Result<()> {
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await
}
