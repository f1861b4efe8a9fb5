// STOMP streaming transport - persistent broker subscription per collar
use crate::application::telemetry_source::{SourceEvent, TelemetryFeed, TelemetrySource};
use crate::domain::collar::RawCollarStatus;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Backoff before re-dialing a dropped broker connection.
const RECONNECT_DELAY: Duration = Duration::from_millis(200);
/// Outgoing heartbeat cadence negotiated in the CONNECT frame.
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20_000);

#[derive(Debug, Error)]
pub enum StompError {
    #[error("broker i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("broker error: {0}")]
    Protocol(String),
}

/// Minimal STOMP 1.2 frame. Bodies on this topic are JSON, which never
/// contains NUL, so frames are delimited by the terminating NUL alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    fn new(command: &str, headers: Vec<(String, String)>) -> Self {
        Self {
            command: command.to_string(),
            headers,
            body: Vec::new(),
        }
    }

    pub fn connect(host: &str) -> Self {
        Self::new(
            "CONNECT",
            vec![
                ("accept-version".to_string(), "1.2".to_string()),
                ("host".to_string(), host.to_string()),
                ("heart-beat".to_string(), "20000,0".to_string()),
            ],
        )
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(
            "SUBSCRIBE",
            vec![
                ("id".to_string(), id.to_string()),
                ("destination".to_string(), destination.to_string()),
                ("ack".to_string(), "auto".to_string()),
            ],
        )
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (key, value) in &self.headers {
            out.extend_from_slice(key.as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Parse one frame, NUL terminator already stripped.
    pub fn parse(bytes: &[u8]) -> Result<Self, StompError> {
        let split = bytes
            .windows(2)
            .position(|pair| pair == b"\n\n")
            .ok_or_else(|| StompError::MalformedFrame("missing blank line".to_string()))?;

        let head = std::str::from_utf8(&bytes[..split])
            .map_err(|_| StompError::MalformedFrame("non-utf8 frame head".to_string()))?;
        let body = bytes[split + 2..].to_vec();

        let mut lines = head.lines();
        let command = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| StompError::MalformedFrame("empty command".to_string()))?
            .trim_end_matches('\r')
            .to_string();

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedFrame(format!("bad header: {line}")))?;
            headers.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            command,
            headers,
            body,
        })
    }
}

pub struct StompSource {
    broker_addr: String,
}

impl StompSource {
    pub fn new(broker_addr: String) -> Self {
        Self { broker_addr }
    }
}

#[async_trait]
impl TelemetrySource for StompSource {
    async fn subscribe(&self, collar_id: &str) -> TelemetryFeed {
        let (tx, rx) = mpsc::channel(32);
        let addr = self.broker_addr.clone();
        let destination = format!("/topic/collar/{collar_id}");

        let task = tokio::spawn(run_stream(addr, destination, tx));
        TelemetryFeed::new(rx, vec![task])
    }
}

/// Dial, stream, and on any failure emit `Disconnected` and re-dial
/// after the fixed backoff. Only the session going away ends the loop.
async fn run_stream(addr: String, destination: String, tx: mpsc::Sender<SourceEvent>) {
    loop {
        match connect_and_stream(&addr, &destination, &tx).await {
            Ok(()) => return,
            Err(err) => {
                tracing::warn!(error = %err, %addr, "stomp connection lost");
            }
        }
        if tx.send(SourceEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Ok(()) means the session dropped its receiver; Err means the
/// connection itself failed and a reconnect is due.
async fn connect_and_stream(
    addr: &str,
    destination: &str,
    tx: &mpsc::Sender<SourceEvent>,
) -> Result<(), StompError> {
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let host = addr.split(':').next().unwrap_or(addr);
    write_half.write_all(&Frame::connect(host).encode()).await?;

    let frame = read_frame(&mut reader).await?;
    match frame.command.as_str() {
        "CONNECTED" => {}
        "ERROR" => {
            return Err(StompError::Protocol(
                frame.header("message").unwrap_or("unknown").to_string(),
            ))
        }
        other => {
            return Err(StompError::MalformedFrame(format!(
                "expected CONNECTED, got {other}"
            )))
        }
    }

    if tx.send(SourceEvent::Connected).await.is_err() {
        return Ok(());
    }

    write_half
        .write_all(&Frame::subscribe("0", destination).encode())
        .await?;

    // Outgoing heartbeats run on their own task so a long read never
    // starves them.
    let heartbeat = tokio::spawn(send_heartbeats(write_half));
    let result = read_loop(&mut reader, tx).await;
    heartbeat.abort();
    result
}

async fn send_heartbeats(mut write_half: OwnedWriteHalf) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if write_half.write_all(b"\n").await.is_err() {
            return;
        }
    }
}

async fn read_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    tx: &mpsc::Sender<SourceEvent>,
) -> Result<(), StompError> {
    loop {
        let frame = read_frame(reader).await?;
        match frame.command.as_str() {
            "MESSAGE" => {
                // A bad payload is non-fatal; the subscription stays up.
                let event = match serde_json::from_slice::<RawCollarStatus>(&frame.body) {
                    Ok(raw) => SourceEvent::Status(raw),
                    Err(err) => {
                        tracing::warn!(error = %err, "unparseable collar message");
                        SourceEvent::ParseError(err.to_string())
                    }
                };
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
            "ERROR" => {
                return Err(StompError::Protocol(
                    frame.header("message").unwrap_or("unknown").to_string(),
                ))
            }
            other => tracing::debug!(command = other, "ignoring broker frame"),
        }
    }
}

/// Read the next frame, skipping bare-newline heartbeats.
async fn read_frame(reader: &mut BufReader<OwnedReadHalf>) -> Result<Frame, StompError> {
    loop {
        let mut buf = Vec::new();
        let n = reader.read_until(0, &mut buf).await?;
        if n == 0 {
            return Err(StompError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "broker closed the connection",
            )));
        }
        if buf.last() != Some(&0) {
            return Err(StompError::MalformedFrame(
                "connection closed mid-frame".to_string(),
            ));
        }
        buf.pop();

        let start = buf
            .iter()
            .position(|&b| b != b'\n' && b != b'\r')
            .unwrap_or(buf.len());
        if start == buf.len() {
            // Heartbeat only, keep reading.
            continue;
        }
        return Frame::parse(&buf[start..]);
    }
}
