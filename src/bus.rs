//! Message-bus publisher.
//!
//! Publishes each updated shadow document to the `intelli.<serial>` subject.
//! No `nats`/`async-nats` crate is present anywhere in the reference corpus,
//! so `NatsPublisher` speaks the NATS core publish protocol directly over a
//! plain `tokio::net::TcpStream` — just the `CONNECT`/`PUB` subset, no
//! subscriptions, no JetStream. See DESIGN.md.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::GatewayError;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError>;
}

/// A minimal NATS core client: connects, sends a `CONNECT` handshake, and
/// writes `PUB` frames. Reconnects lazily on the next publish if the
/// connection has dropped.
pub struct NatsPublisher {
    addr: String,
    conn: Mutex<Option<TcpStream>>,
}

impl NatsPublisher {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), conn: Mutex::new(None) }
    }

    /// Establishes and caches the initial connection. Callers that need a
    /// fatal-on-startup failure (rather than a lazy reconnect on first
    /// publish) should call this once before serving traffic.
    pub async fn connect_and_verify(&self) -> Result<(), GatewayError> {
        let stream = self.connect().await?;
        *self.conn.lock().await = Some(stream);
        Ok(())
    }

    async fn connect(&self) -> Result<TcpStream, GatewayError> {
        let mut stream = TcpStream::connect(&self.addr).await?;

        // Drain and discard the server's INFO line before sending CONNECT.
        let mut reader = BufReader::new(&mut stream);
        let mut info_line = String::new();
        reader.read_line(&mut info_line).await?;
        debug!(addr = %self.addr, info = %info_line.trim(), "nats server greeted");

        let connect = br#"CONNECT {"verbose":false,"pedantic":false,"lang":"rust","version":"0.1.0"}"#;
        stream.write_all(connect).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(stream)
    }

    async fn write_pub(stream: &mut TcpStream, subject: &str, payload: &[u8]) -> Result<(), GatewayError> {
        stream.write_all(format!("PUB {subject} {}\r\n", payload.len()).as_bytes()).await?;
        stream.write_all(payload).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let stream = guard.as_mut().expect("just populated above");

        if let Err(e) = Self::write_pub(stream, subject, payload).await {
            // Drop the connection so the next publish reconnects.
            *guard = None;
            return Err(e);
        }

        info!(subject, bytes = payload.len(), "published shadow");
        Ok(())
    }
}

/// A publisher that only logs — used when `--nats` is omitted or for tests.
pub struct NullPublisher;

#[async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), GatewayError> {
        debug!(subject, bytes = payload.len(), "discarding publish (no bus configured)");
        Ok(())
    }
}
