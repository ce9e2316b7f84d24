// Reconnecting TCP session - Self-healing feed from the instrument
use crate::application::channel_router::ChannelRouter;
use crate::domain::error::TransportError;
use crate::infrastructure::frame_decoder::FrameDecoder;
use async_trait::async_trait;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;

/// Opens a fresh byte stream to the instrument.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + Unpin + Send;

    async fn connect(&self) -> Result<Self::Stream, TransportError>;

    fn address(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: String) -> Self {
        Self { address }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|source| TransportError::Connect {
                addr: self.address.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY on {}: {}", self.address, e);
        }
        Ok(stream)
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub connects: AtomicU64,
    pub frames: AtomicU64,
    pub discarded: AtomicU64,
    pub transport_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub reconnect_delay: Duration,
    pub read_timeout: Duration,
    pub read_chunk_size: usize,
}

/// Reads frames forever, routing decoded records into the channel router.
///
/// Retries are unbounded with a fixed delay. Bytes buffered when a connection
/// drops are discarded with it.
pub struct ReconnectingSession<C: Connector> {
    connector: C,
    router: Arc<ChannelRouter>,
    settings: SessionSettings,
    stats: Arc<SessionStats>,
}

impl<C: Connector> ReconnectingSession<C> {
    pub fn new(connector: C, router: Arc<ChannelRouter>, settings: SessionSettings) -> Self {
        Self {
            connector,
            router,
            settings,
            stats: Arc::new(SessionStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }

    /// Never returns.
    pub async fn run(&self) {
        loop {
            let Err(e) = self.run_connection().await;
            self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
            match e {
                TransportError::Closed { .. } => tracing::info!("{}, reconnecting", e),
                _ => tracing::warn!("{}, reconnecting", e),
            }
            tokio::time::sleep(self.settings.reconnect_delay).await;
        }
    }

    async fn run_connection(&self) -> Result<Infallible, TransportError> {
        let addr = self.connector.address().to_string();
        let mut stream = self.connector.connect().await?;
        self.stats.connects.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Connected to {}", addr);

        let mut decoder = FrameDecoder::new();
        let mut chunk = vec![0u8; self.settings.read_chunk_size.max(1)];

        loop {
            let read = tokio::time::timeout(self.settings.read_timeout, stream.read(&mut chunk)).await;
            let n = match read {
                Err(_) => {
                    return Err(TransportError::ReadTimeout {
                        addr,
                        timeout_ms: self.settings.read_timeout.as_millis() as u64,
                    });
                }
                Ok(Err(source)) => return Err(TransportError::Read { addr, source }),
                Ok(Ok(0)) => return Err(TransportError::Closed { addr }),
                Ok(Ok(n)) => n,
            };

            decoder.extend(&chunk[..n]);
            self.dispatch(&mut decoder);
        }
    }

    fn dispatch(&self, decoder: &mut FrameDecoder) {
        while let Some(result) = decoder.next_frame() {
            match result {
                Ok(record) => {
                    self.stats.frames.fetch_add(1, Ordering::Relaxed);
                    let channel = record.channel().to_string();
                    match self.router.route(record) {
                        Some(axis) => tracing::debug!("Routed {} to axis {}", channel, axis),
                        None => tracing::debug!("Ignoring frame for unrouted channel {}", channel),
                    }
                }
                Err(e) => {
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Discarding frame: {}", e);
                }
            }
        }
    }
}
