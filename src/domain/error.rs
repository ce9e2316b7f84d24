// Error kinds of the ingestion and backfill paths
use crate::domain::telemetry::RecordInvariant;
use std::io;
use thiserror::Error;

/// A frame that was discarded by the decoder. The stream always continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("checksum mismatch: frame claims {claimed:02X}, payload computes {computed:02X}")]
    ChecksumMismatch { claimed: u8, computed: u8 },
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("malformed frame: {0}")]
    InvalidRecord(#[from] RecordInvariant),
}

impl FrameError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }

    /// Field count, type or value violation, as opposed to a bad checksum.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedFrame(_) | Self::InvalidRecord(_))
    }
}

/// Transport failure. Recovered by closing the socket and reconnecting.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("read from {addr} failed: {source}")]
    Read {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {addr} closed by peer")]
    Closed { addr: String },
    #[error("no data from {addr} within {timeout_ms} ms")]
    ReadTimeout { addr: String, timeout_ms: u64 },
}

/// Failure of a history request. Only `Timeout` is a hard failure for callers.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request for [{start_ms}, {end_ms}) timed out")]
    Timeout { start_ms: i64, end_ms: i64 },
    #[error("history request failed: {0}")]
    Request(String),
    #[error("history endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("history response could not be decoded: {0}")]
    Decode(String),
}

impl HistoryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
