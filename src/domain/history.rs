// History (backfill) domain models

/// One record of a history response: a timestamped run of samples for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp_ms: i64,
    pub sample_rate: f64,
    pub values: Vec<i32>,
}

impl HistoryRecord {
    pub fn new(timestamp_ms: i64, sample_rate: f64, values: Vec<i32>) -> Self {
        Self {
            timestamp_ms,
            sample_rate,
            values,
        }
    }

    /// Milliseconds between two consecutive samples at the declared rate.
    pub fn nominal_interval_ms(&self) -> f64 {
        1000.0 / self.sample_rate
    }

    /// Timestamp just past the last real sample of this record.
    pub fn end_ms(&self) -> f64 {
        self.timestamp_ms as f64 + self.values.len() as f64 * self.nominal_interval_ms()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: i64 = self.values.iter().map(|&v| v as i64).sum();
        Some(sum as f64 / self.values.len() as f64)
    }
}

/// One page of a history fetch covering `[start_ms, end_ms)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryChunk {
    pub start_ms: i64,
    pub end_ms: i64,
    pub records: Vec<HistoryRecord>,
}

/// Gap-filled, contiguous series produced by a backfill.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfilledSeries {
    pub start_ms: i64,
    pub sample_rate: f64,
    pub samples: Vec<f64>,
    pub filled: usize,
}
