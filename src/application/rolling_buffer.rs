// Rolling buffer - Fixed-duration window per axis
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub appended: usize,
    pub evicted: usize,
}

/// Fixed-capacity series at the display rate.
///
/// `start_time` advances by exactly one tick interval per `update` or
/// `advance`, no matter how many samples were appended. The rendered time axis follows wall-clock
/// ticks, so small resampling rounding differences never drift it.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    sample_rate: f64,
    capacity: usize,
    samples: Vec<f64>,
    start_time: DateTime<Utc>,
    tick: Duration,
}

impl RollingBuffer {
    /// Empty buffer that grows toward capacity during warm-up.
    pub fn new(sample_rate: f64, window_seconds: u32, tick: Duration, start_time: DateTime<Utc>) -> Self {
        let capacity = Self::capacity_for(sample_rate, window_seconds);
        Self {
            sample_rate,
            capacity,
            samples: Vec::with_capacity(capacity),
            start_time,
            tick,
        }
    }

    /// Buffer already at capacity, filled with zeros.
    pub fn zero_filled(
        sample_rate: f64,
        window_seconds: u32,
        tick: Duration,
        start_time: DateTime<Utc>,
    ) -> Self {
        let mut buffer = Self::new(sample_rate, window_seconds, tick, start_time);
        buffer.samples.resize(buffer.capacity, 0.0);
        buffer
    }

    pub fn capacity_for(sample_rate: f64, window_seconds: u32) -> usize {
        ((sample_rate * window_seconds as f64).round() as usize).max(1)
    }

    pub fn update(&mut self, new_samples: &[f64]) -> UpdateOutcome {
        let dropped = new_samples.len().saturating_sub(self.capacity);
        let incoming = &new_samples[dropped..];
        let n = incoming.len();
        let len = self.samples.len();

        let evicted = if len == self.capacity {
            // Full: rotate left by n and overwrite the freed tail.
            self.samples.copy_within(n.., 0);
            self.samples[len - n..].copy_from_slice(incoming);
            n
        } else if len + n >= self.capacity {
            let evict = len + n - self.capacity;
            self.samples.drain(..evict);
            self.samples.extend_from_slice(incoming);
            evict
        } else {
            self.samples.extend_from_slice(incoming);
            0
        };

        self.advance();

        UpdateOutcome {
            appended: n,
            evicted: evicted + dropped,
        }
    }

    /// Move `start_time` forward one tick without appending.
    pub fn advance(&mut self) {
        self.start_time += self.tick;
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Offset in seconds of every sample from `start_time`.
    pub fn time_axis(&self) -> Vec<f64> {
        (0..self.samples.len())
            .map(|i| i as f64 / self.sample_rate)
            .collect()
    }
}
