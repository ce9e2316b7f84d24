// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Sensing direction of a three-component instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Axis {
    East,
    North,
    Vertical,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::East, Axis::North, Axis::Vertical];

    /// Map the component character of a channel code (`EHZ` -> `Z`) to an axis.
    pub fn from_component(component: char) -> Option<Self> {
        match component.to_ascii_uppercase() {
            'E' => Some(Axis::East),
            'N' => Some(Axis::North),
            'Z' => Some(Axis::Vertical),
            _ => None,
        }
    }

    pub fn component(self) -> char {
        match self {
            Axis::East => 'E',
            Axis::North => 'N',
            Axis::Vertical => 'Z',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.component())
    }
}

/// One decoded burst of samples for a single channel.
///
/// Constructed only through [`SampleRecord::new`], which enforces a positive
/// sample rate, a channel code of at least three characters and a non-empty
/// sample list. Records are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    network: String,
    station: String,
    location: String,
    channel: String,
    sample_rate: f64,
    start_time: DateTime<Utc>,
    samples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordInvariant {
    #[error("record has no samples")]
    EmptySamples,
    #[error("sample rate must be positive")]
    NonPositiveRate,
    #[error("channel code must have at least 3 characters")]
    ShortChannel,
}

impl SampleRecord {
    pub fn new(
        network: String,
        station: String,
        location: String,
        channel: String,
        sample_rate: f64,
        start_time: DateTime<Utc>,
        samples: Vec<f64>,
    ) -> Result<Self, RecordInvariant> {
        if samples.is_empty() {
            return Err(RecordInvariant::EmptySamples);
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(RecordInvariant::NonPositiveRate);
        }
        if channel.chars().count() < 3 {
            return Err(RecordInvariant::ShortChannel);
        }

        Ok(Self {
            network,
            station,
            location,
            channel,
            sample_rate,
            start_time,
            samples,
        })
    }

    /// Same metadata, different rate and samples. Used by the resampler.
    pub fn with_samples(&self, sample_rate: f64, samples: Vec<f64>) -> Result<Self, RecordInvariant> {
        Self::new(
            self.network.clone(),
            self.station.clone(),
            self.location.clone(),
            self.channel.clone(),
            sample_rate,
            self.start_time,
            samples,
        )
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Axis identified by the third character of the channel code.
    pub fn axis(&self) -> Option<Axis> {
        self.channel.chars().nth(2).and_then(Axis::from_component)
    }
}
