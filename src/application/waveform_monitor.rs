// Waveform monitor - Periodic tick: router -> resampler -> rolling buffers
use crate::application::channel_router::ChannelRouter;
use crate::application::resampler::{resample, ResampleMethod};
use crate::application::rolling_buffer::{RollingBuffer, UpdateOutcome};
use crate::domain::telemetry::Axis;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct DisplaySettings {
    pub sample_rate: f64,
    pub window_seconds: u32,
    pub tick: Duration,
    pub prefill_zeros: bool,
}

/// What the renderer needs for one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformSnapshot {
    pub axis: Axis,
    pub channel: String,
    pub sample_rate: f64,
    pub start_time: DateTime<Utc>,
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisUpdate {
    pub axis: Axis,
    pub outcome: UpdateOutcome,
    pub method: ResampleMethod,
}

#[derive(Debug)]
struct AxisTrack {
    channel: String,
    last_version: u64,
    buffer: RollingBuffer,
}

pub struct WaveformMonitor {
    router: Arc<ChannelRouter>,
    settings: DisplaySettings,
    tracks: BTreeMap<Axis, AxisTrack>,
}

impl WaveformMonitor {
    pub fn new(router: Arc<ChannelRouter>, settings: DisplaySettings) -> Self {
        Self {
            router,
            settings,
            tracks: BTreeMap::new(),
        }
    }

    /// One refresh cycle. Each axis holding a record not yet consumed is
    /// resampled to the display rate and pushed into its buffer. Axes whose
    /// record was already consumed only advance their buffer's clock.
    pub fn tick(&mut self) -> Vec<AxisUpdate> {
        let mut updates = Vec::new();

        for axis in self.router.axes() {
            let Some(slot) = self.router.get(axis) else {
                tracing::debug!("No record yet for axis {}", axis);
                continue;
            };

            if let Some(track) = self
                .tracks
                .get_mut(&axis)
                .filter(|track| track.last_version == slot.version)
            {
                // Nothing to append, but the time axis still follows the tick.
                track.buffer.advance();
                tracing::debug!("Axis {} has no new record since last tick", axis);
                continue;
            }

            let resampled = resample(&slot.record, self.settings.sample_rate);
            if resampled.method == ResampleMethod::Held {
                tracing::warn!(
                    "Record for {} too short to interpolate ({} samples), holding value",
                    slot.record.channel(),
                    slot.record.samples().len()
                );
            }

            let settings = self.settings;
            let track = self.tracks.entry(axis).or_insert_with(|| {
                let start = slot.record.start_time();
                let buffer = if settings.prefill_zeros {
                    RollingBuffer::zero_filled(
                        settings.sample_rate,
                        settings.window_seconds,
                        settings.tick,
                        start - Duration::seconds(settings.window_seconds as i64),
                    )
                } else {
                    RollingBuffer::new(settings.sample_rate, settings.window_seconds, settings.tick, start)
                };
                AxisTrack {
                    channel: slot.record.channel().to_string(),
                    last_version: 0,
                    buffer,
                }
            });

            let outcome = track.buffer.update(resampled.record.samples());
            track.last_version = slot.version;
            track.channel = slot.record.channel().to_string();

            tracing::debug!(
                "Axis {}: appended {}, evicted {}, buffer {}/{}",
                axis,
                outcome.appended,
                outcome.evicted,
                track.buffer.len(),
                track.buffer.capacity()
            );

            updates.push(AxisUpdate {
                axis,
                outcome,
                method: resampled.method,
            });
        }

        updates
    }

    pub fn snapshots(&self) -> Vec<WaveformSnapshot> {
        self.tracks
            .iter()
            .map(|(&axis, track)| WaveformSnapshot {
                axis,
                channel: track.channel.clone(),
                sample_rate: track.buffer.sample_rate(),
                start_time: track.buffer.start_time(),
                samples: track.buffer.samples().to_vec(),
            })
            .collect()
    }

    pub fn buffer(&self, axis: Axis) -> Option<&RollingBuffer> {
        self.tracks.get(&axis).map(|track| &track.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::frame_decoder::{encode_frame, test_record, FrameDecoder};

    fn settings(sample_rate: f64) -> DisplaySettings {
        DisplaySettings {
            sample_rate,
            window_seconds: 120,
            tick: Duration::seconds(1),
            prefill_zeros: false,
        }
    }

    fn feed(router: &ChannelRouter, wire: &str) {
        let mut decoder = FrameDecoder::new();
        decoder.extend(wire.as_bytes());
        for record in decoder.drain().into_iter().flatten() {
            router.route(record);
        }
    }

    fn three_axis_wire(rate: u32, n: i32) -> (String, Vec<crate::domain::telemetry::SampleRecord>) {
        let records: Vec<_> = ["EHE", "EHN", "EHZ"]
            .iter()
            .enumerate()
            .map(|(i, channel)| test_record(channel, rate, (0..n).map(|v| v * (i as i32 + 1)).collect(), 5_000))
            .collect();
        let wire = records
            .iter()
            .enumerate()
            .map(|(seq, r)| encode_frame(seq as u64, r))
            .collect();
        (wire, records)
    }

    #[test]
    fn test_three_axes_end_to_end() {
        let router = Arc::new(ChannelRouter::default());
        let (wire, records) = three_axis_wire(100, 50);
        feed(&router, &wire);

        for (axis, record) in Axis::ALL.iter().zip(&records) {
            assert_eq!(*router.get(*axis).unwrap().record, *record);
        }

        let mut monitor = WaveformMonitor::new(router, settings(100.0));
        let updates = monitor.tick();
        assert_eq!(updates.len(), 3);
        for update in &updates {
            assert_eq!(update.outcome.appended, 50);
            assert_eq!(update.method, ResampleMethod::Passthrough);
        }

        let snapshots = monitor.snapshots();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[2].channel, "EHZ");
        assert_eq!(snapshots[2].samples.len(), 50);
        assert_eq!(snapshots[2].samples[10], 30.0);
    }

    #[test]
    fn test_tick_resamples_to_display_rate() {
        let router = Arc::new(ChannelRouter::default());
        let (wire, _) = three_axis_wire(100, 50);
        feed(&router, &wire);

        let mut monitor = WaveformMonitor::new(router, settings(50.0));
        let updates = monitor.tick();
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.outcome.appended == 25 && u.method == ResampleMethod::Linear));
        assert_eq!(monitor.buffer(Axis::East).unwrap().sample_rate(), 50.0);
    }

    #[test]
    fn test_corrupt_frame_keeps_previous_value() {
        let router = Arc::new(ChannelRouter::default());
        let good = test_record("EHZ", 100, vec![1, 2, 3], 0);
        feed(&router, &encode_frame(1, &good));

        let bad = test_record("EHZ", 100, vec![9, 9, 9], 1_000);
        let mut wire = encode_frame(2, &bad);
        // Replace the checksum with a different value.
        let marker = wire.rfind('*').unwrap();
        let claimed = u8::from_str_radix(&wire[marker + 1..marker + 3], 16).unwrap();
        wire.replace_range(marker + 1..marker + 3, &format!("{:02X}", claimed ^ 0x5A));
        feed(&router, &wire);

        let value = router.get(Axis::Vertical).unwrap();
        assert_eq!(value.version, 1);
        assert_eq!(*value.record, good);
    }

    #[test]
    fn test_stale_record_is_not_appended_twice() {
        let router = Arc::new(ChannelRouter::default());
        router.route(test_record("EHZ", 100, vec![1; 100], 0));

        let mut monitor = WaveformMonitor::new(router.clone(), settings(100.0));
        assert_eq!(monitor.tick().len(), 1);
        assert!(monitor.tick().is_empty());
        assert_eq!(monitor.buffer(Axis::Vertical).unwrap().len(), 100);

        router.route(test_record("EHZ", 100, vec![2; 100], 1_000));
        assert_eq!(monitor.tick().len(), 1);
        assert_eq!(monitor.buffer(Axis::Vertical).unwrap().len(), 200);
        assert_eq!(
            monitor.buffer(Axis::Vertical).unwrap().start_time(),
            DateTime::from_timestamp(3, 0).unwrap()
        );
    }

    #[test]
    fn test_clock_follows_ticks_without_new_records() {
        let router = Arc::new(ChannelRouter::default());
        router.route(test_record("EHZ", 100, vec![1; 100], 0));

        let mut monitor = WaveformMonitor::new(router.clone(), settings(100.0));
        for _ in 0..6 {
            monitor.tick();
        }
        assert_eq!(monitor.buffer(Axis::Vertical).unwrap().len(), 100);

        router.route(test_record("EHZ", 100, vec![2; 100], 6_000));
        monitor.tick();
        let buffer = monitor.buffer(Axis::Vertical).unwrap();
        assert_eq!(buffer.len(), 200);
        assert_eq!(buffer.start_time(), DateTime::from_timestamp(7, 0).unwrap());
    }

    #[test]
    fn test_prefilled_buffer_starts_one_window_back() {
        let router = Arc::new(ChannelRouter::default());
        router.route(test_record("EHN", 100, vec![4; 100], 200_000));

        let mut monitor = WaveformMonitor::new(
            router,
            DisplaySettings {
                prefill_zeros: true,
                ..settings(100.0)
            },
        );
        monitor.tick();
        let buffer = monitor.buffer(Axis::North).unwrap();
        assert!(buffer.is_full());
        assert_eq!(buffer.samples()[buffer.len() - 1], 4.0);
        assert_eq!(buffer.samples()[0], 0.0);
        assert_eq!(buffer.start_time(), DateTime::from_timestamp(81, 0).unwrap());
    }
}
