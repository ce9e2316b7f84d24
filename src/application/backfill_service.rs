// Backfill service - Paged history fetch with gap filling
use crate::application::history_repository::HistoryApi;
use crate::domain::error::HistoryError;
use crate::domain::history::{BackfilledSeries, HistoryRecord};
use crate::domain::telemetry::Axis;
use std::sync::Arc;

/// Gaps shorter than this many nominal intervals are treated as jitter.
const GAP_TOLERANCE: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapFill {
    pub count: usize,
    pub value: f64,
}

/// Fill needed between `prev` and `next`, if the time between the end of
/// `prev`'s samples and the start of `next` exceeds the tolerance. The fill
/// value is the mean of `prev`'s values (zero-order hold on the block average).
pub fn gap_between(prev: &HistoryRecord, next: &HistoryRecord) -> Option<GapFill> {
    let interval = prev.nominal_interval_ms();
    let delta = next.timestamp_ms as f64 - prev.end_ms();
    if delta <= GAP_TOLERANCE * interval {
        return None;
    }
    Some(GapFill {
        count: (delta / interval) as usize,
        value: prev.mean()?,
    })
}

#[derive(Clone)]
pub struct BackfillService {
    api: Arc<dyn HistoryApi>,
    max_span_ms: i64,
}

impl BackfillService {
    pub fn new(api: Arc<dyn HistoryApi>, max_span_ms: i64) -> Self {
        Self {
            api,
            max_span_ms: max_span_ms.max(1),
        }
    }

    /// Page through `[start_ms, end_ms)` and concatenate the axis' samples,
    /// synthesizing fill samples across discontinuities.
    ///
    /// A timed-out page fails the whole backfill. Other page failures are
    /// logged and skipped; the missing span is then filled like any other gap.
    /// Records stamped outside the page they came back in are dropped, so a
    /// fill never reaches past `end_ms`.
    pub async fn backfill(
        &self,
        start_ms: i64,
        end_ms: i64,
        axis: Axis,
    ) -> Result<BackfilledSeries, HistoryError> {
        let mut samples = Vec::new();
        let mut filled = 0;
        let mut first: Option<(i64, f64)> = None;
        let mut prev: Option<HistoryRecord> = None;

        let mut cursor = start_ms;
        while cursor < end_ms {
            let page_end = (cursor + self.max_span_ms).min(end_ms);
            tracing::debug!("Fetching history page [{}, {}) for axis {}", cursor, page_end, axis);

            let chunk = match self.api.fetch(cursor, page_end, axis).await {
                Ok(chunk) => chunk,
                Err(e) if e.is_timeout() => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping history page [{}, {}): {}", cursor, page_end, e);
                    cursor = page_end;
                    continue;
                }
            };

            for record in chunk.records {
                if record.values.is_empty() {
                    continue;
                }
                if record.timestamp_ms < cursor || record.timestamp_ms >= page_end {
                    tracing::debug!(
                        "Dropping record at {} outside page [{}, {})",
                        record.timestamp_ms,
                        cursor,
                        page_end
                    );
                    continue;
                }
                if let Some(fill) = prev.as_ref().and_then(|p| gap_between(p, &record)) {
                    tracing::debug!(
                        "Gap before {}: filling {} samples with {:.2}",
                        record.timestamp_ms,
                        fill.count,
                        fill.value
                    );
                    samples.extend(std::iter::repeat_n(fill.value, fill.count));
                    filled += fill.count;
                }
                first.get_or_insert((record.timestamp_ms, record.sample_rate));
                samples.extend(record.values.iter().map(|&v| v as f64));
                prev = Some(record);
            }

            cursor = page_end;
        }

        let (series_start, sample_rate) = first.unwrap_or((start_ms, 0.0));
        Ok(BackfilledSeries {
            start_ms: series_start,
            sample_rate,
            samples,
            filled,
        })
    }
}
