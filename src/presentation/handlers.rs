// HTTP request handlers
use crate::application::waveform_monitor::WaveformSnapshot;
use crate::domain::telemetry::Axis;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const HOUR_MS: i64 = 3_600_000;

#[derive(Deserialize)]
pub struct HelicorderQuery {
    pub hours: Option<u32>,
    pub axis: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HelicorderResponse {
    pub channel: String,
    pub sample_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub filled: usize,
    pub samples: Vec<f64>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Latest rolling window of every axis
pub async fn get_waveform(State(state): State<Arc<AppState>>) -> Json<Vec<WaveformSnapshot>> {
    Json(state.snapshots.borrow().clone())
}

/// Start of a helicorder window: `hours` before `now_ms`, truncated to the hour.
pub fn helicorder_start_ms(now_ms: i64, hours: u32) -> i64 {
    let start = now_ms - hours as i64 * HOUR_MS;
    start - start.rem_euclid(HOUR_MS)
}

/// Gap-filled history for one axis (dayplot / backfill)
pub async fn get_helicorder(
    Query(query): Query<HelicorderQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<HelicorderResponse>, StatusCode> {
    let axis = match query.axis.as_deref() {
        None => Axis::Vertical,
        Some(s) => s
            .chars()
            .last()
            .and_then(Axis::from_component)
            .ok_or(StatusCode::BAD_REQUEST)?,
    };
    let hours = query
        .hours
        .unwrap_or(state.default_hours)
        .clamp(1, state.max_hours.max(1));

    // The window is computed in display time; the instrument's clock is
    // `ts_offset_ms` ahead of it.
    let now_ms = Utc::now().timestamp_millis();
    let start_ms = helicorder_start_ms(now_ms, hours);

    let series = state
        .backfill
        .backfill(start_ms + state.ts_offset_ms, now_ms + state.ts_offset_ms, axis)
        .await
        .map_err(|e| {
            tracing::error!("Helicorder backfill for axis {} failed: {}", axis, e);
            if e.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            }
        })?;

    Ok(Json(HelicorderResponse {
        channel: state.station.channel_code(axis.component()),
        sample_rate: series.sample_rate,
        start_time: DateTime::from_timestamp_millis(series.start_ms - state.ts_offset_ms).unwrap_or_default(),
        end_time: DateTime::from_timestamp_millis(now_ms).unwrap_or_default(),
        filled: series.filled,
        samples: series.samples,
    }))
}
