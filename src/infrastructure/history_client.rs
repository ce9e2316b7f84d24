// HTTP history client for the instrument's request/response API
use crate::application::history_repository::HistoryApi;
use crate::domain::error::HistoryError;
use crate::domain::history::{HistoryChunk, HistoryRecord};
use crate::domain::telemetry::Axis;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpHistoryClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<HistoryPacket>,
}

/// One packet of the history response. Packets carry one second of samples
/// per axis unless an explicit rate is present.
#[derive(Debug, Deserialize)]
struct HistoryPacket {
    ts: i64,
    #[serde(default, alias = "sps")]
    sample_rate: Option<f64>,
    #[serde(default)]
    ehe: Vec<i32>,
    #[serde(default)]
    ehn: Vec<i32>,
    #[serde(default)]
    ehz: Vec<i32>,
}

impl HistoryPacket {
    fn into_record(self, axis: Axis) -> Option<HistoryRecord> {
        let values = match axis {
            Axis::East => self.ehe,
            Axis::North => self.ehn,
            Axis::Vertical => self.ehz,
        };
        if values.is_empty() {
            return None;
        }
        let sample_rate = self
            .sample_rate
            .filter(|r| *r > 0.0)
            .unwrap_or(values.len() as f64);
        Some(HistoryRecord::new(self.ts, sample_rate, values))
    }
}

impl HttpHistoryClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, HistoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HistoryError::Request(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn history_url(&self) -> String {
        format!("{}/api/v1/history", self.base_url)
    }
}

fn parse_chunk(body: &str, start_ms: i64, end_ms: i64, axis: Axis) -> Result<HistoryChunk, HistoryError> {
    let response: HistoryResponse =
        serde_json::from_str(body).map_err(|e| HistoryError::Decode(e.to_string()))?;

    let mut records: Vec<HistoryRecord> = response
        .data
        .into_iter()
        .filter_map(|packet| packet.into_record(axis))
        .collect();
    records.sort_by_key(|r| r.timestamp_ms);

    Ok(HistoryChunk {
        start_ms,
        end_ms,
        records,
    })
}

#[async_trait]
impl HistoryApi for HttpHistoryClient {
    async fn fetch(&self, start_ms: i64, end_ms: i64, axis: Axis) -> Result<HistoryChunk, HistoryError> {
        let form = [
            ("start", start_ms.to_string()),
            ("end", end_ms.to_string()),
            ("format", "json".to_string()),
        ];

        let response = self
            .client
            .post(self.history_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HistoryError::Timeout { start_ms, end_ms }
                } else {
                    HistoryError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(HistoryError::Status { status, body });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                HistoryError::Timeout { start_ms, end_ms }
            } else {
                HistoryError::Request(e.to_string())
            }
        })?;

        let chunk = parse_chunk(&body, start_ms, end_ms, axis)?;
        tracing::debug!(
            "History [{}, {}) returned {} records for axis {}",
            start_ms,
            end_ms,
            chunk.records.len(),
            axis
        );
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_selects_axis() {
        let body = r#"{"data":[
            {"ts":2000,"ehe":[1,2],"ehn":[3,4],"ehz":[5,6,7]},
            {"ts":1000,"ehe":[9],"ehn":[],"ehz":[-1,-2,-3]}
        ]}"#;

        let chunk = parse_chunk(body, 0, 3_000, Axis::Vertical).unwrap();
        assert_eq!(chunk.records.len(), 2);
        assert_eq!(chunk.records[0], HistoryRecord::new(1000, 3.0, vec![-1, -2, -3]));
        assert_eq!(chunk.records[1], HistoryRecord::new(2000, 3.0, vec![5, 6, 7]));

        let north = parse_chunk(body, 0, 3_000, Axis::North).unwrap();
        assert_eq!(north.records, vec![HistoryRecord::new(2000, 2.0, vec![3, 4])]);
    }

    #[test]
    fn test_explicit_rate_wins() {
        let body = r#"{"data":[{"ts":0,"sps":100,"ehz":[1,2,3]}]}"#;
        let chunk = parse_chunk(body, 0, 1_000, Axis::Vertical).unwrap();
        assert_eq!(chunk.records[0].sample_rate, 100.0);
    }

    #[test]
    fn test_invalid_body_is_decode_error() {
        assert!(matches!(
            parse_chunk("not json", 0, 1, Axis::East),
            Err(HistoryError::Decode(_))
        ));
    }

    #[test]
    fn test_history_url() {
        let client = HttpHistoryClient::new("http://observer:8073/".to_string(), Duration::from_secs(15)).unwrap();
        assert_eq!(client.history_url(), "http://observer:8073/api/v1/history");
    }
}
