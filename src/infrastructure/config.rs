use crate::application::waveform_monitor::DisplaySettings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ObserverConfig {
    #[serde(default)]
    pub station: StationSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StationSettings {
    pub network: String,
    pub station: String,
    pub location: String,
    /// Band/instrument prefix of the channel codes, `E` for `EHx`.
    pub channel_prefix: String,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            network: "AS".to_string(),
            station: "SHAKE".to_string(),
            location: "00".to_string(),
            channel_prefix: "E".to_string(),
        }
    }
}

impl StationSettings {
    pub fn channel_code(&self, component: char) -> String {
        format!("{}H{}", self.channel_prefix, component)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceSettings {
    pub host: String,
    pub port: u16,
    pub reconnect_delay_ms: u64,
    pub read_timeout_ms: u64,
    pub read_chunk_size: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8073,
            reconnect_delay_ms: 1000,
            read_timeout_ms: 5000,
            read_chunk_size: 4096,
        }
    }
}

impl SourceSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub sample_rate: u32,
    pub window_seconds: u32,
    pub refresh_ms: u64,
    pub prefill_zeros: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            sample_rate: 100,
            window_seconds: 120,
            refresh_ms: 1000,
            prefill_zeros: false,
        }
    }
}

impl DisplayConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn to_settings(&self) -> DisplaySettings {
        DisplaySettings {
            sample_rate: self.sample_rate as f64,
            window_seconds: self.window_seconds,
            tick: chrono::Duration::milliseconds(self.refresh_ms as i64),
            prefill_zeros: self.prefill_zeros,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub base_url: String,
    pub max_span_ms: i64,
    pub timeout_ms: u64,
    pub default_hours: u32,
    pub max_hours: u32,
    /// Data timestamp offset added to both bounds of every history request.
    pub ts_offset_ms: i64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8073".to_string(),
            max_span_ms: 3_600_000,
            timeout_ms: 15_000,
            default_hours: 6,
            max_hours: 48,
            ts_offset_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.display.sample_rate == 0 {
            anyhow::bail!("display.sample_rate must be positive");
        }
        if self.display.window_seconds == 0 {
            anyhow::bail!("display.window_seconds must be positive");
        }
        if self.display.refresh_ms == 0 {
            anyhow::bail!("display.refresh_ms must be positive");
        }
        if self.source.read_chunk_size == 0 {
            anyhow::bail!("source.read_chunk_size must be positive");
        }
        if self.history.max_span_ms <= 0 {
            anyhow::bail!("history.max_span_ms must be positive");
        }
        if self.history.max_hours == 0 {
            anyhow::bail!("history.max_hours must be positive");
        }
        Ok(())
    }
}

/// `config/observer.{toml,yaml,json}` if present, then `OBSERVER__*` env vars.
pub fn load_observer_config() -> anyhow::Result<ObserverConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/observer").required(false))
        .add_source(config::Environment::with_prefix("OBSERVER").separator("__"))
        .build()?;

    let config: ObserverConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
