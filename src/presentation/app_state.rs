// Application state for HTTP handlers
use crate::application::backfill_service::BackfillService;
use crate::application::waveform_monitor::WaveformSnapshot;
use crate::infrastructure::config::StationSettings;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<Vec<WaveformSnapshot>>,
    pub backfill: BackfillService,
    pub station: StationSettings,
    pub default_hours: u32,
    pub max_hours: u32,
    /// Added to both history request bounds (instrument clock offset).
    pub ts_offset_ms: i64,
}
