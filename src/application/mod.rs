// Application layer - Use cases over the domain models
pub mod backfill_service;
pub mod channel_router;
pub mod history_repository;
pub mod resampler;
pub mod rolling_buffer;
pub mod waveform_monitor;
