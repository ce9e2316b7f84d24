// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod frame_decoder;
pub mod history_client;
pub mod tcp_session;
