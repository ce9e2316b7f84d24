// Domain layer - Core models and error kinds
pub mod error;
pub mod history;
pub mod telemetry;
