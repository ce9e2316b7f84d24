// Presentation layer - HTTP hand-off to the renderer
pub mod app_state;
pub mod handlers;
