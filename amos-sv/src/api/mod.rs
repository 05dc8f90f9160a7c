//! HTTP API handlers for amos-sv

pub mod health;
pub mod sessions;
pub mod ui;
pub mod views;

pub use health::health_routes;
pub use sessions::session_routes;
pub use ui::ui_routes;
