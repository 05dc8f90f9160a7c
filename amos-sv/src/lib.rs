//! amos-sv library - Accent similarity survey service
//!
//! Serves the survey page and the JSON endpoints that drive the session
//! controller: start/resume by name, fetch the current trial, submit ratings.

use amos_common::SessionController;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;
pub mod error;
pub mod registry;

pub use crate::error::{ApiError, ApiResult};
pub use crate::registry::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Survey state machine over the catalog and progress store
    pub controller: Arc<SessionController>,
    /// Live participant sessions
    pub registry: SessionRegistry,
    /// Page title shown to participants
    pub study_title: String,
    /// Directory served under `/audio`
    pub audio_root: PathBuf,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>, study_title: String, audio_root: PathBuf) -> Self {
        Self {
            controller,
            registry: SessionRegistry::new(),
            study_title,
            audio_root,
        }
    }
}

/// Largest accepted request body; a submission is four small integers
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let audio = ServeDir::new(&state.audio_root);

    Router::new()
        .merge(api::ui_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .nest_service("/audio", audio)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
