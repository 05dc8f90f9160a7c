//! Survey session endpoints
//!
//! - `GET /api/study`: title, trial count and rating scale
//! - `POST /api/sessions`: start or resume by name
//! - `GET /api/sessions/:session_id`: current view
//! - `POST /api/sessions/:session_id/responses`: submit ratings for a trial

use std::collections::HashMap;

use amos_common::controller::ALREADY_COMPLETED;
use amos_common::ratings::{RatingSheet, MAX_RATING, MIN_RATING};
use amos_common::{resolve_identity, SubmitOutcome};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::views::SessionView;
use crate::error::{ApiError, ApiResult};
use crate::registry::SessionHandle;
use crate::AppState;

/// Study description for the page header
#[derive(Debug, Serialize)]
pub struct StudyInfo {
    pub title: String,
    pub total_trials: usize,
    pub rating_scale: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub trial_index: usize,
    #[serde(default)]
    pub ratings: HashMap<String, Option<u8>>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// "advanced", "completed" or "duplicate"
    pub outcome: &'static str,
    #[serde(flatten)]
    pub session: SessionView,
}

fn outcome_label(outcome: SubmitOutcome) -> &'static str {
    match outcome {
        SubmitOutcome::Advanced => "advanced",
        SubmitOutcome::Completed => "completed",
        SubmitOutcome::Duplicate => "duplicate",
    }
}

/// GET /api/study
pub async fn get_study(State(state): State<AppState>) -> Json<StudyInfo> {
    Json(StudyInfo {
        title: state.study_title.clone(),
        total_trials: state.controller.total_trials(),
        rating_scale: (MIN_RATING..=MAX_RATING).collect(),
    })
}

/// POST /api/sessions
///
/// Re-attaches to the participant's live session when there is one,
/// otherwise starts or resumes from the progress store. Starts are
/// serialized so concurrent requests for one name share a single session.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<SessionView>> {
    let participant_id = resolve_identity(&request.name)?;
    let _start = state.registry.lock_starts().await;

    if let Some((session_id, handle)) = state.registry.find_participant(&participant_id).await {
        let session = handle.lock().await;
        if session.is_complete() {
            info!(participant_id = %participant_id, "Completed participant tried to start again");
            return Err(ApiError::Conflict(ALREADY_COMPLETED.to_string()));
        }
        debug!(participant_id = %participant_id, %session_id, "Re-attaching to live session");
        return Ok(Json(SessionView::build(
            session_id,
            &session,
            &state.controller,
        )));
    }

    let session = state.controller.start_for(participant_id).await?;
    let (session_id, handle) = state.registry.insert(session).await;
    let session = handle.lock().await;

    Ok(Json(SessionView::build(
        session_id,
        &session,
        &state.controller,
    )))
}

async fn lookup(state: &AppState, session_id: Uuid) -> ApiResult<SessionHandle> {
    state
        .registry
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session {}", session_id)))
}

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    let handle = lookup(&state, session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionView::build(
        session_id,
        &session,
        &state.controller,
    )))
}

/// POST /api/sessions/:session_id/responses
pub async fn submit_response(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let sheet = RatingSheet::from_submission(&request.ratings)?;
    let handle = lookup(&state, session_id).await?;

    // Held across the store write so one participant's submissions apply in order
    let mut session = handle.lock().await;
    let outcome = state
        .controller
        .submit(&mut session, request.trial_index, &sheet)
        .await?;
    let view = SessionView::build(session_id, &session, &state.controller);
    drop(session);

    if outcome == SubmitOutcome::Completed {
        // The stored completion record turns away later starts
        state.registry.remove(session_id).await;
        debug!(%session_id, "Released completed session");
    }

    Ok(Json(SubmitResponse {
        outcome: outcome_label(outcome),
        session: view,
    }))
}

/// Build survey session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/study", get(get_study))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:session_id", get(get_session))
        .route("/api/sessions/:session_id/responses", post(submit_response))
}
