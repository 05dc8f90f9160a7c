//! Session controller: the survey state machine
//!
//! `NoIdentity -> Active(i) -> Complete`
//!
//! - [`SessionController::start`]: a valid name moves a participant from
//!   `NoIdentity` to `Active`, either fresh or resumed from stored progress.
//!   Participants with a completed record are turned away.
//! - [`SessionController::submit`]: stores the ratings for the current trial
//!   and advances the cursor once the store has acknowledged the write.
//!   Reaching the last trial finalizes the store and enters `Complete`.

use crate::catalog::{TrialCatalog, TrialDefinition};
use crate::identity::{resolve_identity, ParticipantId};
use crate::models::{AppendAck, TrialResponse};
use crate::presentation::{is_permutation, seeded_order, shuffled_order};
use crate::ratings::RatingSheet;
use crate::session::{ParticipantSession, SessionPhase};
use crate::store::ProgressStore;
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Message shown to participants who already finished
pub const ALREADY_COMPLETED: &str = "You have already completed this study.";

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Response stored, cursor moved to the next trial
    Advanced,
    /// Response stored and it was the last trial
    Completed,
    /// Trial had already been submitted; nothing written
    Duplicate,
}

pub struct SessionController {
    catalog: Arc<TrialCatalog>,
    store: Arc<dyn ProgressStore>,
    total_trials: usize,
}

impl SessionController {
    /// Create a controller; `configured_trials` is capped at the catalog size
    pub fn new(
        catalog: Arc<TrialCatalog>,
        store: Arc<dyn ProgressStore>,
        configured_trials: usize,
    ) -> Self {
        let total_trials = configured_trials.min(catalog.len());
        if total_trials < configured_trials {
            warn!(
                "Configured {} trials but catalog has {}; using {}",
                configured_trials,
                catalog.len(),
                total_trials
            );
        }

        Self {
            catalog,
            store,
            total_trials,
        }
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn catalog(&self) -> &TrialCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    /// Start or resume the session for a participant name
    ///
    /// Errors: `InvalidInput` for an empty name (nothing is stored),
    /// `Conflict` when the participant already completed the study.
    pub async fn start(&self, name: &str) -> Result<ParticipantSession> {
        let participant_id = resolve_identity(name)?;
        self.start_for(participant_id).await
    }

    /// Start or resume for an already-resolved participant ID
    pub async fn start_for(&self, participant_id: ParticipantId) -> Result<ParticipantSession> {
        let catalog_len = self.catalog.len();

        let snapshot = match self.store.load(&participant_id).await? {
            Some(snapshot) => snapshot,
            None => {
                // Without a stored order the seeded one is the only order a
                // resume can reproduce, so fresh sessions use it too
                let order = if self.store.keeps_trial_order() {
                    shuffled_order(catalog_len)
                } else {
                    seeded_order(&participant_id, catalog_len)
                };
                self.store.begin(&participant_id, &order).await?;
                info!(participant_id = %participant_id, "Starting new session");
                return ParticipantSession::new(participant_id, order, 0, self.total_trials);
            }
        };

        if snapshot.completed {
            info!(participant_id = %participant_id, "Participant already completed; denying re-entry");
            return Err(Error::Conflict(ALREADY_COMPLETED.to_string()));
        }

        let order = match snapshot.trial_order.clone() {
            Some(order) if is_permutation(&order, catalog_len) => order,
            Some(_) => {
                warn!(
                    participant_id = %participant_id,
                    "Stored trial order does not match catalog of {} trials; re-deriving",
                    catalog_len
                );
                seeded_order(&participant_id, catalog_len)
            }
            None => seeded_order(&participant_id, catalog_len),
        };

        let trial_index = snapshot.next_trial_index();
        if trial_index >= self.total_trials {
            // Every trial stored but the summary was never written
            self.store.finalize(&participant_id).await?;
            info!(participant_id = %participant_id, "Finalized previously unfinished completion");
            return Err(Error::Conflict(ALREADY_COMPLETED.to_string()));
        }

        info!(
            participant_id = %participant_id,
            trial_index,
            "Resuming session"
        );
        let session = ParticipantSession::new(participant_id, order, trial_index, self.total_trials)?;
        Ok(session.mark_resumed())
    }

    /// Trial definition currently presented to the participant
    pub fn current_trial(&self, session: &ParticipantSession) -> Option<&TrialDefinition> {
        session
            .current_catalog_index()
            .and_then(|idx| self.catalog.get(idx))
    }

    /// Submit ratings for trial position `trial_index`
    ///
    /// A position below the cursor is a repeated submission and is
    /// acknowledged without writing. The cursor only advances after the
    /// store acknowledges the append.
    pub async fn submit(
        &self,
        session: &mut ParticipantSession,
        trial_index: usize,
        sheet: &RatingSheet,
    ) -> Result<SubmitOutcome> {
        let current = match session.phase() {
            SessionPhase::Complete => {
                return Err(Error::Conflict("Study is already complete.".to_string()))
            }
            SessionPhase::Active { trial_index } => trial_index,
        };

        if trial_index < current {
            info!(
                participant_id = %session.participant_id(),
                trial_index,
                "Ignoring repeated submission"
            );
            return Ok(SubmitOutcome::Duplicate);
        }
        if trial_index > current {
            return Err(Error::InvalidInput(format!(
                "Trial {} submitted but trial {} is current",
                trial_index, current
            )));
        }

        let ratings = sheet.complete()?;
        let trial = self.current_trial(session).ok_or_else(|| {
            Error::Internal(format!("No catalog row for trial position {}", current))
        })?;

        let is_last = current + 1 == session.total_trials();
        let participant_id = session.participant_id().clone();
        let response = TrialResponse {
            name_prefix: participant_id.name_prefix().to_string(),
            participant_id,
            trial_index: current,
            trial_id: trial.trial_id.clone(),
            transcript: trial.transcript.clone(),
            ratings,
            timestamp: Utc::now(),
            completed: is_last,
        };

        match self.store.append(&response).await? {
            AppendAck::Appended => info!(
                participant_id = %response.participant_id,
                trial_index = current,
                trial_id = %response.trial_id,
                "Stored response"
            ),
            AppendAck::AlreadyStored => warn!(
                participant_id = %response.participant_id,
                trial_index = current,
                "Response was already stored; advancing"
            ),
        }

        session.advance();

        if session.is_complete() {
            self.store.finalize(session.participant_id()).await?;
            info!(participant_id = %session.participant_id(), "Session complete");
            return Ok(SubmitOutcome::Completed);
        }

        Ok(SubmitOutcome::Advanced)
    }
}
