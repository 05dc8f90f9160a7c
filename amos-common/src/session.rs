//! Per-participant session state
//!
//! A [`ParticipantSession`] is built once when a participant starts or
//! resumes and is then owned by whoever drives the session. It carries the
//! trial order, the cursor, and the presentation flags for every position.
//! Before a name has been accepted there is no session at all.

use crate::identity::ParticipantId;
use crate::presentation::{draw_presentations, is_permutation, Presentation};
use crate::{Error, Result};
use serde::Serialize;

/// Where a session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for the trial at `trial_index`
    Active { trial_index: usize },
    /// Every trial answered; no further input accepted
    Complete,
}

#[derive(Debug, Clone)]
pub struct ParticipantSession {
    participant_id: ParticipantId,
    trial_order: Vec<usize>,
    trial_index: usize,
    total_trials: usize,
    presentations: Vec<Presentation>,
    resumed: bool,
}

impl ParticipantSession {
    /// Build a session, drawing fresh presentation flags for every position
    ///
    /// `trial_order` must be a permutation of the catalog indices and
    /// `total_trials` may not exceed its length.
    pub fn new(
        participant_id: ParticipantId,
        trial_order: Vec<usize>,
        trial_index: usize,
        total_trials: usize,
    ) -> Result<Self> {
        let presentations = draw_presentations(total_trials);
        Self::with_presentations(participant_id, trial_order, trial_index, total_trials, presentations)
    }

    /// Build a session with explicit presentation flags
    pub fn with_presentations(
        participant_id: ParticipantId,
        trial_order: Vec<usize>,
        trial_index: usize,
        total_trials: usize,
        presentations: Vec<Presentation>,
    ) -> Result<Self> {
        if !is_permutation(&trial_order, trial_order.len()) {
            return Err(Error::InvalidInput(
                "trial order is not a permutation".to_string(),
            ));
        }
        if total_trials > trial_order.len() {
            return Err(Error::InvalidInput(format!(
                "{} trials requested but only {} in the order",
                total_trials,
                trial_order.len()
            )));
        }
        if trial_index > total_trials {
            return Err(Error::InvalidInput(format!(
                "trial index {} beyond {} trials",
                trial_index, total_trials
            )));
        }
        if presentations.len() != total_trials {
            return Err(Error::InvalidInput(format!(
                "{} presentation flags for {} trials",
                presentations.len(),
                total_trials
            )));
        }

        Ok(Self {
            participant_id,
            trial_order,
            trial_index,
            total_trials,
            presentations,
            resumed: false,
        })
    }

    pub(crate) fn mark_resumed(mut self) -> Self {
        self.resumed = true;
        self
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn trial_order(&self) -> &[usize] {
        &self.trial_order
    }

    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    /// Session was restored from stored progress
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn phase(&self) -> SessionPhase {
        if self.trial_index >= self.total_trials {
            SessionPhase::Complete
        } else {
            SessionPhase::Active {
                trial_index: self.trial_index,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase(), SessionPhase::Complete)
    }

    /// Catalog row of the current trial, `None` once complete
    pub fn current_catalog_index(&self) -> Option<usize> {
        match self.phase() {
            SessionPhase::Active { trial_index } => self.trial_order.get(trial_index).copied(),
            SessionPhase::Complete => None,
        }
    }

    /// Presentation flags for a trial position
    pub fn presentation(&self, position: usize) -> Option<Presentation> {
        self.presentations.get(position).copied()
    }

    /// Fraction of trials answered, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.total_trials == 0 {
            return 1.0;
        }
        self.trial_index as f64 / self.total_trials as f64
    }

    /// Move the cursor past the current trial
    pub(crate) fn advance(&mut self) {
        if self.trial_index < self.total_trials {
            self.trial_index += 1;
        }
    }
}
