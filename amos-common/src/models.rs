//! Persisted records: trial responses and progress snapshots

use crate::identity::ParticipantId;
use crate::ratings::Ratings;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Output columns, in order, for both the row store and the CSV export
pub const RESPONSE_COLUMNS: [&str; 8] = [
    "participant_id",
    "name_prefix",
    "trial_index",
    "trial_id",
    "transcript",
    "ratings_json",
    "timestamp_iso8601",
    "completed_flag",
];

/// One submitted trial
///
/// Immutable once written. The response for the final trial position
/// carries `completed = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResponse {
    pub participant_id: ParticipantId,
    pub name_prefix: String,
    pub trial_index: usize,
    pub trial_id: String,
    pub transcript: String,
    pub ratings: Ratings,
    pub timestamp: DateTime<Utc>,
    pub completed: bool,
}

impl TrialResponse {
    /// ISO-8601 timestamp as written to the output column
    pub fn timestamp_iso8601(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Field values in `RESPONSE_COLUMNS` order
    pub fn to_row(&self) -> [String; 8] {
        [
            self.participant_id.to_string(),
            self.name_prefix.clone(),
            self.trial_index.to_string(),
            self.trial_id.clone(),
            self.transcript.clone(),
            self.ratings.to_json(),
            self.timestamp_iso8601(),
            self.completed.to_string(),
        ]
    }
}

/// What a progress store knows about a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Highest stored trial index, `None` when nothing was submitted yet
    pub last_trial_index: Option<usize>,
    /// Participant already finished the study
    pub completed: bool,
    /// Stored trial order, if the backend keeps one
    pub trial_order: Option<Vec<usize>>,
}

impl ProgressSnapshot {
    /// Cursor to resume at: one past the last stored trial
    pub fn next_trial_index(&self) -> usize {
        self.last_trial_index.map_or(0, |last| last + 1)
    }
}

/// Acknowledgement returned by a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendAck {
    /// Response written
    Appended,
    /// A response for this trial index was already stored; nothing written
    AlreadyStored,
}
