//! JSON views of a session for the survey page
//!
//! The page renders exactly what it is given: anchors and samples arrive in
//! presentation order, each sample carrying the key its rating is stored
//! under.

use amos_common::catalog::TrialDefinition;
use amos_common::presentation::Presentation;
use amos_common::ratings::{rating_key, Anchor, Sample};
use amos_common::{ParticipantSession, SessionController, SessionPhase};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub participant_id: String,
    /// "active" or "complete"
    pub state: &'static str,
    pub trial_index: usize,
    pub total_trials: usize,
    /// Fraction answered, 0.0 to 1.0
    pub progress: f64,
    pub resumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial: Option<TrialView>,
}

#[derive(Debug, Serialize)]
pub struct TrialView {
    /// 1-based position shown as "Trial n of N"
    pub position: usize,
    pub trial_id: String,
    pub transcript: String,
    pub anchors: Vec<AnchorView>,
}

#[derive(Debug, Serialize)]
pub struct AnchorView {
    pub label: &'static str,
    pub audio: String,
    pub samples: Vec<SampleView>,
}

#[derive(Debug, Serialize)]
pub struct SampleView {
    pub label: &'static str,
    pub audio: String,
    pub rating_key: String,
}

impl SessionView {
    pub fn build(
        session_id: Uuid,
        session: &ParticipantSession,
        controller: &SessionController,
    ) -> Self {
        let (state, trial) = match session.phase() {
            SessionPhase::Complete => ("complete", None),
            SessionPhase::Active { trial_index } => {
                let presentation = session
                    .presentation(trial_index)
                    .unwrap_or(Presentation::CANONICAL);
                let trial = controller
                    .current_trial(session)
                    .map(|def| TrialView::build(trial_index, def, &presentation));
                ("active", trial)
            }
        };

        Self {
            session_id,
            participant_id: session.participant_id().to_string(),
            state,
            trial_index: session.trial_index(),
            total_trials: session.total_trials(),
            progress: session.progress(),
            resumed: session.is_resumed(),
            trial,
        }
    }
}

impl TrialView {
    fn build(trial_index: usize, def: &TrialDefinition, presentation: &Presentation) -> Self {
        let anchors = presentation
            .anchors()
            .into_iter()
            .map(|anchor| AnchorView {
                label: anchor.label(),
                audio: audio_url(anchor_path(def, anchor)),
                samples: presentation
                    .samples(anchor)
                    .into_iter()
                    .map(|sample| SampleView {
                        label: sample.label(),
                        audio: audio_url(sample_path(def, sample)),
                        rating_key: rating_key(anchor, sample),
                    })
                    .collect(),
            })
            .collect();

        Self {
            position: trial_index + 1,
            trial_id: def.trial_id.clone(),
            transcript: def.transcript.clone(),
            anchors,
        }
    }
}

fn anchor_path(def: &TrialDefinition, anchor: Anchor) -> &str {
    match anchor {
        Anchor::Native => &def.native_path,
        Anchor::Indian => &def.indian_path,
    }
}

fn sample_path(def: &TrialDefinition, sample: Sample) -> &str {
    match sample {
        Sample::A => &def.a_path,
        Sample::B => &def.b_path,
    }
}

/// Catalog locator to a URL the page can play
///
/// Absolute http(s) URLs pass through; anything else is served from the
/// audio root under `/audio/`.
pub fn audio_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let relative = path.trim_start_matches("./").trim_start_matches('/');
    format!("/audio/{}", relative.replace('\\', "/"))
}
