//! Local file store: per-participant JSON snapshots and CSV exports
//!
//! Layout under the results directory:
//! - `progress/<participant>.json`: snapshot while the study is in progress
//! - `progress/<participant>.json.corrupt`: unreadable snapshot moved aside
//! - `completed/<participant>.csv`: consolidated export written on completion
//!
//! Every write replaces the whole snapshot through a temporary file and a
//! rename, so a crash mid-write leaves the previous snapshot intact.

use super::{Backend, ProgressStore};
use crate::identity::ParticipantId;
use crate::models::{AppendAck, ProgressSnapshot, TrialResponse, RESPONSE_COLUMNS};
use crate::presentation::is_permutation;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

const PROGRESS_DIR: &str = "progress";
const COMPLETED_DIR: &str = "completed";

/// On-disk progress snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressFile {
    participant_id: ParticipantId,
    trial_order: Vec<usize>,
    /// Next trial position to be answered
    trial_index: usize,
    responses: Vec<TrialResponse>,
}

impl ProgressFile {
    fn new(participant_id: ParticipantId, trial_order: Vec<usize>) -> Self {
        Self {
            participant_id,
            trial_order,
            trial_index: 0,
            responses: Vec::new(),
        }
    }

    /// Check the snapshot invariants; describes the first violation
    fn validate(&self, expected: &ParticipantId) -> std::result::Result<(), String> {
        if &self.participant_id != expected {
            return Err(format!(
                "snapshot belongs to {}, not {}",
                self.participant_id, expected
            ));
        }
        if !is_permutation(&self.trial_order, self.trial_order.len()) {
            return Err("trial_order is not a permutation".to_string());
        }
        if self.trial_index != self.responses.len() {
            return Err(format!(
                "trial_index {} does not match {} stored responses",
                self.trial_index,
                self.responses.len()
            ));
        }
        if self.trial_index > self.trial_order.len() {
            return Err("trial_index beyond trial_order".to_string());
        }
        for (position, response) in self.responses.iter().enumerate() {
            if response.trial_index != position {
                return Err(format!(
                    "response {} is stored at position {}",
                    response.trial_index, position
                ));
            }
            if &response.participant_id != expected {
                return Err(format!("response {} has a foreign participant_id", position));
            }
        }
        Ok(())
    }

    fn to_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            last_trial_index: self.responses.last().map(|r| r.trial_index),
            completed: self.responses.iter().any(|r| r.completed),
            trial_order: Some(self.trial_order.clone()),
        }
    }
}

/// Outcome of reading a snapshot from disk
enum ReadOutcome {
    Missing,
    Corrupt(String),
    Valid(ProgressFile),
}

/// Local JSON/CSV progress store
pub struct LocalFileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on snapshots
    write_lock: Mutex<()>,
}

impl LocalFileStore {
    /// Open the store, creating its directories if needed
    pub async fn open(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root.join(PROGRESS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(COMPLETED_DIR)).await?;
        info!("Local progress store at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn progress_path(&self, participant_id: &ParticipantId) -> PathBuf {
        self.root
            .join(PROGRESS_DIR)
            .join(format!("{}.json", file_stem(participant_id)))
    }

    pub fn export_path(&self, participant_id: &ParticipantId) -> PathBuf {
        self.root
            .join(COMPLETED_DIR)
            .join(format!("{}.csv", file_stem(participant_id)))
    }

    async fn read_progress(&self, participant_id: &ParticipantId) -> Result<ReadOutcome> {
        let path = self.progress_path(participant_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
            Err(e) => return Err(e.into()),
        };

        let file: ProgressFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => return Ok(ReadOutcome::Corrupt(e.to_string())),
        };

        match file.validate(participant_id) {
            Ok(()) => Ok(ReadOutcome::Valid(file)),
            Err(reason) => Ok(ReadOutcome::Corrupt(reason)),
        }
    }

    /// Read a snapshot that must exist and be valid (live session writes)
    async fn read_required(&self, participant_id: &ParticipantId) -> Result<ProgressFile> {
        match self.read_progress(participant_id).await? {
            ReadOutcome::Valid(file) => Ok(file),
            ReadOutcome::Missing => Err(Error::NotFound(format!(
                "No progress snapshot for {}",
                participant_id
            ))),
            ReadOutcome::Corrupt(reason) => Err(Error::Internal(format!(
                "Progress snapshot for {} is corrupt: {}",
                participant_id, reason
            ))),
        }
    }

    async fn write_progress(&self, file: &ProgressFile) -> Result<()> {
        file.validate(&file.participant_id)
            .map_err(|reason| Error::Internal(format!("Refusing to write snapshot: {}", reason)))?;
        let bytes = serde_json::to_vec_pretty(file)?;
        write_atomic(&self.progress_path(&file.participant_id), &bytes).await
    }

    /// Move an unreadable snapshot aside so the participant can start over
    async fn quarantine(&self, participant_id: &ParticipantId, reason: &str) -> Result<()> {
        let path = self.progress_path(participant_id);
        let mut aside = path.clone().into_os_string();
        aside.push(".corrupt");

        warn!(
            participant_id = %participant_id,
            "Discarding corrupt progress snapshot ({}); session restarts",
            reason
        );
        tokio::fs::rename(&path, PathBuf::from(aside)).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for LocalFileStore {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn keeps_trial_order(&self) -> bool {
        true
    }

    async fn load(&self, participant_id: &ParticipantId) -> Result<Option<ProgressSnapshot>> {
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(self.export_path(participant_id)).await? {
            return Ok(Some(ProgressSnapshot {
                last_trial_index: None,
                completed: true,
                trial_order: None,
            }));
        }

        match self.read_progress(participant_id).await? {
            ReadOutcome::Missing => Ok(None),
            ReadOutcome::Valid(file) => Ok(Some(file.to_snapshot())),
            ReadOutcome::Corrupt(reason) => {
                self.quarantine(participant_id, &reason).await?;
                Ok(None)
            }
        }
    }

    async fn begin(&self, participant_id: &ParticipantId, trial_order: &[usize]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        // A valid snapshot already fixes this participant's order
        if let ReadOutcome::Valid(_) = self.read_progress(participant_id).await? {
            return Err(Error::Conflict(format!(
                "Progress for {} has already begun",
                participant_id
            )));
        }

        let file = ProgressFile::new(participant_id.clone(), trial_order.to_vec());
        self.write_progress(&file).await
    }

    async fn append(&self, response: &TrialResponse) -> Result<AppendAck> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_required(&response.participant_id).await?;

        if response.trial_index < file.responses.len() {
            return Ok(AppendAck::AlreadyStored);
        }
        if response.trial_index != file.responses.len() {
            return Err(Error::Conflict(format!(
                "Expected trial {} but got trial {}",
                file.responses.len(),
                response.trial_index
            )));
        }

        file.responses.push(response.clone());
        file.trial_index = file.responses.len();
        self.write_progress(&file).await?;

        Ok(AppendAck::Appended)
    }

    async fn finalize(&self, participant_id: &ParticipantId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let export_path = self.export_path(participant_id);
        let already_exported = tokio::fs::try_exists(&export_path).await?;

        let file = match self.read_progress(participant_id).await? {
            ReadOutcome::Valid(file) => file,
            ReadOutcome::Missing if already_exported => return Ok(()),
            ReadOutcome::Missing => {
                return Err(Error::NotFound(format!(
                    "No progress snapshot for {}",
                    participant_id
                )))
            }
            ReadOutcome::Corrupt(reason) => {
                return Err(Error::Internal(format!(
                    "Cannot export corrupt snapshot for {}: {}",
                    participant_id, reason
                )))
            }
        };

        let csv = export_csv(&file.responses)?;
        write_atomic(&export_path, &csv).await?;
        tokio::fs::remove_file(self.progress_path(participant_id)).await?;

        info!(
            participant_id = %participant_id,
            responses = file.responses.len(),
            "Wrote completed export {}",
            export_path.display()
        );
        Ok(())
    }
}

/// Longest file stem written; long names keep their head and the hash suffix
const MAX_STEM_LEN: usize = 120;

/// Participant IDs come from free text; keep file names to a safe alphabet
fn file_stem(participant_id: &ParticipantId) -> String {
    let stem: String = participant_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if stem.len() <= MAX_STEM_LEN {
        return stem;
    }
    // Every char is ASCII here, so byte offsets are char boundaries
    let suffix = &stem[stem.len() - 7..];
    format!("{}{}", &stem[..MAX_STEM_LEN - 7], suffix)
}

fn export_csv(responses: &[TrialResponse]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RESPONSE_COLUMNS)?;
    for response in responses {
        writer.write_record(response.to_row())?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to flush CSV export: {}", e)))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
