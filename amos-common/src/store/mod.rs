//! Progress store: persistence boundary for responses and resume
//!
//! Two backends implement [`ProgressStore`]:
//! - [`RowStore`]: append-only SQLite table, one row per submitted trial.
//!   Keeps no trial order; resumed participants get a participant-seeded order.
//! - [`LocalFileStore`]: per-participant JSON snapshot while the study is in
//!   progress, consolidated CSV export once it is complete.

use crate::identity::ParticipantId;
use crate::models::{AppendAck, ProgressSnapshot, TrialResponse};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

mod local;
mod rows;

pub use local::LocalFileStore;
pub use rows::RowStore;

/// Persistence contract shared by both backends
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Backend kind, used in startup logging
    fn backend(&self) -> Backend;

    /// Whether `load` returns the trial order recorded by `begin`
    fn keeps_trial_order(&self) -> bool;

    /// Prior progress for a participant, `None` if there is no usable record
    async fn load(&self, participant_id: &ParticipantId) -> Result<Option<ProgressSnapshot>>;

    /// Record the start of a fresh session with its trial order
    async fn begin(&self, participant_id: &ParticipantId, trial_order: &[usize]) -> Result<()>;

    /// Durably store one response
    ///
    /// Storing the same `(participant_id, trial_index)` twice writes nothing
    /// and returns [`AppendAck::AlreadyStored`].
    async fn append(&self, response: &TrialResponse) -> Result<AppendAck>;

    /// Write the completion summary once every trial is stored
    async fn finalize(&self, participant_id: &ParticipantId) -> Result<()>;
}

/// Which persistence backend a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Append-only row store
    Rows,
    /// Local JSON snapshots and CSV exports
    Local,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Rows => f.write_str("rows"),
            Backend::Local => f.write_str("local"),
        }
    }
}

impl FromStr for Backend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rows" => Ok(Backend::Rows),
            "local" => Ok(Backend::Local),
            other => Err(crate::Error::Config(format!(
                "Unknown backend '{}' (expected 'rows' or 'local')",
                other
            ))),
        }
    }
}

/// Row store database file inside the results directory
pub const ROW_STORE_FILE: &str = "responses.db";

/// Open the configured backend rooted at `results_dir`
///
/// A row store that cannot be opened is a fatal startup error; there is no
/// reconnect path.
pub async fn open_store(backend: Backend, results_dir: &Path) -> Result<Arc<dyn ProgressStore>> {
    match backend {
        Backend::Rows => {
            let store = RowStore::connect(&results_dir.join(ROW_STORE_FILE)).await?;
            Ok(Arc::new(store))
        }
        Backend::Local => {
            let store = LocalFileStore::open(results_dir).await?;
            Ok(Arc::new(store))
        }
    }
}
