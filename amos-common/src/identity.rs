//! Participant identity resolution
//!
//! Participants are identified by the name they type in, normalized and
//! suffixed with a short content hash. The same name always resolves to the
//! same ID, which is what lets a participant resume after an interruption.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters of the MD5 digest kept in the ID
const HASH_LEN: usize = 6;

/// Stable participant identifier: `NORMALIZED_NAME_abcdef`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading name token, written to the `name_prefix` output column
    pub fn name_prefix(&self) -> &str {
        self.0.split('_').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

/// Trim, turn every space into `_`, upper-case
///
/// Each space maps to its own `_`; tabs and other inner whitespace are kept.
pub fn normalize_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_uppercase()
}

/// Derive the participant ID for a free-text name
///
/// Returns `InvalidInput` for empty or whitespace-only names; no state is
/// created in that case.
pub fn resolve_identity(name: &str) -> Result<ParticipantId> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(Error::InvalidInput("Name required.".to_string()));
    }

    let digest = format!("{:x}", md5::compute(normalized.as_bytes()));
    Ok(ParticipantId(format!(
        "{}_{}",
        normalized,
        &digest[..HASH_LEN]
    )))
}
