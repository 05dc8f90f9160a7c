//! Trial catalog
//!
//! Immutable table of trial definitions, read once at startup from a CSV file
//! with the columns `trial_id, transcript, native_path, indian_path, A_path,
//! B_path`. Extra columns are ignored.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Columns every catalog file must provide
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "trial_id",
    "transcript",
    "native_path",
    "indian_path",
    "A_path",
    "B_path",
];

/// One row of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialDefinition {
    pub trial_id: String,
    pub transcript: String,
    /// Native accent anchor recording
    pub native_path: String,
    /// Indian accent anchor recording
    pub indian_path: String,
    /// Candidate sample A
    #[serde(rename = "A_path")]
    pub a_path: String,
    /// Candidate sample B
    #[serde(rename = "B_path")]
    pub b_path: String,
}

/// Loaded trial catalog
#[derive(Debug, Clone)]
pub struct TrialCatalog {
    trials: Vec<TrialDefinition>,
}

impl TrialCatalog {
    /// Build a catalog from already-parsed rows
    ///
    /// Rejects an empty list and duplicate `trial_id` values.
    pub fn new(trials: Vec<TrialDefinition>) -> Result<Self> {
        if trials.is_empty() {
            return Err(Error::Config("Trial catalog is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for trial in &trials {
            if !seen.insert(trial.trial_id.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate trial_id in catalog: {}",
                    trial.trial_id
                )));
            }
        }

        Ok(Self { trials })
    }

    /// Load the catalog from a CSV file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Config(format!("Cannot open trial catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_reader(file)?;
        info!(
            "Loaded {} trials from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse the catalog from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = rdr.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Trial catalog is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let trials = rdr
            .deserialize::<TrialDefinition>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Self::new(trials)
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Trial at a catalog row index
    pub fn get(&self, index: usize) -> Option<&TrialDefinition> {
        self.trials.get(index)
    }

    pub fn trials(&self) -> &[TrialDefinition] {
        &self.trials
    }
}
