//! Anchor/sample labels and per-trial rating sheets
//!
//! Every trial collects one 1-5 rating per (anchor, sample) pair, four in
//! total. Ratings are keyed `"<anchor_label>_<sample_label>"` regardless of
//! the order in which anchors and samples were presented.

use crate::{Error, Result};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Reference accent a sample is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Native,
    Indian,
}

impl Anchor {
    pub const ALL: [Anchor; 2] = [Anchor::Native, Anchor::Indian];

    pub fn label(self) -> &'static str {
        match self {
            Anchor::Native => "Native Accent",
            Anchor::Indian => "Indian Accent",
        }
    }

    fn slot(self) -> usize {
        match self {
            Anchor::Native => 0,
            Anchor::Indian => 1,
        }
    }
}

/// Candidate recording being rated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sample {
    A,
    B,
}

impl Sample {
    pub const ALL: [Sample; 2] = [Sample::A, Sample::B];

    pub fn label(self) -> &'static str {
        match self {
            Sample::A => "Sample A",
            Sample::B => "Sample B",
        }
    }

    fn slot(self) -> usize {
        match self {
            Sample::A => 0,
            Sample::B => 1,
        }
    }
}

/// Storage key for one rating cell
pub fn rating_key(anchor: Anchor, sample: Sample) -> String {
    format!("{}_{}", anchor.label(), sample.label())
}

fn parse_key(key: &str) -> Option<(Anchor, Sample)> {
    Anchor::ALL.into_iter().find_map(|anchor| {
        Sample::ALL
            .into_iter()
            .find(|&sample| rating_key(anchor, sample) == key)
            .map(|sample| (anchor, sample))
    })
}

fn check_range(key: &str, value: u8) -> Result<u8> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!(
            "Rating for '{}' must be between {} and {}, got {}",
            key, MIN_RATING, MAX_RATING, value
        )))
    }
}

/// Partially filled ratings for one trial
///
/// Mirrors the rating form: cells start unset and the trial can only be
/// submitted once all four are filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingSheet {
    cells: [[Option<u8>; 2]; 2],
}

impl RatingSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sheet from a submitted `key -> rating` map
    ///
    /// Unknown keys and out-of-range values are rejected. Missing keys or
    /// `null` values simply leave the cell unset.
    pub fn from_submission(submitted: &HashMap<String, Option<u8>>) -> Result<Self> {
        let mut sheet = Self::new();
        for (key, value) in submitted {
            let (anchor, sample) = parse_key(key)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown rating key '{}'", key)))?;
            if let Some(v) = value {
                sheet.set(anchor, sample, check_range(key, *v)?);
            }
        }
        Ok(sheet)
    }

    pub fn set(&mut self, anchor: Anchor, sample: Sample, value: u8) {
        self.cells[anchor.slot()][sample.slot()] = Some(value);
    }

    pub fn get(&self, anchor: Anchor, sample: Sample) -> Option<u8> {
        self.cells[anchor.slot()][sample.slot()]
    }

    /// Submission is allowed iff every cell is set
    pub fn is_complete(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }

    /// Keys of cells that are still unset, in canonical order
    pub fn missing_keys(&self) -> Vec<String> {
        Anchor::ALL
            .into_iter()
            .flat_map(|a| Sample::ALL.into_iter().map(move |s| (a, s)))
            .filter(|&(a, s)| self.get(a, s).is_none())
            .map(|(a, s)| rating_key(a, s))
            .collect()
    }

    /// Convert to a complete rating set, failing if any cell is unset
    pub fn complete(&self) -> Result<Ratings> {
        let missing = self.missing_keys();
        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "All ratings are required; missing: {}",
                missing.join(", ")
            )));
        }

        let mut values = [[0u8; 2]; 2];
        for anchor in Anchor::ALL {
            for sample in Sample::ALL {
                values[anchor.slot()][sample.slot()] = self.get(anchor, sample).unwrap_or_default();
            }
        }
        Ok(Ratings { values })
    }
}

/// Complete, validated ratings for one trial
///
/// Serializes as a JSON object with the four rating keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratings {
    values: [[u8; 2]; 2],
}

impl Ratings {
    pub fn get(&self, anchor: Anchor, sample: Sample) -> u8 {
        self.values[anchor.slot()][sample.slot()]
    }

    /// `(key, value)` pairs in canonical order
    pub fn entries(&self) -> Vec<(String, u8)> {
        Anchor::ALL
            .into_iter()
            .flat_map(|a| Sample::ALL.into_iter().map(move |s| (a, s)))
            .map(|(a, s)| (rating_key(a, s), self.get(a, s)))
            .collect()
    }

    /// The `ratings_json` output column
    pub fn to_json(&self) -> String {
        // Serializing a fixed map of strings to integers cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for Ratings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Ratings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = HashMap::<String, u8>::deserialize(deserializer)?;
        let submitted: HashMap<String, Option<u8>> =
            raw.into_iter().map(|(k, v)| (k, Some(v))).collect();
        RatingSheet::from_submission(&submitted)
            .and_then(|sheet| sheet.complete())
            .map_err(de::Error::custom)
    }
}
