//! # AMOS Common Library
//!
//! Core of the accent similarity survey, shared by the survey service:
//! - Trial catalog loading
//! - Participant identity resolution
//! - Trial ordering and presentation randomization
//! - Rating sheets and response records
//! - Progress stores (row store, local files)
//! - Session state and the session controller
//! - Configuration loading

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod models;
pub mod presentation;
pub mod ratings;
pub mod session;
pub mod store;

pub use catalog::{TrialCatalog, TrialDefinition};
pub use controller::{SessionController, SubmitOutcome};
pub use error::{Error, Result};
pub use identity::{resolve_identity, ParticipantId};
pub use session::{ParticipantSession, SessionPhase};
pub use store::{Backend, ProgressStore};
