//! Live session registry
//!
//! Maps session tokens to the in-memory [`ParticipantSession`] they drive.
//! Each session sits behind its own mutex so one participant's submissions
//! are serialized while other participants proceed. A participant has at
//! most one live session; starting again re-attaches to it. Completed
//! sessions are removed.

use amos_common::{ParticipantId, ParticipantSession};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Shared handle to one live session
pub type SessionHandle = Arc<Mutex<ParticipantSession>>;

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<Uuid, SessionHandle>,
    by_participant: HashMap<ParticipantId, Uuid>,
}

/// Registry of live sessions, cheap to clone
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    /// Held from the live-session lookup until the new session is
    /// registered, so a participant's progress record is begun once
    start_lock: Arc<Mutex<()>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize session starts
    ///
    /// Hold the guard across [`find_participant`](Self::find_participant),
    /// the store lookup and [`insert`](Self::insert).
    pub async fn lock_starts(&self) -> OwnedMutexGuard<()> {
        self.start_lock.clone().lock_owned().await
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.inner.read().await.sessions.get(&session_id).cloned()
    }

    /// Live session for a participant, if any
    pub async fn find_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Option<(Uuid, SessionHandle)> {
        let inner = self.inner.read().await;
        let session_id = *inner.by_participant.get(participant_id)?;
        inner
            .sessions
            .get(&session_id)
            .map(|handle| (session_id, handle.clone()))
    }

    /// Register a session
    ///
    /// If the participant already has a live session (a concurrent start won
    /// the race), that one is returned and `session` is dropped.
    pub async fn insert(&self, session: ParticipantSession) -> (Uuid, SessionHandle) {
        let mut inner = self.inner.write().await;

        if let Some(&existing) = inner.by_participant.get(session.participant_id()) {
            if let Some(handle) = inner.sessions.get(&existing) {
                return (existing, handle.clone());
            }
        }

        let session_id = Uuid::new_v4();
        let participant_id = session.participant_id().clone();
        let handle = Arc::new(Mutex::new(session));
        inner.sessions.insert(session_id, handle.clone());
        inner.by_participant.insert(participant_id, session_id);
        (session_id, handle)
    }

    /// Drop a session, e.g. once it is complete
    pub async fn remove(&self, session_id: Uuid) -> Option<SessionHandle> {
        let mut inner = self.inner.write().await;
        let handle = inner.sessions.remove(&session_id)?;
        inner.by_participant.retain(|_, id| *id != session_id);
        Some(handle)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
