//! Session registry: one `SessionState` per conversation id.
//!
//! Turns for the same session are serialized by a per-session lock; turns for
//! different sessions run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::session::{ActivityLevel, Mode, SessionState, TranscriptEntry};
use crate::workflow::Workflow;

/// Read-only snapshot of a session for the API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub mode: Mode,
    pub step: u32,
    pub step_label: String,
    pub transcript: Vec<TranscriptEntry>,
}

impl From<&SessionState> for SessionView {
    fn from(session: &SessionState) -> Self {
        Self {
            id: session.id.clone(),
            mode: session.mode,
            step: session.step.code(),
            step_label: session.step.to_string(),
            transcript: session.transcript.clone(),
        }
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    workflow: Arc<Workflow>,
    activity_level: ActivityLevel,
}

impl SessionRegistry {
    pub fn new(workflow: Arc<Workflow>, activity_level: ActivityLevel) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            workflow,
            activity_level,
        }
    }

    /// The session for `id`, created on first use.
    async fn session_or_create(&self, id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session = %id, "Opening session");
            Arc::new(Mutex::new(SessionState::new(id, self.activity_level)))
        });
        Arc::clone(session)
    }

    /// Open a session under a fresh id and return the id with its greeting.
    pub async fn create(&self) -> (String, Vec<String>) {
        let id = Uuid::new_v4().to_string();
        let replies = self.open(&id).await;
        (id, replies)
    }

    async fn existing(&self, id: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Start the session if it has not started yet; returns any greeting.
    /// This is the only way a session comes into being.
    pub async fn open(&self, id: &str) -> Vec<String> {
        let session = self.session_or_create(id).await;
        let mut state = session.lock().await;
        self.workflow.start(&mut state).await
    }

    /// Run one user turn. Returns `None` for an id that was never opened.
    pub async fn send_message(&self, id: &str, text: &str) -> Option<Vec<String>> {
        let session = self.existing(id).await?;
        let mut state = session.lock().await;
        Some(self.workflow.handle_message(&mut state, text).await)
    }

    pub async fn set_mode(&self, id: &str, mode: Mode) -> Option<Vec<String>> {
        let session = self.existing(id).await?;
        let mut state = session.lock().await;
        Some(self.workflow.set_mode(&mut state, mode).await)
    }

    pub async fn view(&self, id: &str) -> Option<SessionView> {
        let session = self.existing(id).await?;
        let state = session.lock().await;
        Some(SessionView::from(&*state))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::PassthroughComposer;
    use crate::store::LibSqlBackend;

    async fn registry() -> SessionRegistry {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let workflow = Arc::new(Workflow::new(store, Arc::new(PassthroughComposer)));
        SessionRegistry::new(workflow, ActivityLevel::Active)
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = registry().await;
        registry.open("a").await;
        registry.open("b").await;
        registry.send_message("a", "220").await.unwrap();
        registry.set_mode("b", Mode::Chat).await.unwrap();

        let a = registry.view("a").await.unwrap();
        let b = registry.view("b").await.unwrap();
        assert_eq!(a.step, 2);
        assert_eq!(a.mode, Mode::Fitness);
        assert_eq!(b.step, 1);
        assert_eq!(b.mode, Mode::Chat);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_created_by_turns() {
        let registry = registry().await;
        assert!(registry.send_message("ghost", "hi").await.is_none());
        assert!(registry.set_mode("ghost", Mode::Chat).await.is_none());
        assert!(registry.view("ghost").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn view_does_not_create_sessions() {
        let registry = registry().await;
        assert!(registry.view("ghost").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn open_greets_once() {
        let registry = registry().await;
        assert_eq!(registry.open("a").await.len(), 1);
        assert!(registry.open("a").await.is_empty());
    }
}
