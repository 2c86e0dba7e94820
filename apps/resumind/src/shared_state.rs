//! Process-wide observable state: session, loading flag, last error, and
//! platform readiness.
//!
//! Any task may read a snapshot or subscribe to changes. Only the session
//! manager and the capability facade mutate it (the mutators are crate-private).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub session: SessionState,
    pub is_loading: bool,
    pub error: Option<String>,
    pub platform_ready: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            session: SessionState::Unknown,
            is_loading: true,
            error: None,
            platform_ready: false,
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn session(&self) -> SessionState {
        self.tx.borrow().session.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.tx.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().is_loading
    }

    pub fn platform_ready(&self) -> bool {
        self.tx.borrow().platform_ready
    }

    /// Waits until the first auth check after readiness has settled the session.
    pub async fn settled(&self) -> Snapshot {
        let mut rx = self.subscribe();
        let settled = match rx
            .wait_for(|s| s.platform_ready && s.session.is_settled())
            .await
        {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives as long as `self`, so this arm is unreachable in practice.
            Err(_) => self.snapshot(),
        };
        settled
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut Snapshot)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn set_session(&self, session: SessionState) {
        self.update(|s| s.session = session);
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.update(|s| s.is_loading = loading);
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.error = Some(message));
    }

    pub(crate) fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    pub(crate) fn mark_ready(&self) {
        self.update(|s| s.platform_ready = true);
    }
}
