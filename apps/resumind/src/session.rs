//! Session manager. Owns the authentication state machine.
//!
//! `Unknown → Checking → { Authenticated(identity) | Anonymous }`
//!
//! Every failure while checking fails closed to `Anonymous`. Sign-out always
//! ends `Anonymous`, whatever the platform answered.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::facade::CapabilityFacade;
use crate::platform::Identity;
use crate::shared_state::SharedState;

pub const PLATFORM_UNAVAILABLE: &str = "Platform not available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    /// Before the platform was detected.
    Unknown,
    Checking,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Whether a check has concluded one way or the other.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated(_) | SessionState::Anonymous
        )
    }
}

/// `{ user, authenticated }` view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: Option<Identity>,
    pub authenticated: bool,
}

impl From<&SessionState> for Session {
    fn from(state: &SessionState) -> Self {
        Self {
            user: state.user().cloned(),
            authenticated: state.is_authenticated(),
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    facade: CapabilityFacade,
}

impl SessionManager {
    pub fn new(facade: CapabilityFacade) -> Self {
        Self { facade }
    }

    fn state(&self) -> &SharedState {
        self.facade.state()
    }

    pub fn session(&self) -> Session {
        Session::from(&self.state().session())
    }

    /// Asks the platform whether a user is signed in and settles the session.
    /// Returns whether the session ended up authenticated.
    pub async fn check_status(&self) -> bool {
        if !self.facade.is_available() {
            debug!("Auth check skipped: platform not bound");
            return false;
        }

        self.state().set_session(SessionState::Checking);
        let auth = self.facade.auth();

        let next = match auth.is_signed_in().await {
            Some(true) => match auth.get_user().await {
                Some(user) => SessionState::Authenticated(user),
                None => {
                    warn!("Signed in but identity could not be fetched; treating as anonymous");
                    SessionState::Anonymous
                }
            },
            Some(false) | None => SessionState::Anonymous,
        };

        let authenticated = next.is_authenticated();
        if let Some(user) = next.user() {
            info!("Session authenticated as {}", user.username);
        } else {
            debug!("Session anonymous");
        }
        self.state().update(|s| {
            s.session = next;
            s.is_loading = false;
        });
        authenticated
    }

    /// Runs the platform's interactive sign-in, then re-checks the status.
    pub async fn sign_in(&self) -> bool {
        if !self.facade.is_available() {
            self.state().record_error(PLATFORM_UNAVAILABLE);
            return false;
        }

        self.state().set_loading(true);
        if self.facade.auth().sign_in().await.is_none() {
            warn!("Interactive sign-in did not complete");
        }
        self.check_status().await
    }

    /// Signs out on the platform and forces the session to `Anonymous`.
    pub async fn sign_out(&self) {
        if self.facade.auth().sign_out().await.is_none() {
            warn!("Platform sign-out failed; clearing the local session anyway");
        }
        self.state().update(|s| {
            s.session = SessionState::Anonymous;
            s.is_loading = false;
        });
        info!("Session signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::test_support::bound_facade;
    use crate::platform::memory::MemoryPlatform;

    #[tokio::test]
    async fn test_check_status_signed_out_is_anonymous() {
        let (facade, _platform) = bound_facade(MemoryPlatform::new());
        let session = SessionManager::new(facade.clone());

        assert!(!session.check_status().await);
        assert_eq!(facade.state().session(), SessionState::Anonymous);
        assert!(!facade.state().is_loading());
    }

    #[tokio::test]
    async fn test_check_status_signed_in_fetches_identity() {
        let (facade, _platform) =
            bound_facade(MemoryPlatform::new().with_user("alice").signed_in());
        let session = SessionManager::new(facade);

        assert!(session.check_status().await);
        let view = session.session();
        assert!(view.authenticated);
        assert_eq!(view.user.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_check_status_is_idempotent() {
        let (facade, _platform) =
            bound_facade(MemoryPlatform::new().with_user("alice").signed_in());
        let session = SessionManager::new(facade.clone());

        let first = session.check_status().await;
        let first_state = facade.state().session();
        let second = session.check_status().await;
        assert_eq!(first, second);
        assert_eq!(first_state, facade.state().session());
    }

    #[tokio::test]
    async fn test_status_error_fails_closed() {
        let (facade, platform) = bound_facade(MemoryPlatform::new().signed_in());
        let session = SessionManager::new(facade.clone());
        assert!(session.check_status().await);

        platform.memory_auth().fail_status_checks(true);
        assert!(!session.check_status().await);
        assert_eq!(facade.state().session(), SessionState::Anonymous);
        assert!(facade.state().error().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_then_recheck() {
        let (facade, platform) = bound_facade(MemoryPlatform::new().with_user("bob"));
        let session = SessionManager::new(facade.clone());
        session.check_status().await;

        assert!(session.sign_in().await);
        assert_eq!(
            facade.state().session().user().map(|u| u.username.as_str()),
            Some("bob")
        );
        assert!(platform.memory_auth().status_checks() >= 2);
    }

    #[tokio::test]
    async fn test_aborted_sign_in_stays_anonymous() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        platform.memory_auth().abort_sign_in(true);
        let session = SessionManager::new(facade.clone());

        assert!(!session.sign_in().await);
        assert_eq!(facade.state().session(), SessionState::Anonymous);
        assert!(!facade.state().is_loading());
    }

    #[tokio::test]
    async fn test_sign_in_while_unavailable_records_error() {
        let facade = CapabilityFacade::new(SharedState::new());
        let session = SessionManager::new(facade.clone());

        assert!(!session.sign_in().await);
        assert_eq!(facade.state().error().as_deref(), Some(PLATFORM_UNAVAILABLE));
        assert_eq!(facade.state().session(), SessionState::Unknown);
    }

    #[tokio::test]
    async fn test_sign_out_is_anonymous_even_when_platform_fails() {
        let (facade, platform) = bound_facade(MemoryPlatform::new().signed_in());
        let session = SessionManager::new(facade.clone());
        assert!(session.check_status().await);

        platform.memory_auth().fail_sign_out(true);
        session.sign_out().await;

        assert_eq!(facade.state().session(), SessionState::Anonymous);
        assert!(!session.session().authenticated);
        assert!(!facade.state().is_loading());
    }
}
