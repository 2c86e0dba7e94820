//! Platform client. Wires the probe, facade and session manager together.
//!
//! `init` is the single entry point: it starts the probe and, once the
//! platform appears, binds it into the facade, marks the state ready and runs
//! the first auth check. Calling it again is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::facade::CapabilityFacade;
use crate::platform::Environment;
use crate::probe::AvailabilityProbe;
use crate::session::SessionManager;
use crate::shared_state::SharedState;

pub struct PlatformClient {
    state: SharedState,
    facade: CapabilityFacade,
    session: SessionManager,
    probe: AvailabilityProbe,
    init_started: AtomicBool,
}

impl PlatformClient {
    pub fn new(env: Environment, probe_interval: Duration) -> Self {
        let state = SharedState::new();
        let facade = CapabilityFacade::new(state.clone());
        let session = SessionManager::new(facade.clone());
        Self {
            state,
            facade,
            session,
            probe: AvailabilityProbe::new(env, probe_interval),
            init_started: AtomicBool::new(false),
        }
    }

    pub fn init(&self) {
        if self.init_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let signal = self.probe.start();
        let facade = self.facade.clone();
        let session = self.session.clone();
        tokio::spawn(async move {
            let Some(event) = signal.wait().await else {
                warn!("Platform probe stopped before the platform became available");
                return;
            };
            facade.bind(event.platform);
            facade.state().mark_ready();
            session.check_status().await;
            info!("Platform client initialised");
        });
    }

    pub fn shutdown(&self) {
        self.probe.stop();
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn facade(&self) -> &CapabilityFacade {
        &self.facade
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::memory::MemoryPlatform;
    use crate::session::SessionState;

    #[tokio::test(start_paused = true)]
    async fn test_delayed_injection_settles_session() {
        let env = Environment::new();
        let client = PlatformClient::new(env.clone(), Duration::from_millis(100));
        client.init();
        client.init();

        tokio::time::sleep(Duration::from_millis(320)).await;
        assert!(!client.state().platform_ready());
        assert!(!client.facade().is_available());

        env.inject(Arc::new(MemoryPlatform::new().with_user("carol").signed_in()));
        let snapshot = client.state().settled().await;

        assert!(snapshot.platform_ready);
        assert!(!snapshot.is_loading);
        assert_eq!(
            snapshot.session.user().map(|u| u.username.as_str()),
            Some("carol")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_platform_settles_anonymous() {
        let env = Environment::new();
        env.inject(Arc::new(MemoryPlatform::new()));
        let client = PlatformClient::new(env, Duration::from_millis(100));
        client.init();

        let snapshot = client.state().settled().await;
        assert_eq!(snapshot.session, SessionState::Anonymous);
        assert!(!client.session().session().authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_injection_leaves_unbound() {
        let env = Environment::new();
        let client = PlatformClient::new(env.clone(), Duration::from_millis(100));
        client.init();
        client.shutdown();

        env.inject(Arc::new(MemoryPlatform::new()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!client.facade().is_available());
        assert!(!client.state().platform_ready());
        assert_eq!(client.state().session(), SessionState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_honoured_on_every_run() {
        for _ in 0..16 {
            let env = Environment::new();
            env.inject(Arc::new(MemoryPlatform::new()));
            let client = PlatformClient::new(env, Duration::from_millis(100));
            client.init();
            client.shutdown();

            tokio::time::sleep(Duration::from_millis(300)).await;
            assert!(!client.facade().is_available());
        }
    }
}
