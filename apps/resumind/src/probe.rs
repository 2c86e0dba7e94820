//! Availability probe. Polls the environment until the platform shows up.
//!
//! One background task per probe, however often [`AvailabilityProbe::start`]
//! is called. The task ticks every `interval`, reports the platform exactly
//! once through a watch channel, then exits. [`AvailabilityProbe::stop`]
//! cancels a probe that is still waiting.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::platform::{Environment, Platform};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// The platform handle, plus how many polls it took to find it.
#[derive(Clone)]
pub struct ReadyEvent {
    pub platform: Arc<dyn Platform>,
    pub polls: u32,
}

impl std::fmt::Debug for ReadyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyEvent")
            .field("polls", &self.polls)
            .finish_non_exhaustive()
    }
}

pub struct AvailabilityProbe {
    env: Environment,
    interval: Duration,
    cancel: CancellationToken,
    ready_tx: Arc<watch::Sender<Option<ReadyEvent>>>,
    started: AtomicBool,
    polling: Arc<AtomicBool>,
    polls: Arc<AtomicU32>,
}

impl AvailabilityProbe {
    pub fn new(env: Environment, interval: Duration) -> Self {
        let (ready_tx, _rx) = watch::channel(None);
        Self {
            env,
            interval,
            cancel: CancellationToken::new(),
            ready_tx: Arc::new(ready_tx),
            started: AtomicBool::new(false),
            polling: Arc::new(AtomicBool::new(false)),
            polls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Starts polling if not already started. Every call returns a signal for
    /// the same single readiness event.
    pub fn start(&self) -> ReadySignal {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.spawn_loop();
        } else {
            debug!("Availability probe already started");
        }
        self.signal()
    }

    /// A signal for the readiness event without starting the probe.
    pub fn signal(&self) -> ReadySignal {
        ReadySignal {
            rx: self.ready_tx.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// Cancels polling. Pending [`ReadySignal::wait`] calls resolve to `None`
    /// unless the platform was already reported.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn poll_count(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    fn spawn_loop(&self) {
        let env = self.env.clone();
        let period = self.interval;
        let cancel = self.cancel.clone();
        let ready_tx = self.ready_tx.clone();
        let polling = self.polling.clone();
        let polls = self.polls.clone();

        polling.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Availability probe cancelled after {} poll(s)", polls.load(Ordering::SeqCst));
                        break;
                    }
                    _ = ticker.tick() => {
                        let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(platform) = env.lookup() {
                            if cancel.is_cancelled() {
                                debug!("Platform found after the probe was stopped; not reporting it");
                                break;
                            }
                            info!("Platform detected after {} poll(s)", n);
                            ready_tx.send_replace(Some(ReadyEvent { platform, polls: n }));
                            break;
                        }
                    }
                }
            }

            polling.store(false, Ordering::SeqCst);
        });
    }
}

impl Drop for AvailabilityProbe {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Resolves once the probe reports the platform.
pub struct ReadySignal {
    rx: watch::Receiver<Option<ReadyEvent>>,
    cancel: CancellationToken,
}

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// `None` when the probe was stopped before the platform appeared.
    pub async fn wait(mut self) -> Option<ReadyEvent> {
        let current = self.rx.borrow().clone();
        if current.is_some() || self.cancel.is_cancelled() {
            return current;
        }
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            ready = self.rx.wait_for(|event| event.is_some()) => {
                ready.ok().and_then(|event| (*event).clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;
    use tokio::time::{sleep, Instant};

    fn platform() -> Arc<dyn Platform> {
        Arc::new(MemoryPlatform::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_at_start_is_detected_on_first_poll() {
        let env = Environment::new();
        env.inject(platform());
        let probe = AvailabilityProbe::new(env, DEFAULT_PROBE_INTERVAL);

        let event = probe.start().wait().await.unwrap();
        assert_eq!(event.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_injection_detected_within_one_interval() {
        let env = Environment::new();
        let probe = AvailabilityProbe::new(env.clone(), DEFAULT_PROBE_INTERVAL);
        let signal = probe.start();

        sleep(Duration::from_millis(250)).await;
        assert!(!signal.is_ready());
        assert!(probe.is_polling());

        let injected_at = Instant::now();
        env.inject(platform());
        let event = signal.wait().await.unwrap();

        assert!(injected_at.elapsed() <= DEFAULT_PROBE_INTERVAL);
        assert!(event.polls >= 3);

        sleep(Duration::from_millis(10)).await;
        assert!(!probe.is_polling());
        let polls = probe.poll_count();
        assert_eq!(polls, event.polls);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.poll_count(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let env = Environment::new();
        env.inject(platform());
        let probe = AvailabilityProbe::new(env, DEFAULT_PROBE_INTERVAL);

        let first = probe.start();
        let second = probe.start();
        let a = first.wait().await.unwrap();
        let b = second.wait().await.unwrap();

        assert_eq!(a.polls, 1);
        assert_eq!(b.polls, 1);
        assert!(Arc::ptr_eq(&a.platform, &b.platform));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.poll_count(), 1);
        assert!(!probe.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_wait() {
        let env = Environment::new();
        let probe = AvailabilityProbe::new(env.clone(), DEFAULT_PROBE_INTERVAL);
        let signal = probe.start();

        sleep(Duration::from_millis(150)).await;
        probe.stop();
        assert!(signal.wait().await.is_none());

        sleep(Duration::from_millis(10)).await;
        assert!(!probe.is_polling());

        let polls = probe.poll_count();
        env.inject(platform());
        sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.poll_count(), polls);
        assert!(!probe.signal().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick_never_reports() {
        for _ in 0..16 {
            let env = Environment::new();
            let probe = AvailabilityProbe::new(env.clone(), DEFAULT_PROBE_INTERVAL);
            let signal = probe.start();
            probe.stop();
            env.inject(platform());

            assert!(signal.wait().await.is_none());
            sleep(Duration::from_millis(250)).await;
            assert!(!probe.signal().is_ready());
            assert!(!probe.is_polling());
            assert_eq!(probe.poll_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_after_ready_resolves_immediately() {
        let env = Environment::new();
        env.inject(platform());
        let probe = AvailabilityProbe::new(env, DEFAULT_PROBE_INTERVAL);
        probe.start().wait().await.unwrap();

        probe.stop();
        let event = probe.signal().wait().await;
        assert_eq!(event.map(|e| e.polls), Some(1));
    }
}
