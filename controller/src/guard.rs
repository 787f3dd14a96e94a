use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use heater_common::ConnectionError;

use crate::link::{DeviceLink, DeviceState};

/// Receives every state snapshot read by the keep-alive poll.
pub type StateObserver = Arc<dyn Fn(&DeviceState) + Send + Sync>;

/// Lazily (re)connects one device and keeps the session warm.
///
/// Handshake failures are returned to the caller and never retried here.
pub struct ConnectionGuard {
    device_id: String,
    link: Arc<dyn DeviceLink>,
    poll_interval: Duration,
    observer: StateObserver,
    connected: Arc<AtomicBool>,
    poll: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ConnectionGuard {
    pub fn new(
        device_id: impl Into<String>,
        link: Arc<dyn DeviceLink>,
        poll_interval: Duration,
        observer: StateObserver,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            link,
            poll_interval,
            observer,
            connected: Arc::new(AtomicBool::new(false)),
            poll: Mutex::new(None),
            cancel,
        }
    }

    pub async fn ensure_connected(&self) -> Result<(), ConnectionError> {
        self.check_open()?;

        // Held across the handshake so concurrent callers wait for one attempt.
        let mut poll = self.poll.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        self.connected.store(false, Ordering::SeqCst);

        info!("connecting to device {}", self.device_id);
        self.link.find().await?;
        self.link.connect().await?;
        self.check_open()?;
        self.connected.store(true, Ordering::SeqCst);

        if poll.as_ref().is_none_or(JoinHandle::is_finished) {
            *poll = Some(self.spawn_poll());
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.link.is_connected()
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn is_polling(&self) -> bool {
        self.poll
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the keep-alive poll; later connects fail with `SessionClosed`.
    /// In-flight device calls are left to finish on their own.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn check_open(&self) -> Result<(), ConnectionError> {
        if self.cancel.is_cancelled() {
            return Err(ConnectionError::SessionClosed {
                device_id: self.device_id.clone(),
            });
        }
        Ok(())
    }

    fn spawn_poll(&self) -> JoinHandle<()> {
        let device_id = self.device_id.clone();
        let link = Arc::clone(&self.link);
        let observer = Arc::clone(&self.observer);
        let connected = Arc::clone(&self.connected);
        let cancel = self.cancel.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if !connected.load(Ordering::SeqCst) || !link.is_connected() {
                    continue;
                }

                match link.get(true).await {
                    Ok(state) => observer(&state),
                    Err(err) => debug!("poll of device {device_id} failed: {err}"),
                }
            }
            debug!("poll for device {device_id} stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::simulated::SimulatedLink;

    fn guard_for(link: &Arc<SimulatedLink>) -> (ConnectionGuard, Arc<AtomicUsize>) {
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);
        let observer: StateObserver = Arc::new(move |_state: &DeviceState| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let guard = ConnectionGuard::new(
            "abc",
            Arc::clone(link) as Arc<dyn DeviceLink>,
            Duration::from_millis(100),
            observer,
            CancellationToken::new(),
        );
        (guard, observed)
    }

    #[tokio::test(start_paused = true)]
    async fn connects_and_starts_polling() {
        let link = Arc::new(SimulatedLink::new("abc"));
        let (guard, observed) = guard_for(&link);

        guard.ensure_connected().await.unwrap();
        assert!(guard.is_connected());
        assert!(guard.is_polling().await);

        time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(link.stats().gets, 10);
        assert_eq!(observed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_calls_do_not_reconnect_or_duplicate_poll() {
        let link = Arc::new(SimulatedLink::new("abc"));
        let (guard, _) = guard_for(&link);

        for _ in 0..5 {
            guard.ensure_connected().await.unwrap();
        }
        time::sleep(Duration::from_millis(1_050)).await;

        let stats = link.stats();
        assert_eq!(stats.finds, 1);
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.gets, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_failure_propagates_without_retry() {
        let link = Arc::new(SimulatedLink::new("abc"));
        link.set_reachable(false);
        let (guard, _) = guard_for(&link);

        let err = guard.ensure_connected().await.unwrap_err();
        assert_eq!(
            err,
            ConnectionError::Discovery {
                device_id: "abc".to_string()
            }
        );
        assert!(!guard.is_connected());
        assert!(!guard.is_polling().await);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(link.stats().finds, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_reuses_existing_poll() {
        let link = Arc::new(SimulatedLink::new("abc"));
        let (guard, _) = guard_for(&link);
        guard.ensure_connected().await.unwrap();

        link.inject_fault("socket reset");
        guard.mark_disconnected();
        assert!(!guard.is_connected());

        // Polls are skipped while the session is down.
        time::sleep(Duration::from_millis(550)).await;
        assert_eq!(link.stats().gets, 0);

        guard.ensure_connected().await.unwrap();
        assert_eq!(link.stats().connects, 2);

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(link.stats().gets, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_poll_and_closes_session() {
        let link = Arc::new(SimulatedLink::new("abc"));
        let (guard, _) = guard_for(&link);
        guard.ensure_connected().await.unwrap();

        guard.stop();
        guard.stop();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(link.stats().gets, 0);
        assert!(!guard.is_polling().await);
        assert!(matches!(
            guard.ensure_connected().await,
            Err(ConnectionError::SessionClosed { .. })
        ));
        assert_eq!(link.stats().finds, 1);
    }

    #[tokio::test]
    async fn stop_before_connect_is_harmless() {
        let link = Arc::new(SimulatedLink::new("abc"));
        let (guard, _) = guard_for(&link);

        guard.stop();

        assert!(guard.is_stopped());
        assert!(!guard.is_polling().await);
        assert_eq!(link.stats().finds, 0);
    }
}
