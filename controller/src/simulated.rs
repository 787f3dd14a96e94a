use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use heater_common::ConnectionError;

use crate::link::{DeviceLink, DeviceState, LinkEvent};

const EVENT_CAPACITY: usize = 32;

#[cfg(test)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub finds: u64,
    pub connects: u64,
    pub gets: u64,
    pub sets: u64,
}

/// In-memory heater that behaves like a local-network device session.
///
/// Hardware integration point: a real Tuya local-protocol session implements
/// [`DeviceLink`] the same way and replaces this in `host::run`.
pub struct SimulatedLink {
    device_id: String,
    state: Mutex<DeviceState>,
    events: broadcast::Sender<LinkEvent>,
    connected: AtomicBool,
    reachable: AtomicBool,
    stalled: AtomicBool,
    finds: AtomicU64,
    connects: AtomicU64,
    gets: AtomicU64,
    sets: AtomicU64,
}

impl SimulatedLink {
    pub fn new(device_id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            device_id: device_id.into(),
            state: Mutex::new(DeviceState::with_power(false)),
            events,
            connected: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            finds: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    fn require_session(&self) -> Result<(), ConnectionError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectionError::Transport(format!(
                "no session with {}",
                self.device_id
            )))
        }
    }
}

#[cfg(test)]
impl SimulatedLink {
    /// Unreachable devices fail discovery and drop any live session.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
        if !reachable {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    /// A stalled device never answers discovery.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Someone pressed the power button on the heater itself.
    pub async fn press_power(&self, on: bool) {
        let report = {
            let mut state = self.state.lock().await;
            *state = DeviceState::with_power(on);
            state.clone()
        };
        let _ = self.events.send(LinkEvent::Data(report));
    }

    /// Link-level fault: the session drops and an error is pushed.
    pub fn inject_fault(&self, message: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(LinkEvent::Error(message.to_string()));
    }

    pub async fn power(&self) -> Option<bool> {
        self.state.lock().await.power()
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            finds: self.finds.load(Ordering::SeqCst),
            connects: self.connects.load(Ordering::SeqCst),
            gets: self.gets.load(Ordering::SeqCst),
            sets: self.sets.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    async fn find(&self) -> Result<(), ConnectionError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Discovery {
                device_id: self.device_id.clone(),
            });
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Handshake {
                device_id: self.device_id.clone(),
                reason: "device did not answer".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        debug!(device = %self.device_id, "simulated session established");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn get(&self, _schema: bool) -> Result<DeviceState, ConnectionError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        Ok(self.state.lock().await.clone())
    }

    async fn set(&self, fields: DeviceState) -> Result<(), ConnectionError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;

        let report = {
            let mut state = self.state.lock().await;
            state.dps.extend(fields.dps);
            state.clone()
        };
        let _ = self.events.send(LinkEvent::Data(report));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn set_requires_a_session() {
        let link = SimulatedLink::new("abc");
        assert!(link.set(DeviceState::with_power(true)).await.is_err());

        link.find().await.unwrap();
        link.connect().await.unwrap();
        link.set(DeviceState::with_power(true)).await.unwrap();

        assert_eq!(link.power().await, Some(true));
        assert_eq!(
            link.stats(),
            LinkStats {
                finds: 1,
                connects: 1,
                gets: 0,
                sets: 2
            }
        );
    }

    #[tokio::test]
    async fn set_pushes_device_report() {
        let link = SimulatedLink::new("abc");
        let mut events = link.subscribe();
        link.connect().await.unwrap();

        link.set(DeviceState::with_power(true)).await.unwrap();

        match events.recv().await.unwrap() {
            LinkEvent::Data(state) => assert_eq!(state.power(), Some(true)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_device_fails_discovery() {
        let link = SimulatedLink::new("abc");
        link.set_reachable(false);

        assert_eq!(
            link.find().await,
            Err(ConnectionError::Discovery {
                device_id: "abc".to_string()
            })
        );
    }

    #[tokio::test]
    async fn fault_drops_session() {
        let link = SimulatedLink::new("abc");
        let mut events = link.subscribe();
        link.connect().await.unwrap();

        link.inject_fault("socket reset");

        assert!(!link.is_connected());
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::Error("socket reset".to_string())
        );
    }
}
