use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use heater_common::{
    thermostat::{decide, is_warming},
    ConnectionError, PowerCommand, TimingConfig,
};

use crate::{
    guard::{ConnectionGuard, StateObserver},
    link::{DeviceLink, DeviceState, LinkEvent},
};

#[derive(Debug)]
struct AtomicTemp(AtomicU32);

impl AtomicTemp {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::SeqCst))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::SeqCst);
    }
}

/// Owns the logical state of one heater and its connection session.
///
/// `is_on` reflects device-confirmed power only: commands never update it
/// directly, pushes and polls do.
pub struct ThermostatController {
    device_id: String,
    link: Arc<dyn DeviceLink>,
    guard: ConnectionGuard,
    power: Arc<AtomicBool>,
    current_temp: AtomicTemp,
    target_temp: AtomicTemp,
    cancel: CancellationToken,
}

impl ThermostatController {
    /// Builds the controller and starts listening for device pushes.
    pub fn spawn(
        device_id: impl Into<String>,
        link: Arc<dyn DeviceLink>,
        timing: &TimingConfig,
    ) -> Arc<Self> {
        let device_id = device_id.into();
        let cancel = CancellationToken::new();
        let power = Arc::new(AtomicBool::new(false));

        let guard = ConnectionGuard::new(
            device_id.clone(),
            Arc::clone(&link),
            Duration::from_millis(timing.poll_interval_ms),
            power_observer(Arc::clone(&power)),
            cancel.child_token(),
        );

        let events = link.subscribe();
        let controller = Arc::new(Self {
            device_id,
            link,
            guard,
            power,
            current_temp: AtomicTemp::new(0.0),
            target_temp: AtomicTemp::new(timing.default_target_temp),
            cancel,
        });

        tokio::spawn(listen(
            Arc::downgrade(&controller),
            events,
            controller.cancel.clone(),
        ));
        controller
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn refresh(&self) -> Result<(), ConnectionError> {
        self.guard.ensure_connected().await
    }

    pub fn is_on(&self) -> bool {
        self.power.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    pub fn is_warming(&self) -> bool {
        is_warming(self.is_on(), self.current_temp(), self.target_temp())
    }

    pub fn current_temp(&self) -> f32 {
        self.current_temp.load()
    }

    pub fn target_temp(&self) -> f32 {
        self.target_temp.load()
    }

    pub async fn turn_on(&self) -> Result<(), ConnectionError> {
        self.switch(PowerCommand::On).await
    }

    pub async fn turn_off(&self) -> Result<(), ConnectionError> {
        self.switch(PowerCommand::Off).await
    }

    pub async fn switch(&self, command: PowerCommand) -> Result<(), ConnectionError> {
        info!("device {}: POWER: {}", self.device_id, command.as_str());
        self.refresh().await?;
        self.link
            .set(DeviceState::with_power(command.is_on()))
            .await
    }

    /// Stores the reading and re-evaluates the threshold, issuing exactly one
    /// power command.
    pub async fn set_current_temp(&self, value: f32) -> Result<PowerCommand, ConnectionError> {
        info!("device {}: SET CURRENT TEMP: {value}", self.device_id);
        self.current_temp.store(value);
        self.apply_threshold().await
    }

    pub async fn set_target_temp(&self, value: f32) -> Result<PowerCommand, ConnectionError> {
        info!("device {}: SET TARGET TEMP: {value}", self.device_id);
        self.target_temp.store(value);
        self.apply_threshold().await
    }

    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("device {}: STOP", self.device_id);
        }
        self.guard.stop();
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    async fn apply_threshold(&self) -> Result<PowerCommand, ConnectionError> {
        let command = decide(self.current_temp(), self.target_temp());
        self.switch(command).await?;
        Ok(command)
    }

    fn on_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Data(state) => {
                if let Some(on) = state.power() {
                    self.power.store(on, Ordering::SeqCst);
                }
            }
            LinkEvent::Error(message) => {
                warn!("device {} connection error: {message}", self.device_id);
                self.guard.mark_disconnected();
            }
        }
    }
}

impl Drop for ThermostatController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn power_observer(power: Arc<AtomicBool>) -> StateObserver {
    Arc::new(move |state: &DeviceState| {
        if let Some(on) = state.power() {
            power.store(on, Ordering::SeqCst);
        }
    })
}

async fn listen(
    controller: Weak<ThermostatController>,
    mut events: broadcast::Receiver<LinkEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(controller) = controller.upgrade() else {
            break;
        };

        match event {
            Ok(event) => controller.on_event(event),
            Err(RecvError::Lagged(skipped)) => {
                debug!(
                    "device {}: skipped {skipped} pushed events",
                    controller.device_id
                );
            }
            Err(RecvError::Closed) => break,
        }
    }
}
